/// Declare a proxyable contract trait together with its forwarder type.
///
/// ```ignore
/// ring_buffer_proxy! {
///     #[disruptor_proxy]
///     /// Receives market data.
///     pub trait Listener => ListenerProxy {
///         fn on_price(&mut self, symbol: String, price: f64);
///         fn on_reset(&mut self);
///     }
/// }
/// ```
///
/// This declares `trait Listener: Send` and a `ListenerProxy` struct that
/// implements it by publishing each call into a ring buffer, plus the
/// `Contract` and `Dispatch` impls that let `RingBufferProxyGenerator` build
/// one and replay its calls onto any `I: Listener`.
///
/// `#[disruptor_proxy]`, if present, must be the first attribute.
/// Methods take `&mut self`, return nothing, and every argument type must be
/// `Clone + Send + 'static` (clones are made only when more than one
/// implementation is registered).
///
/// Contracts that extend other traits list the parent's methods again so the
/// forwarder can implement them too; they become supertraits:
///
/// ```ignore
/// ring_buffer_proxy! {
///     pub trait CatDog => CatDogProxy {
///         fn meow(&mut self, meow: String, age: i32);
///     }
///     inherits Bark {
///         fn bark(&mut self, loud: bool);
///     }
/// }
/// ```
#[macro_export]
macro_rules! ring_buffer_proxy {
    (
        #[disruptor_proxy]
        $($rest:tt)*
    ) => {
        $crate::ring_buffer_proxy!(@contract true; $($rest)*);
    };

    (@contract $tagged:literal;
        $(#[$meta:meta])*
        $vis:vis trait $name:ident => $proxy:ident {
            $(
                $(#[$method_meta:meta])*
                fn $method:ident(&mut self $(, $arg:ident : $ty:ty)*);
            )*
        }
        $(
            inherits $parent:path {
                $(
                    $(#[$parent_method_meta:meta])*
                    fn $parent_method:ident(&mut self $(, $parent_arg:ident : $parent_ty:ty)*);
                )*
            }
        )*
    ) => {
        $(#[$meta])*
        $vis trait $name: $($parent +)* ::core::marker::Send {
            $(
                $(#[$method_meta])*
                fn $method(&mut self $(, $arg: $ty)*);
            )*
        }

        #[derive(Clone, Debug)]
        $vis struct $proxy {
            invoker: $crate::Proxy::RingBufferInvoker,
        }

        const _: () = {
            #[allow(non_camel_case_types, dead_code)]
            enum __ProxyMethod {
                $($method,)*
                $($($parent_method,)*)*
            }

            impl $name for $proxy {
                $(
                    #[allow(unused_variables)]
                    fn $method(&mut self $(, $arg: $ty)*) {
                        self.invoker.invoke(
                            $crate::Proxy::MethodId(__ProxyMethod::$method as u16),
                            |arguments: &mut $crate::Proxy::ArgumentWriter<'_>| {
                                $(arguments.push($arg);)*
                            },
                        );
                    }
                )*
            }

            $(
                impl $parent for $proxy {
                    $(
                        #[allow(unused_variables)]
                        fn $parent_method(&mut self $(, $parent_arg: $parent_ty)*) {
                            self.invoker.invoke(
                                $crate::Proxy::MethodId(__ProxyMethod::$parent_method as u16),
                                |arguments: &mut $crate::Proxy::ArgumentWriter<'_>| {
                                    $(arguments.push($parent_arg);)*
                                },
                            );
                        }
                    )*
                }
            )*

            impl $crate::Proxy::Contract for $proxy {
                fn name() -> &'static str {
                    ::core::stringify!($name)
                }

                fn is_tagged() -> bool {
                    $tagged
                }

                fn methods() -> &'static [$crate::Proxy::MethodSignature] {
                    static METHODS: &[$crate::Proxy::MethodSignature] = &[
                        $(
                            $crate::Proxy::MethodSignature::new(::core::stringify!($method), {
                                const ARGUMENTS: &[$crate::Proxy::ArgumentType] =
                                    &[$($crate::Proxy::ArgumentType::of::<$ty>()),*];
                                ARGUMENTS
                            }),
                        )*
                        $($(
                            $crate::Proxy::MethodSignature::new(::core::stringify!($parent_method), {
                                const ARGUMENTS: &[$crate::Proxy::ArgumentType] =
                                    &[$($crate::Proxy::ArgumentType::of::<$parent_ty>()),*];
                                ARGUMENTS
                            }),
                        )*)*
                    ];
                    METHODS
                }

                fn from_invoker(invoker: $crate::Proxy::RingBufferInvoker) -> Self {
                    Self { invoker }
                }
            }

            impl<I: $name> $crate::Proxy::Dispatch<I> for $proxy {
                #[allow(unused_variables)]
                fn dispatch(
                    method: $crate::Proxy::MethodId,
                    arguments: &mut $crate::Proxy::ArgumentReader<'_>,
                    targets: &mut [I],
                ) -> ::core::result::Result<(), $crate::error::EventError> {
                    $(
                        if method.0 == __ProxyMethod::$method as u16 {
                            $(let $arg = arguments.next::<$ty>()?;)*
                            if let ::core::option::Option::Some((last, rest)) = targets.split_last_mut() {
                                for target in rest {
                                    <I as $name>::$method(target $(, ::core::clone::Clone::clone(&$arg))*);
                                }
                                <I as $name>::$method(last $(, $arg)*);
                            }
                            return ::core::result::Result::Ok(());
                        }
                    )*
                    $($(
                        if method.0 == __ProxyMethod::$parent_method as u16 {
                            $(let $parent_arg = arguments.next::<$parent_ty>()?;)*
                            if let ::core::option::Option::Some((last, rest)) = targets.split_last_mut() {
                                for target in rest {
                                    <I as $parent>::$parent_method(
                                        target $(, ::core::clone::Clone::clone(&$parent_arg))*
                                    );
                                }
                                <I as $parent>::$parent_method(last $(, $parent_arg)*);
                            }
                            return ::core::result::Result::Ok(());
                        }
                    )*)*
                    ::core::result::Result::Err($crate::error::EventError::UnknownMethod {
                        contract: ::core::stringify!($name),
                        method: method.0,
                    })
                }
            }
        };
    };

    (@contract $($rest:tt)*) => {
        ::core::compile_error!("ring_buffer_proxy!: expected `[vis] trait Name => ProxyName { fn ...(&mut self, ...); }`");
    };

    ($($rest:tt)*) => {
        $crate::ring_buffer_proxy!(@contract false; $($rest)*);
    };
}
