//! Capturing calls on a contract trait as ring-buffer events and replaying
//! them on a consumer thread.
//!
//! `ring_buffer_proxy!` declares the contract and its forwarder;
//! `RingBufferProxyGenerator` wires a forwarder to a `Disruptor`.

mod argument;
mod contract;
mod generator;
mod handler;
mod invocation;
mod invoker;
mod listener;
mod macros;
mod validation;

pub use argument::{
    parameter_type_counts, ArgumentHolder, ArgumentLayout, ArgumentReader, ArgumentType, ArgumentWriter, MethodId,
    MethodSignature,
};
pub use contract::{Contract, ContractKind, Dispatch};
pub use generator::RingBufferProxyGenerator;
pub use handler::InvokerEventHandler;
pub use invocation::ProxyMethodInvocation;
pub use invoker::{OverflowStrategy, RingBufferInvoker};
pub use listener::{
    no_drop_listener, no_publication_listener, BatchSizeListener, DropListener, MessagePublicationListener,
    NoMessagePublicationListener, NoOpDropListener,
};
pub use validation::{ConfigurableValidator, ValidationConfig, Validator};
