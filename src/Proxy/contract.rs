use super::argument::{ArgumentReader, MethodId, MethodSignature};
use super::invoker::RingBufferInvoker;
use crate::error::EventError;

/// What kind of type a contract describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKind {
    /// A trait: a pure set of capabilities with no implementation of its own.
    Capability,
    /// A concrete type; cannot be proxied.
    Concrete,
}

/// A proxyable contract, implemented by its forwarder type.
///
/// Normally generated by `ring_buffer_proxy!`. The forwarder captures calls
/// into a `RingBufferInvoker`; `methods` lists the contract's methods in
/// method-id order.
pub trait Contract: Sized + Send + 'static {
    fn name() -> &'static str;

    fn kind() -> ContractKind {
        ContractKind::Capability
    }

    /// Whether the contract carries the `#[disruptor_proxy]` tag.
    fn is_tagged() -> bool;

    fn methods() -> &'static [MethodSignature];

    fn from_invoker(invoker: RingBufferInvoker) -> Self;
}

/// Replays captured calls of a contract onto implementations of type `I`.
pub trait Dispatch<I>: Contract {
    /// Read the arguments of `method` and call it on every target, in order.
    fn dispatch(method: MethodId, arguments: &mut ArgumentReader<'_>, targets: &mut [I]) -> Result<(), EventError>;
}
