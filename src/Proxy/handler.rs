use std::fmt;
use std::marker::PhantomData;

use super::contract::Dispatch;
use super::invocation::ProxyMethodInvocation;
use super::listener::BatchSizeListener;
use crate::error::EventError;
use crate::MPMC::EventHandler;

/// Consumer side of a proxy: replays each captured call onto the backing
/// implementations in registration order.
pub struct InvokerEventHandler<C, I> {
    implementations: Vec<I>,
    end_of_batch: Option<fn(&mut I, usize)>,
    batch_size: usize,
    _contract: PhantomData<fn() -> C>,
}

impl<C, I> InvokerEventHandler<C, I>
where
    C: Dispatch<I>,
{
    pub fn new(implementations: Vec<I>) -> Self {
        Self {
            implementations,
            end_of_batch: None,
            batch_size: 0,
            _contract: PhantomData,
        }
    }

    /// Like `new`, and every implementation hears the size of each batch.
    pub fn batch_aware(implementations: Vec<I>) -> Self
    where
        I: BatchSizeListener,
    {
        let notify: fn(&mut I, usize) = |implementation, size| implementation.on_end_of_batch(size);
        Self {
            end_of_batch: Some(notify),
            ..Self::new(implementations)
        }
    }
}

impl<C, I> EventHandler<ProxyMethodInvocation> for InvokerEventHandler<C, I>
where
    C: Dispatch<I>,
    I: Send,
{
    fn on_event(
        &mut self,
        event: &mut ProxyMethodInvocation,
        _sequence: i64,
        end_of_batch: bool,
    ) -> Result<(), EventError> {
        self.batch_size += 1;

        let method = event.method;
        let replayed = C::dispatch(method, &mut event.arguments.reader(method), &mut self.implementations);
        event.reset();

        if end_of_batch {
            if let Some(notify) = self.end_of_batch {
                for implementation in &mut self.implementations {
                    notify(implementation, self.batch_size);
                }
            }
            self.batch_size = 0;
        }
        replayed
    }
}

impl<C: Dispatch<I>, I> fmt::Debug for InvokerEventHandler<C, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokerEventHandler")
            .field("contract", &C::name())
            .field("implementations", &self.implementations.len())
            .field("batch_aware", &self.end_of_batch.is_some())
            .finish()
    }
}
