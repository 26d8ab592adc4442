use std::sync::Arc;

use super::argument::ArgumentLayout;
use super::contract::Dispatch;
use super::handler::InvokerEventHandler;
use super::invocation::ProxyMethodInvocation;
use super::invoker::{OverflowStrategy, RingBufferInvoker};
use super::listener::{
    no_drop_listener, no_publication_listener, BatchSizeListener, DropListener, MessagePublicationListener,
};
use super::validation::{ConfigurableValidator, ValidationConfig, Validator};
use crate::error::ProxyError;
use crate::Core::trace::{debug, info};
use crate::MPMC::Disruptor;

/// Creates proxies: forwarders that publish calls into a disruptor, paired
/// with a consumer stage that replays them onto real implementations.
pub struct RingBufferProxyGenerator {
    validator: ConfigurableValidator,
    drop_listener: Arc<dyn DropListener>,
    publication_listener: Arc<dyn MessagePublicationListener>,
}

impl Default for RingBufferProxyGenerator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl RingBufferProxyGenerator {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            validator: ConfigurableValidator::new(config),
            drop_listener: no_drop_listener(),
            publication_listener: no_publication_listener(),
        }
    }

    pub fn with_drop_listener(mut self, listener: Arc<dyn DropListener>) -> Self {
        self.drop_listener = listener;
        self
    }

    pub fn with_publication_listener(mut self, listener: Arc<dyn MessagePublicationListener>) -> Self {
        self.publication_listener = listener;
        self
    }

    /// Validate, register a replaying stage on `disruptor`, and return the
    /// forwarder. Must be called before the disruptor starts.
    pub fn create_ring_buffer_proxy<C, I>(
        &self,
        disruptor: &mut Disruptor<ProxyMethodInvocation>,
        overflow: OverflowStrategy,
        implementations: Vec<I>,
    ) -> Result<C, ProxyError>
    where
        C: Dispatch<I>,
        I: Send + 'static,
    {
        self.check::<C, I>(disruptor, &implementations)?;
        self.register(disruptor, overflow, InvokerEventHandler::<C, I>::new(implementations))
    }

    /// As `create_ring_buffer_proxy`; the implementations are also told the
    /// size of every batch they receive.
    pub fn create_batch_aware_ring_buffer_proxy<C, I>(
        &self,
        disruptor: &mut Disruptor<ProxyMethodInvocation>,
        overflow: OverflowStrategy,
        implementations: Vec<I>,
    ) -> Result<C, ProxyError>
    where
        C: Dispatch<I>,
        I: BatchSizeListener + Send + 'static,
    {
        self.check::<C, I>(disruptor, &implementations)?;
        self.register(disruptor, overflow, InvokerEventHandler::<C, I>::batch_aware(implementations))
    }

    fn check<C, I>(&self, disruptor: &Disruptor<ProxyMethodInvocation>, implementations: &[I]) -> Result<(), ProxyError>
    where
        C: Dispatch<I>,
    {
        self.validator.validate_all::<C, _>(disruptor)?;
        if implementations.is_empty() {
            return Err(ProxyError::NoImplementations { contract: C::name() });
        }
        if disruptor.is_started() {
            return Err(ProxyError::AlreadyStarted);
        }
        let stages = disruptor.processors().len();
        if stages > 0 {
            return Err(ProxyError::DisruptorInUse { stages });
        }
        Ok(())
    }

    fn register<C, I>(
        &self,
        disruptor: &mut Disruptor<ProxyMethodInvocation>,
        overflow: OverflowStrategy,
        handler: InvokerEventHandler<C, I>,
    ) -> Result<C, ProxyError>
    where
        C: Dispatch<I>,
        I: Send + 'static,
    {
        let layout = Arc::new(ArgumentLayout::new(C::name(), C::methods()));
        match disruptor.ring_buffer_mut() {
            Some(ring_buffer) => {
                for slot in ring_buffer.slots_mut() {
                    slot.arguments.prepare(&layout);
                }
            }
            None => {
                debug!(
                    contract = C::name(),
                    "ring buffer shared, argument cells will be built on first write"
                );
            }
        }

        disruptor
            .handle_events_with(handler)
            .map_err(|_| ProxyError::AlreadyStarted)?;

        info!(
            contract = C::name(),
            methods = layout.method_count(),
            cells = layout.cell_count(),
            ?overflow,
            "created ring buffer proxy"
        );

        let invoker = RingBufferInvoker::new(
            disruptor.ring_buffer().clone(),
            layout,
            overflow,
            self.drop_listener.clone(),
            self.publication_listener.clone(),
        );
        Ok(C::from_invoker(invoker))
    }
}
