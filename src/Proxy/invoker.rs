use std::fmt;
use std::sync::Arc;

use super::argument::{ArgumentLayout, ArgumentWriter, MethodId};
use super::invocation::ProxyMethodInvocation;
use super::listener::{DropListener, MessagePublicationListener};
use crate::Core::trace::trace;
use crate::MPMC::Buffer::RingBuffer;

/// What a proxy does when the ring buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowStrategy {
    /// Wait for a free slot; the caller is slowed down to consumer speed.
    #[default]
    Block,
    /// Discard the call and tell the drop listener.
    Drop,
}

/// Producer side of a proxy: turns one call into one published event.
#[derive(Clone)]
pub struct RingBufferInvoker {
    ring_buffer: Arc<RingBuffer<ProxyMethodInvocation>>,
    layout: Arc<ArgumentLayout>,
    overflow: OverflowStrategy,
    drop_listener: Arc<dyn DropListener>,
    publication_listener: Arc<dyn MessagePublicationListener>,
}

impl RingBufferInvoker {
    pub(crate) fn new(
        ring_buffer: Arc<RingBuffer<ProxyMethodInvocation>>,
        layout: Arc<ArgumentLayout>,
        overflow: OverflowStrategy,
        drop_listener: Arc<dyn DropListener>,
        publication_listener: Arc<dyn MessagePublicationListener>,
    ) -> Self {
        Self {
            ring_buffer,
            layout,
            overflow,
            drop_listener,
            publication_listener,
        }
    }

    /// Capture a call to `method`; `write` pushes its arguments.
    ///
    /// Pre-publish always fires. If no slot can be had (full under `Drop`,
    /// or the disruptor halted under `Block`) the call is reported to the
    /// drop listener, `write` never runs and post-publish does not fire.
    pub fn invoke<F>(&self, method: MethodId, write: F)
    where
        F: FnOnce(&mut ArgumentWriter<'_>),
    {
        self.publication_listener.on_pre_publish();

        let layout = &self.layout;
        let capture = move |invocation: &mut ProxyMethodInvocation, sequence: i64| {
            invocation.sequence = sequence;
            invocation.method = method;
            let mut writer = invocation.arguments.writer(layout, method);
            write(&mut writer);
        };

        let published = match self.overflow {
            OverflowStrategy::Block => self.ring_buffer.publish_event(capture),
            OverflowStrategy::Drop => self.ring_buffer.try_publish_event(capture),
        };

        match published {
            Ok(_sequence) => self.publication_listener.on_post_publish(),
            Err(_err) => {
                trace!(contract = layout.contract(), method = method.0, error = %_err, "call dropped");
                self.drop_listener.on_drop();
            }
        }
    }

    pub fn overflow_strategy(&self) -> OverflowStrategy {
        self.overflow
    }

    pub fn ring_buffer(&self) -> &Arc<RingBuffer<ProxyMethodInvocation>> {
        &self.ring_buffer
    }

    pub fn layout(&self) -> &Arc<ArgumentLayout> {
        &self.layout
    }
}

impl fmt::Debug for RingBufferInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_invoker(self, f)
    }
}
