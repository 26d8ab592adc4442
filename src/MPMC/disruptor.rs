use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::consumer::{BatchEventProcessor, EventProcessor, ProcessorControl, ProcessorState};
use super::handler::{EventHandler, ExceptionHandler, FatalExceptionHandler};
use super::rewind::BatchRewindStrategy;
use crate::error::{DisruptorError, Result};
use crate::Core::sequence::Sequence;
use crate::Core::trace::{debug, info, warn};
use crate::MPMC::Buffer::RingBuffer;

/// A ring buffer plus the chain of consumer stages reading it.
///
/// Stages run in registration order: each stage only sees an event after the
/// stage before it has finished with it, and producers are gated on the last
/// stage. Every stage gets its own thread on `start`.
pub struct Disruptor<E> {
    ring_buffer: Arc<RingBuffer<E>>,
    pending: Vec<Box<dyn EventProcessor<E>>>,
    controls: Vec<Arc<ProcessorControl>>,
    exception_handler: Option<Arc<dyn ExceptionHandler<E>>>,
    thread_name: String,
    threads: Vec<JoinHandle<()>>,
    started: bool,
}

/// The stage just registered; `then` chains the next one after it.
pub struct EventHandlerGroup<'a, E> {
    disruptor: &'a mut Disruptor<E>,
    sequence: Arc<Sequence>,
}

impl<'a, E: Send + 'static> EventHandlerGroup<'a, E> {
    pub fn then<H>(self, handler: H) -> Result<EventHandlerGroup<'a, E>>
    where
        H: EventHandler<E> + 'static,
    {
        let disruptor = self.disruptor;
        disruptor.handle_events_with(handler)
    }

    pub fn then_with_rewind<H>(
        self,
        handler: H,
        strategy: impl BatchRewindStrategy + 'static,
    ) -> Result<EventHandlerGroup<'a, E>>
    where
        H: EventHandler<E> + 'static,
    {
        let disruptor = self.disruptor;
        disruptor.handle_events_with_rewind(handler, strategy)
    }

    /// Progress sequence of this stage.
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }
}

impl<E: Send + 'static> Disruptor<E> {
    pub(crate) fn from_parts(ring_buffer: RingBuffer<E>, thread_name: String) -> Self {
        Self {
            ring_buffer: Arc::new(ring_buffer),
            pending: Vec::new(),
            controls: Vec::new(),
            exception_handler: None,
            thread_name,
            threads: Vec::new(),
            started: false,
        }
    }

    /// Append a consumer stage after the ones already registered.
    pub fn handle_events_with<H>(&mut self, handler: H) -> Result<EventHandlerGroup<'_, E>>
    where
        H: EventHandler<E> + 'static,
    {
        self.add_stage(handler, None)
    }

    /// Like `handle_events_with`; rewindable failures from `handler` are
    /// retried according to `strategy`.
    pub fn handle_events_with_rewind<H>(
        &mut self,
        handler: H,
        strategy: impl BatchRewindStrategy + 'static,
    ) -> Result<EventHandlerGroup<'_, E>>
    where
        H: EventHandler<E> + 'static,
    {
        self.add_stage(handler, Some(Box::new(strategy)))
    }

    fn add_stage<H>(
        &mut self,
        handler: H,
        strategy: Option<Box<dyn BatchRewindStrategy>>,
    ) -> Result<EventHandlerGroup<'_, E>>
    where
        H: EventHandler<E> + 'static,
    {
        if self.started {
            return Err(DisruptorError::AlreadyStarted);
        }

        let upstream = self.controls.last().map(|c| c.sequence().clone());
        let dependents = upstream.iter().cloned().collect();
        let barrier = self.ring_buffer.new_barrier(dependents);

        let mut processor = BatchEventProcessor::new(self.ring_buffer.clone(), barrier, handler);
        if let Some(strategy) = strategy {
            processor = processor.with_rewind_strategy(strategy);
        }
        let control = processor.control().clone();
        let sequence = control.sequence().clone();

        self.ring_buffer.add_gating_sequences(&[sequence.clone()]);
        if let Some(upstream) = &upstream {
            sequence.set(upstream.get());
            // Only the tail of the chain holds producers back
            self.ring_buffer.remove_gating_sequence(upstream);
        }

        debug!(stage = self.controls.len(), "registered consumer stage");
        self.controls.push(control);
        self.pending.push(Box::new(processor));

        Ok(EventHandlerGroup {
            disruptor: self,
            sequence,
        })
    }

    /// Exception handler for every stage; without one, failures are fatal.
    pub fn handle_exceptions_with(&mut self, handler: impl ExceptionHandler<E> + 'static) {
        self.exception_handler = Some(Arc::new(handler));
    }

    pub fn has_exception_handler(&self) -> bool {
        self.exception_handler.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn ring_buffer(&self) -> &Arc<RingBuffer<E>> {
        &self.ring_buffer
    }

    /// `None` once a producer handle or a stage shares the buffer.
    pub(crate) fn ring_buffer_mut(&mut self) -> Option<&mut RingBuffer<E>> {
        Arc::get_mut(&mut self.ring_buffer)
    }

    pub fn processors(&self) -> &[Arc<ProcessorControl>] {
        &self.controls
    }

    /// Spawn one thread per stage.
    pub fn start(&mut self) -> Result<Arc<RingBuffer<E>>> {
        if self.started {
            return Err(DisruptorError::AlreadyStarted);
        }
        self.started = true;

        let exception_handler = self
            .exception_handler
            .clone()
            .unwrap_or_else(|| Arc::new(FatalExceptionHandler));

        for (index, mut processor) in self.pending.drain(..).enumerate() {
            processor.set_exception_handler(exception_handler.clone());
            let handle = thread::Builder::new()
                .name(format!("{}-{}", self.thread_name, index))
                .spawn(move || {
                    if let Err(err) = processor.run() {
                        warn!(error = %err, "processor refused to run");
                    }
                })?;
            self.threads.push(handle);
        }

        info!(
            stages = self.controls.len(),
            capacity = self.ring_buffer.capacity(),
            "disruptor started"
        );
        Ok(self.ring_buffer.clone())
    }

    /// Stop every stage and cancel blocked producers, then join the threads.
    ///
    /// Events still in the buffer are not processed; see `shutdown`.
    pub fn halt(&mut self) {
        for control in &self.controls {
            control.halt();
        }
        self.ring_buffer.sequencer().halt();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("processor thread panicked");
            }
        }
        info!(cursor = self.ring_buffer.cursor(), "disruptor halted");
    }

    /// Wait for every published event to be processed, then halt.
    pub fn shutdown(&mut self) {
        while self.has_backlog() {
            thread::yield_now();
        }
        self.halt();
    }

    /// `shutdown` with a deadline; on timeout nothing is halted.
    pub fn shutdown_timeout(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.has_backlog() {
            if Instant::now() >= deadline {
                return Err(DisruptorError::Timeout);
            }
            thread::yield_now();
        }
        self.halt();
        Ok(())
    }

    /// A stage still counts while idle: its thread may not have entered
    /// `run` yet. Stages behind a halted stage can only reach what it reached.
    fn has_backlog(&self) -> bool {
        let mut reachable = self.ring_buffer.cursor();
        for control in &self.controls {
            let sequence = control.sequence().get();
            if control.state() == ProcessorState::Halted {
                reachable = reachable.min(sequence);
            } else if sequence < reachable {
                return true;
            }
        }
        false
    }
}

impl<E> Drop for Disruptor<E> {
    fn drop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        for control in &self.controls {
            control.halt();
        }
        self.ring_buffer.sequencer().halt();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl<E> fmt::Debug for Disruptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_disruptor(self, f)
    }
}

impl<E> Disruptor<E> {
    pub(crate) fn debug_parts(&self) -> (&Arc<RingBuffer<E>>, &[Arc<ProcessorControl>], bool, bool) {
        (
            &self.ring_buffer,
            &self.controls,
            self.exception_handler.is_some(),
            self.started,
        )
    }
}
