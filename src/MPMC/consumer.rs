// In src/MPMC/consumer.rs
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::barrier::SequenceBarrier;
use super::handler::{EventHandler, ExceptionHandler, FatalExceptionHandler};
use super::rewind::{BatchRewindStrategy, RewindAction};
use crate::error::{DisruptorError, EventError, Result};
use crate::Core::sequence::Sequence;
use crate::Core::trace::{debug, error, warn};
use crate::MPMC::Buffer::RingBuffer;

const IDLE: u8 = 0;
const HALTED: u8 = 1;
const RUNNING: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Halted,
    Running,
}

/// The part of a processor other threads may touch: its progress sequence,
/// its barrier and its run state.
pub struct ProcessorControl {
    state: AtomicU8,
    sequence: Arc<Sequence>,
    barrier: Arc<SequenceBarrier>,
}

impl ProcessorControl {
    fn new(barrier: Arc<SequenceBarrier>) -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            sequence: Arc::new(Sequence::default()),
            barrier,
        }
    }

    pub fn state(&self) -> ProcessorState {
        match self.state.load(Ordering::Acquire) {
            IDLE => ProcessorState::Idle,
            RUNNING => ProcessorState::Running,
            _ => ProcessorState::Halted,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == ProcessorState::Running
    }

    /// Stop the processor once it finishes its current event. Interrupts any
    /// wait it is in.
    pub fn halt(&self) {
        self.state.store(HALTED, Ordering::Release);
        self.barrier.alert();
    }

    /// Last sequence this processor has fully handled.
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    pub fn barrier(&self) -> &Arc<SequenceBarrier> {
        &self.barrier
    }
}

impl fmt::Debug for ProcessorControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorControl")
            .field("state", &self.state())
            .field("sequence", &self.sequence.get())
            .finish()
    }
}

/// A consumer loop that can be moved onto its own thread.
pub trait EventProcessor<E>: Send {
    fn control(&self) -> &Arc<ProcessorControl>;

    fn set_exception_handler(&mut self, handler: Arc<dyn ExceptionHandler<E>>);

    /// Run until halted. Fails with `AlreadyStarted` if already running.
    fn run(&mut self) -> Result<()>;
}

/// Drains batches from a barrier into one `EventHandler`.
///
/// Each wake-up delivers every sequence from the processor's position + 1 up
/// to what the barrier reported, flags the last one as end of batch, and
/// then advances the processor's sequence to the end of the batch, which is
/// what releases those slots to producers.
pub struct BatchEventProcessor<E, H> {
    ring_buffer: Arc<RingBuffer<E>>,
    handler: H,
    control: Arc<ProcessorControl>,
    exception_handler: Arc<dyn ExceptionHandler<E>>,
    rewind_strategy: Option<Box<dyn BatchRewindStrategy>>,
    retries_attempted: u32,
}

impl<E, H> BatchEventProcessor<E, H>
where
    E: Send + 'static,
    H: EventHandler<E>,
{
    /// Processors are created by the `Disruptor`, which keeps stages in a
    /// chain so no two processors own the same slot at once.
    pub(crate) fn new(ring_buffer: Arc<RingBuffer<E>>, barrier: SequenceBarrier, handler: H) -> Self {
        Self {
            ring_buffer,
            handler,
            control: Arc::new(ProcessorControl::new(Arc::new(barrier))),
            exception_handler: Arc::new(FatalExceptionHandler),
            rewind_strategy: None,
            retries_attempted: 0,
        }
    }

    pub(crate) fn with_rewind_strategy(mut self, strategy: Box<dyn BatchRewindStrategy>) -> Self {
        self.rewind_strategy = Some(strategy);
        self
    }

    fn notify_start(&mut self) {
        if let Err(err) = self.handler.on_start() {
            self.exception_handler.handle_on_start_exception(err);
        }
    }

    fn notify_shutdown(&mut self) {
        if let Err(err) = self.handler.on_shutdown() {
            self.exception_handler.handle_on_shutdown_exception(err);
        }
    }

    fn process_events(&mut self) {
        let sequence = self.control.sequence.clone();
        let barrier = self.control.barrier.clone();
        let mut next_sequence = sequence.get() + 1;

        loop {
            let start_of_batch = next_sequence;

            let available = match barrier.wait_for(next_sequence) {
                Ok(available) => available,
                Err(DisruptorError::Alerted) => {
                    if !self.control.is_running() {
                        break;
                    }
                    continue;
                }
                Err(DisruptorError::Timeout) => {
                    self.handler.on_timeout(sequence.get());
                    continue;
                }
                Err(err) => {
                    error!(error = %err, "barrier failed, stopping processor");
                    break;
                }
            };

            if available < next_sequence {
                continue;
            }

            self.handler
                .on_batch_start(available - next_sequence + 1, available - sequence.get());

            let (failed_at, err) = match self.deliver(next_sequence, available) {
                Ok(()) => {
                    self.retries_attempted = 0;
                    sequence.set(available);
                    next_sequence = available + 1;
                    continue;
                }
                Err(failure) => failure,
            };

            let err = match self.try_rewind(err) {
                Ok(()) => {
                    next_sequence = start_of_batch;
                    continue;
                }
                Err(err) => err,
            };

            // SAFETY: `failed_at` lies in the batch this stage currently owns.
            let event = unsafe { self.ring_buffer.slot_mut(failed_at) };
            match self.exception_handler.handle_event_exception(err, failed_at, event) {
                Ok(()) => {
                    sequence.set(failed_at);
                    next_sequence = failed_at + 1;
                }
                Err(_) => {
                    self.control.state.store(HALTED, Ordering::Release);
                    break;
                }
            }
        }
    }

    /// Hand `[from, to]` to the handler; stops at the first failure.
    fn deliver(&mut self, from: i64, to: i64) -> std::result::Result<(), (i64, EventError)> {
        let ring_buffer = &self.ring_buffer;
        let handler = &mut self.handler;

        for sequence in from..=to {
            // SAFETY: the barrier released `[from, to]` to this stage and no
            // later stage can reach past this processor's sequence.
            let event = unsafe { ring_buffer.slot_mut(sequence) };
            let end_of_batch = sequence == to;
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| handler.on_event(event, sequence, end_of_batch)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err((sequence, err)),
                Err(payload) => return Err((sequence, EventError::from_panic(payload))),
            }
        }
        Ok(())
    }

    /// `Ok` means redeliver the batch; `Err` hands the failure on as fatal.
    fn try_rewind(&mut self, err: EventError) -> std::result::Result<(), EventError> {
        let rewindable = match err {
            EventError::Rewindable(rewindable) => rewindable,
            other => return Err(other),
        };
        let Some(strategy) = self.rewind_strategy.as_mut() else {
            return Err(EventError::Rewindable(rewindable));
        };

        self.retries_attempted += 1;
        match strategy.handle_rewind_exception(&rewindable, self.retries_attempted) {
            RewindAction::Rewind => {
                debug!(retries = self.retries_attempted, "rewinding batch");
                Ok(())
            }
            RewindAction::Throw => {
                warn!(retries = self.retries_attempted, "rewind strategy gave up");
                self.retries_attempted = 0;
                Err(EventError::Rewindable(rewindable))
            }
        }
    }
}

impl<E, H> EventProcessor<E> for BatchEventProcessor<E, H>
where
    E: Send + 'static,
    H: EventHandler<E>,
{
    fn control(&self) -> &Arc<ProcessorControl> {
        &self.control
    }

    fn set_exception_handler(&mut self, handler: Arc<dyn ExceptionHandler<E>>) {
        self.exception_handler = handler;
    }

    fn run(&mut self) -> Result<()> {
        // Cleared before leaving IDLE so a halt racing with start is never lost
        self.control.barrier.clear_alert();

        match self
            .control
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(RUNNING) => return Err(DisruptorError::AlreadyStarted),
            Err(_) => {
                debug!("processor halted before it started");
                return Ok(());
            }
        }

        debug!(sequence = self.control.sequence.get(), "processor running");
        self.notify_start();
        self.process_events();
        self.notify_shutdown();
        self.control.state.store(HALTED, Ordering::Release);
        debug!(sequence = self.control.sequence.get(), "processor halted");
        Ok(())
    }
}
