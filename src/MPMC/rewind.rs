use std::fmt;
use std::thread;
use std::time::Duration;

use crate::error::RewindableError;

/// What to do with a batch whose handler asked for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewindAction {
    /// Re-deliver the whole batch from its first event.
    Rewind,
    /// Give up and treat the failure as fatal.
    Throw,
}

/// Retry policy for rewindable failures.
///
/// `retries_attempted` counts rewinds of the current batch, starting at 1 for
/// the first failure. The processor puts no cap on retries of its own.
/// Events before the failing one are delivered again on every rewind.
pub trait BatchRewindStrategy: Send + fmt::Debug {
    fn handle_rewind_exception(&mut self, error: &RewindableError, retries_attempted: u32) -> RewindAction;
}

/// Rewinds immediately, forever.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleBatchRewindStrategy;

impl BatchRewindStrategy for SimpleBatchRewindStrategy {
    fn handle_rewind_exception(&mut self, _error: &RewindableError, _retries_attempted: u32) -> RewindAction {
        RewindAction::Rewind
    }
}

/// Sleeps for a fixed number of nanoseconds, then rewinds.
#[derive(Debug, Clone, Copy)]
pub struct NanosecondPauseBatchRewindStrategy {
    pause: Duration,
}

impl NanosecondPauseBatchRewindStrategy {
    pub fn new(nanos: u64) -> Self {
        Self {
            pause: Duration::from_nanos(nanos),
        }
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }
}

impl BatchRewindStrategy for NanosecondPauseBatchRewindStrategy {
    fn handle_rewind_exception(&mut self, _error: &RewindableError, _retries_attempted: u32) -> RewindAction {
        thread::sleep(self.pause);
        RewindAction::Rewind
    }
}

/// Rewinds up to `max_attempts` times per batch, then throws.
#[derive(Debug, Clone, Copy)]
pub struct EventuallyGiveUpBatchRewindStrategy {
    max_attempts: u32,
}

impl EventuallyGiveUpBatchRewindStrategy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl BatchRewindStrategy for EventuallyGiveUpBatchRewindStrategy {
    fn handle_rewind_exception(&mut self, _error: &RewindableError, retries_attempted: u32) -> RewindAction {
        if retries_attempted > self.max_attempts {
            RewindAction::Throw
        } else {
            RewindAction::Rewind
        }
    }
}
