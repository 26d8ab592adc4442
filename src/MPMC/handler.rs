use std::fmt;

use crate::error::EventError;
use crate::Core::trace::{error, warn};

/// Consumer-side callback for one stage of the pipeline.
///
/// The handler owns the event exclusively for the duration of the call;
/// changes it makes are visible to later stages.
pub trait EventHandler<E>: Send {
    /// `end_of_batch` is true for the last sequence that was available when
    /// the current batch was drawn.
    fn on_event(&mut self, event: &mut E, sequence: i64, end_of_batch: bool) -> Result<(), EventError>;

    /// Called before the first event of each batch.
    fn on_batch_start(&mut self, _batch_size: i64, _queue_depth: i64) {}

    fn on_start(&mut self) -> Result<(), EventError> {
        Ok(())
    }

    fn on_shutdown(&mut self) -> Result<(), EventError> {
        Ok(())
    }

    /// Called when a timing-out wait strategy gives up with `sequence` as
    /// the last processed value.
    fn on_timeout(&mut self, _sequence: i64) {}
}

/// Receives fatal failures from event processors.
///
/// Returning `Err` halts the processor; returning `Ok` skips the event and
/// carries on with the next sequence.
pub trait ExceptionHandler<E>: Send + Sync {
    fn handle_event_exception(&self, error: EventError, sequence: i64, event: &E) -> Result<(), EventError>;

    fn handle_on_start_exception(&self, error: EventError);

    fn handle_on_shutdown_exception(&self, error: EventError);
}

/// Logs the failure and halts the processor.
#[derive(Debug, Default, Clone, Copy)]
pub struct FatalExceptionHandler;

impl<E> ExceptionHandler<E> for FatalExceptionHandler {
    fn handle_event_exception(&self, err: EventError, sequence: i64, _event: &E) -> Result<(), EventError> {
        error!(sequence, error = %err, "fatal failure while processing event");
        Err(err)
    }

    fn handle_on_start_exception(&self, err: EventError) {
        error!(error = %err, "failure on processor start");
    }

    fn handle_on_shutdown_exception(&self, err: EventError) {
        error!(error = %err, "failure on processor shutdown");
    }
}

/// Logs the failure and moves on to the next event.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreExceptionHandler;

impl<E> ExceptionHandler<E> for IgnoreExceptionHandler {
    fn handle_event_exception(&self, err: EventError, sequence: i64, _event: &E) -> Result<(), EventError> {
        warn!(sequence, error = %err, "ignoring failure while processing event");
        Ok(())
    }

    fn handle_on_start_exception(&self, err: EventError) {
        warn!(error = %err, "ignoring failure on processor start");
    }

    fn handle_on_shutdown_exception(&self, err: EventError) {
        warn!(error = %err, "ignoring failure on processor shutdown");
    }
}

/// Closure handler, handy for tests and small pipelines.
pub struct FnHandler<F>(pub F);

impl<E, F> EventHandler<E> for FnHandler<F>
where
    F: FnMut(&mut E, i64, bool) -> Result<(), EventError> + Send,
{
    fn on_event(&mut self, event: &mut E, sequence: i64, end_of_batch: bool) -> Result<(), EventError> {
        (self.0)(event, sequence, end_of_batch)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}
