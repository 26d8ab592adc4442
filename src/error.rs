use std::fmt;
use std::io;
use thiserror::Error;

/// Failures of the ring-buffer engine itself.
#[derive(Debug, Error)]
pub enum DisruptorError {
    /// Non-blocking claim found no free slot.
    #[error("ring buffer has insufficient capacity")]
    InsufficientCapacity,

    /// A barrier was alerted while a consumer waited on it.
    #[error("sequence barrier alerted")]
    Alerted,

    /// The sequencer was halted; claims are cancelled.
    #[error("sequencer halted")]
    Halted,

    /// A bounded wait expired.
    #[error("timed out waiting for sequence")]
    Timeout,

    #[error("buffer size must be a non-zero power of two, got {0}")]
    InvalidBufferSize(usize),

    #[error("invalid sequence request: {0}")]
    InvalidSequence(i64),

    #[error("disruptor already started")]
    AlreadyStarted,

    #[error("failed to spawn processor thread: {0}")]
    ThreadSpawn(#[from] io::Error),
}

pub type Result<T, E = DisruptorError> = std::result::Result<T, E>;

/// A retry-eligible processing failure.
///
/// Returning one from an event handler registered with a rewind strategy
/// makes the processor consult the strategy instead of the exception handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rewindable failure: {message}")]
pub struct RewindableError {
    message: String,
}

impl RewindableError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Why an event handler could not process an event.
#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Rewindable(#[from] RewindableError),

    #[error("{0}")]
    Fatal(String),

    /// The handler panicked; the payload is kept when it was a string.
    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("argument {index} missing for method {method} of {contract}")]
    MissingArgument {
        contract: &'static str,
        method: u16,
        index: usize,
    },

    #[error("contract {contract} has no method with id {method}")]
    UnknownMethod { contract: &'static str, method: u16 },
}

impl EventError {
    pub fn fatal(message: impl fmt::Display) -> Self {
        Self::Fatal(message.to_string())
    }

    pub fn is_rewindable(&self) -> bool {
        matches!(self, Self::Rewindable(_))
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

/// Illegal-state conditions raised while creating a proxy.
///
/// All of them are detected eagerly, before any forwarder is handed out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("{contract} is not a capability contract; only traits can be proxied")]
    NotACapabilitySet { contract: &'static str },

    #[error("no exception handler registered on the disruptor")]
    MissingExceptionHandler,

    #[error("{contract} is not tagged with #[disruptor_proxy]")]
    MissingContractTag { contract: &'static str },

    #[error("at least one implementation of {contract} is required")]
    NoImplementations { contract: &'static str },

    #[error("handlers cannot be added once the disruptor has started")]
    AlreadyStarted,

    /// Slots carry no contract tag, so a disruptor replays for one proxy only.
    #[error("disruptor already has {stages} consumer stage(s); a proxy needs a disruptor of its own")]
    DisruptorInUse { stages: usize },
}
