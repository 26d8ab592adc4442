mod builder;
mod consumer;
mod disruptor;
mod handler;
mod producer;

pub mod barrier;
pub mod rewind;
pub mod sequencer;
pub mod wait_strategy;

pub use barrier::SequenceBarrier;
pub use builder::DisruptorBuilder;
pub use consumer::{BatchEventProcessor, EventProcessor, ProcessorControl, ProcessorState};
pub use disruptor::{Disruptor, EventHandlerGroup};
pub use handler::{EventHandler, ExceptionHandler, FatalExceptionHandler, FnHandler, IgnoreExceptionHandler};
pub use rewind::{
    BatchRewindStrategy, EventuallyGiveUpBatchRewindStrategy, NanosecondPauseBatchRewindStrategy, RewindAction,
    SimpleBatchRewindStrategy,
};
pub use sequencer::{MultiProducerSequencer, ProducerType, Sequencer, SingleProducerSequencer};
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy, TimeoutBlockingWaitStrategy, WaitStrategy,
    WaitStrategyKind, YieldingWaitStrategy,
};

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub use Buffer::RingBuffer; // re-export for stable path
}
