use std::sync::Arc;

use super::disruptor::Disruptor;
use super::sequencer::{create_sequencer, ProducerType};
use super::wait_strategy::{WaitStrategy, WaitStrategyKind};
use crate::error::Result;
use crate::MPMC::Buffer::RingBuffer;

pub struct DisruptorBuilder {
    buffer_size: usize,
    producer_type: ProducerType,
    wait_strategy: Arc<dyn WaitStrategy>,
    thread_name: String,
}

impl Default for DisruptorBuilder {
    fn default() -> Self {
        Self {
            buffer_size: 1024, // 1024 slots
            producer_type: ProducerType::Multi,
            wait_strategy: WaitStrategyKind::Blocking.build(),
            thread_name: "dmxp-processor".to_string(),
        }
    }
}

impl DisruptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots; must be a non-zero power of two.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_producer_type(mut self, producer_type: ProducerType) -> Self {
        self.producer_type = producer_type;
        self
    }

    pub fn with_wait_strategy(mut self, strategy: impl WaitStrategy + 'static) -> Self {
        self.wait_strategy = Arc::new(strategy);
        self
    }

    pub fn with_wait_strategy_kind(mut self, kind: WaitStrategyKind) -> Self {
        self.wait_strategy = kind.build();
        self
    }

    /// Prefix for consumer thread names; stage `n` runs on `<prefix>-<n>`.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Pre-allocate every slot with `factory` and assemble the disruptor.
    pub fn build<E, F>(self, factory: F) -> Result<Disruptor<E>>
    where
        E: Send + 'static,
        F: FnMut() -> E,
    {
        let sequencer = create_sequencer(self.producer_type, self.buffer_size, self.wait_strategy)?;
        let ring_buffer = RingBuffer::with_sequencer(factory, sequencer);
        Ok(Disruptor::from_parts(ring_buffer, self.thread_name))
    }
}
