use std::cell::UnsafeCell;
use std::fmt;
use std::sync::Arc;

use super::Buffer::RingBuffer;
use crate::error::Result;
use crate::Core::sequence::Sequence;
use crate::MPMC::barrier::SequenceBarrier;
use crate::MPMC::sequencer::{create_sequencer, new_barrier, ProducerType, Sequencer};
use crate::MPMC::wait_strategy::WaitStrategy;

impl<E> RingBuffer<E> {
    /// Build a buffer of `capacity` events, each produced by `factory`.
    ///
    /// `capacity` must be a non-zero power of two.
    pub fn new<F>(
        factory: F,
        capacity: usize,
        producer_type: ProducerType,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self>
    where
        F: FnMut() -> E,
    {
        let sequencer = create_sequencer(producer_type, capacity, wait_strategy)?;
        Ok(Self::with_sequencer(factory, sequencer))
    }

    pub fn with_sequencer<F>(mut factory: F, sequencer: Arc<dyn Sequencer>) -> Self
    where
        F: FnMut() -> E,
    {
        let capacity = sequencer.buffer_size();
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(factory()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            mask: capacity as i64 - 1,
            sequencer,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Highest sequence claimed (multi producer) or published (single producer).
    #[inline]
    pub fn cursor(&self) -> i64 {
        self.sequencer.cursor().get()
    }

    pub fn sequencer(&self) -> &Arc<dyn Sequencer> {
        &self.sequencer
    }

    pub fn new_barrier(&self, dependents: Vec<Arc<Sequence>>) -> SequenceBarrier {
        new_barrier(&self.sequencer, dependents)
    }

    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.sequencer.add_gating_sequences(sequences);
    }

    pub fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.sequencer.remove_gating_sequence(sequence)
    }

    /// Progress of the slowest gating consumer (or the cursor if none).
    pub fn minimum_gating_sequence(&self) -> i64 {
        self.sequencer.minimum_sequence()
    }

    pub fn remaining_capacity(&self) -> i64 {
        self.sequencer.remaining_capacity()
    }

    pub fn is_published(&self, sequence: i64) -> bool {
        self.sequencer.is_available(sequence)
    }

    /// Mutable access to the event for `sequence`.
    ///
    /// # Safety
    /// The caller must own `sequence`: either a producer holding an
    /// unpublished claim on it, or the single consumer stage that the
    /// barrier has handed it to.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slot_mut(&self, sequence: i64) -> &mut E {
        let index = (sequence & self.mask) as usize;
        &mut *self.slots.get_unchecked(index).get()
    }

    /// Every slot, for setup while nothing else holds the buffer.
    pub fn slots_mut(&mut self) -> impl Iterator<Item = &mut E> {
        self.slots.iter_mut().map(UnsafeCell::get_mut)
    }
}

impl<E> fmt::Debug for RingBuffer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_ring_buffer(self, f)
    }
}
