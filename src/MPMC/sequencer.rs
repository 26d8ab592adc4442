use crossbeam_utils::CachePadded;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;

use super::barrier::SequenceBarrier;
use super::wait_strategy::WaitStrategy;
use crate::error::{DisruptorError, Result};
use crate::Core::sequence::{minimum_sequence, Sequence, INITIAL_CURSOR_VALUE};

/// Whether one thread or many will claim sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerType {
    Single,
    #[default]
    Multi,
}

/// Hands out sequences to producers and keeps them from lapping consumers.
///
/// A claim for sequence `s` only succeeds once
/// `s - min(gating sequences) <= buffer_size`, i.e. no consumer is still
/// reading the slot `s` maps to.
pub trait Sequencer: Send + Sync + fmt::Debug {
    fn buffer_size(&self) -> usize;

    fn cursor(&self) -> &Arc<Sequence>;

    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy>;

    /// Claim the next sequence, waiting for space.
    fn next(&self) -> Result<i64> {
        self.next_n(1)
    }

    /// Claim `n` consecutive sequences and return the highest.
    fn next_n(&self, n: usize) -> Result<i64>;

    /// Claim the next sequence or fail with `InsufficientCapacity`.
    fn try_next(&self) -> Result<i64> {
        self.try_next_n(1)
    }

    fn try_next_n(&self, n: usize) -> Result<i64>;

    /// Make a claimed and written sequence visible to consumers.
    fn publish(&self, sequence: i64);

    fn publish_range(&self, low: i64, high: i64);

    fn is_available(&self, sequence: i64) -> bool;

    /// Highest sequence in `[next_sequence, available]` that can be read
    /// without skipping an unpublished one.
    fn highest_published_sequence(&self, next_sequence: i64, available: i64) -> i64;

    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]);

    fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool;

    /// Minimum over gating sequences and the cursor.
    fn minimum_sequence(&self) -> i64;

    fn remaining_capacity(&self) -> i64;

    /// Cancel all current and future claims.
    fn halt(&self);

    fn is_halted(&self) -> bool;
}

/// Build a barrier over `sequencer` that also waits on `dependents`.
pub fn new_barrier(
    sequencer: &Arc<dyn Sequencer>,
    dependents: Vec<Arc<Sequence>>,
) -> SequenceBarrier {
    SequenceBarrier::new(sequencer.clone(), dependents)
}

fn check_batch(n: usize, buffer_size: usize) -> Result<()> {
    if n < 1 || n > buffer_size {
        return Err(DisruptorError::InvalidSequence(n as i64));
    }
    Ok(())
}

/// State shared by both sequencer flavours.
struct SequencerCore {
    buffer_size: usize,
    cursor: Arc<Sequence>,
    gating_sequences: RwLock<Vec<Arc<Sequence>>>,
    wait_strategy: Arc<dyn WaitStrategy>,
    halted: AtomicBool,
}

impl SequencerCore {
    fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Result<Self> {
        if buffer_size == 0 || !buffer_size.is_power_of_two() {
            return Err(DisruptorError::InvalidBufferSize(buffer_size));
        }
        Ok(Self {
            buffer_size,
            cursor: Arc::new(Sequence::new(INITIAL_CURSOR_VALUE)),
            gating_sequences: RwLock::new(Vec::new()),
            wait_strategy,
            halted: AtomicBool::new(false),
        })
    }

    #[inline]
    fn gating_minimum(&self, default: i64) -> i64 {
        minimum_sequence(&self.gating_sequences.read(), default)
    }

    fn add(&self, sequences: &[Arc<Sequence>]) {
        let cursor = self.cursor.get();
        let mut gating = self.gating_sequences.write();
        for sequence in sequences {
            // A late joiner starts at the cursor so it is not handed stale slots
            sequence.set(cursor);
            gating.push(sequence.clone());
        }
    }

    fn remove(&self, sequence: &Arc<Sequence>) -> bool {
        let mut gating = self.gating_sequences.write();
        let before = gating.len();
        gating.retain(|s| !Arc::ptr_eq(s, sequence));
        gating.len() != before
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    #[inline]
    fn check_halted(&self) -> Result<()> {
        if self.halted.load(Ordering::Acquire) {
            return Err(DisruptorError::Halted);
        }
        Ok(())
    }
}

/// Sequencer for exactly one publishing thread.
///
/// Claims are plain loads and stores; calling `next` from two threads at
/// once will hand out the same sequence twice.
pub struct SingleProducerSequencer {
    core: SequencerCore,
    next_value: CachePadded<AtomicI64>,
    cached_value: CachePadded<AtomicI64>,
}

impl SingleProducerSequencer {
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Result<Self> {
        Ok(Self {
            core: SequencerCore::new(buffer_size, wait_strategy)?,
            next_value: CachePadded::new(AtomicI64::new(INITIAL_CURSOR_VALUE)),
            cached_value: CachePadded::new(AtomicI64::new(INITIAL_CURSOR_VALUE)),
        })
    }

    fn has_available_capacity(&self, required: usize, next_value: i64) -> bool {
        let wrap_point = next_value + required as i64 - self.core.buffer_size as i64;
        let cached = self.cached_value.load(Ordering::Relaxed);

        if wrap_point > cached || cached > next_value {
            self.core.cursor.set_volatile(next_value);
            let min = self.core.gating_minimum(next_value);
            self.cached_value.store(min, Ordering::Relaxed);
            if wrap_point > min {
                return false;
            }
        }
        true
    }
}

impl Sequencer for SingleProducerSequencer {
    fn buffer_size(&self) -> usize {
        self.core.buffer_size
    }

    fn cursor(&self) -> &Arc<Sequence> {
        &self.core.cursor
    }

    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.core.wait_strategy
    }

    fn next_n(&self, n: usize) -> Result<i64> {
        check_batch(n, self.core.buffer_size)?;
        self.core.check_halted()?;

        let next_value = self.next_value.load(Ordering::Relaxed);
        let next_sequence = next_value + n as i64;
        let wrap_point = next_sequence - self.core.buffer_size as i64;
        let cached = self.cached_value.load(Ordering::Relaxed);

        if wrap_point > cached || cached > next_value {
            self.core.cursor.set_volatile(next_value);
            let mut min = self.core.gating_minimum(next_value);
            while wrap_point > min {
                self.core.check_halted()?;
                thread::yield_now();
                min = self.core.gating_minimum(next_value);
            }
            self.cached_value.store(min, Ordering::Relaxed);
        }

        self.next_value.store(next_sequence, Ordering::Relaxed);
        Ok(next_sequence)
    }

    fn try_next_n(&self, n: usize) -> Result<i64> {
        check_batch(n, self.core.buffer_size)?;
        self.core.check_halted()?;

        let next_value = self.next_value.load(Ordering::Relaxed);
        if !self.has_available_capacity(n, next_value) {
            return Err(DisruptorError::InsufficientCapacity);
        }
        let next_sequence = next_value + n as i64;
        self.next_value.store(next_sequence, Ordering::Relaxed);
        Ok(next_sequence)
    }

    fn publish(&self, sequence: i64) {
        self.core.cursor.set(sequence);
        self.core.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, _low: i64, high: i64) {
        self.publish(high);
    }

    fn is_available(&self, sequence: i64) -> bool {
        let current = self.core.cursor.get();
        sequence <= current && sequence > current - self.core.buffer_size as i64
    }

    fn highest_published_sequence(&self, _next_sequence: i64, available: i64) -> i64 {
        available
    }

    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.core.add(sequences);
    }

    fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.core.remove(sequence)
    }

    fn minimum_sequence(&self) -> i64 {
        self.core.gating_minimum(self.core.cursor.get())
    }

    fn remaining_capacity(&self) -> i64 {
        let next_value = self.next_value.load(Ordering::Relaxed);
        let consumed = self.core.gating_minimum(next_value);
        self.core.buffer_size as i64 - (next_value - consumed)
    }

    fn halt(&self) {
        self.core.halt();
    }

    fn is_halted(&self) -> bool {
        self.core.halted.load(Ordering::Acquire)
    }
}

impl fmt::Debug for SingleProducerSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleProducerSequencer")
            .field("buffer_size", &self.core.buffer_size)
            .field("cursor", &self.core.cursor.get())
            .field("next_value", &self.next_value.load(Ordering::Relaxed))
            .field("gating", &self.core.gating_sequences.read().len())
            .finish()
    }
}

/// Sequencer safe for any number of publishing threads.
///
/// The cursor tracks the highest *claimed* sequence. Which claimed slots are
/// actually published is recorded per slot in `available_buffer` as the lap
/// number of the sequence that last wrote it, so consumers can find the
/// contiguous published prefix without a shared lock.
pub struct MultiProducerSequencer {
    core: SequencerCore,
    gating_cache: CachePadded<AtomicI64>,
    available_buffer: Box<[AtomicI32]>,
    index_mask: i64,
    index_shift: u32,
}

impl MultiProducerSequencer {
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Result<Self> {
        let core = SequencerCore::new(buffer_size, wait_strategy)?;
        let available_buffer = (0..buffer_size)
            .map(|_| AtomicI32::new(-1))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self {
            core,
            gating_cache: CachePadded::new(AtomicI64::new(INITIAL_CURSOR_VALUE)),
            available_buffer,
            index_mask: buffer_size as i64 - 1,
            index_shift: buffer_size.trailing_zeros(),
        })
    }

    fn has_available_capacity(&self, required: usize, cursor_value: i64) -> bool {
        let wrap_point = cursor_value + required as i64 - self.core.buffer_size as i64;
        let cached = self.gating_cache.load(Ordering::Acquire);

        if wrap_point > cached || cached > cursor_value {
            let min = self.core.gating_minimum(cursor_value);
            self.gating_cache.store(min, Ordering::Release);
            if wrap_point > min {
                return false;
            }
        }
        true
    }

    #[inline]
    fn set_available(&self, sequence: i64) {
        let index = (sequence & self.index_mask) as usize;
        let flag = (sequence >> self.index_shift) as i32;
        self.available_buffer[index].store(flag, Ordering::Release);
    }
}

impl Sequencer for MultiProducerSequencer {
    fn buffer_size(&self) -> usize {
        self.core.buffer_size
    }

    fn cursor(&self) -> &Arc<Sequence> {
        &self.core.cursor
    }

    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.core.wait_strategy
    }

    fn next_n(&self, n: usize) -> Result<i64> {
        check_batch(n, self.core.buffer_size)?;

        loop {
            self.core.check_halted()?;

            let current = self.core.cursor.get();
            let next = current + n as i64;
            let wrap_point = next - self.core.buffer_size as i64;
            let cached = self.gating_cache.load(Ordering::Acquire);

            if wrap_point > cached || cached > current {
                let gating = self.core.gating_minimum(current);
                if wrap_point > gating {
                    thread::yield_now();
                    continue;
                }
                self.gating_cache.store(gating, Ordering::Release);
            } else if self.core.cursor.compare_and_set(current, next) {
                return Ok(next);
            }
        }
    }

    fn try_next_n(&self, n: usize) -> Result<i64> {
        check_batch(n, self.core.buffer_size)?;

        loop {
            self.core.check_halted()?;

            let current = self.core.cursor.get();
            let next = current + n as i64;
            if !self.has_available_capacity(n, current) {
                return Err(DisruptorError::InsufficientCapacity);
            }
            if self.core.cursor.compare_and_set(current, next) {
                return Ok(next);
            }
        }
    }

    fn publish(&self, sequence: i64) {
        self.set_available(sequence);
        self.core.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, low: i64, high: i64) {
        for sequence in low..=high {
            self.set_available(sequence);
        }
        self.core.wait_strategy.signal_all_when_blocking();
    }

    fn is_available(&self, sequence: i64) -> bool {
        let index = (sequence & self.index_mask) as usize;
        let flag = (sequence >> self.index_shift) as i32;
        self.available_buffer[index].load(Ordering::Acquire) == flag
    }

    fn highest_published_sequence(&self, next_sequence: i64, available: i64) -> i64 {
        for sequence in next_sequence..=available {
            if !self.is_available(sequence) {
                return sequence - 1;
            }
        }
        available
    }

    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.core.add(sequences);
    }

    fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.core.remove(sequence)
    }

    fn minimum_sequence(&self) -> i64 {
        self.core.gating_minimum(self.core.cursor.get())
    }

    fn remaining_capacity(&self) -> i64 {
        let produced = self.core.cursor.get();
        let consumed = self.core.gating_minimum(produced);
        self.core.buffer_size as i64 - (produced - consumed)
    }

    fn halt(&self) {
        self.core.halt();
    }

    fn is_halted(&self) -> bool {
        self.core.halted.load(Ordering::Acquire)
    }
}

impl fmt::Debug for MultiProducerSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiProducerSequencer")
            .field("buffer_size", &self.core.buffer_size)
            .field("cursor", &self.core.cursor.get())
            .field("gating", &self.core.gating_sequences.read().len())
            .finish()
    }
}

/// Create the sequencer matching `producer_type`.
pub fn create_sequencer(
    producer_type: ProducerType,
    buffer_size: usize,
    wait_strategy: Arc<dyn WaitStrategy>,
) -> Result<Arc<dyn Sequencer>> {
    Ok(match producer_type {
        ProducerType::Single => Arc::new(SingleProducerSequencer::new(buffer_size, wait_strategy)?),
        ProducerType::Multi => Arc::new(MultiProducerSequencer::new(buffer_size, wait_strategy)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MPMC::wait_strategy::BusySpinWaitStrategy;

    fn both(size: usize) -> Vec<Arc<dyn Sequencer>> {
        [ProducerType::Single, ProducerType::Multi]
            .into_iter()
            .map(|p| create_sequencer(p, size, Arc::new(BusySpinWaitStrategy)).unwrap())
            .collect()
    }

    #[test]
    fn rejects_sizes_that_are_not_powers_of_two() {
        for size in [0, 3, 6, 100] {
            let err = MultiProducerSequencer::new(size, Arc::new(BusySpinWaitStrategy)).unwrap_err();
            assert!(matches!(err, DisruptorError::InvalidBufferSize(s) if s == size));
        }
        assert!(SingleProducerSequencer::new(1, Arc::new(BusySpinWaitStrategy)).is_ok());
    }

    #[test]
    fn try_next_reports_full_against_gating_sequence() {
        for sequencer in both(4) {
            let consumer = Arc::new(Sequence::default());
            sequencer.add_gating_sequences(&[consumer.clone()]);

            for expected in 0..4 {
                let seq = sequencer.try_next().unwrap();
                assert_eq!(seq, expected);
                sequencer.publish(seq);
            }
            assert!(matches!(sequencer.try_next(), Err(DisruptorError::InsufficientCapacity)));
            assert_eq!(sequencer.remaining_capacity(), 0);

            consumer.set(1);
            assert_eq!(sequencer.try_next().unwrap(), 4);
            assert_eq!(sequencer.try_next().unwrap(), 5);
            assert!(sequencer.try_next().is_err());
        }
    }

    #[test]
    fn multi_producer_exposes_only_contiguous_publications() {
        let sequencer = MultiProducerSequencer::new(8, Arc::new(BusySpinWaitStrategy)).unwrap();
        let a = sequencer.next().unwrap();
        let b = sequencer.next().unwrap();
        let c = sequencer.next().unwrap();
        assert_eq!((a, b, c), (0, 1, 2));

        sequencer.publish(a);
        sequencer.publish(c);
        assert_eq!(sequencer.highest_published_sequence(0, 2), 0);
        sequencer.publish(b);
        assert_eq!(sequencer.highest_published_sequence(0, 2), 2);
    }

    #[test]
    fn availability_flag_tracks_laps() {
        let sequencer = MultiProducerSequencer::new(2, Arc::new(BusySpinWaitStrategy)).unwrap();
        for s in 0..2 {
            sequencer.next().unwrap();
            sequencer.publish(s);
        }
        assert!(sequencer.is_available(1));
        // Same slot, next lap
        assert!(!sequencer.is_available(3));
    }

    #[test]
    fn halt_cancels_blocked_claim() {
        for sequencer in both(2) {
            let consumer = Arc::new(Sequence::default());
            sequencer.add_gating_sequences(&[consumer]);
            sequencer.next_n(2).unwrap();
            sequencer.publish_range(0, 1);

            let blocked = {
                let sequencer = sequencer.clone();
                thread::spawn(move || sequencer.next())
            };
            thread::sleep(std::time::Duration::from_millis(20));
            sequencer.halt();
            assert!(matches!(blocked.join().unwrap(), Err(DisruptorError::Halted)));
            assert!(matches!(sequencer.try_next(), Err(DisruptorError::Halted)));
        }
    }

    #[test]
    fn gating_sequences_join_at_cursor_and_can_leave() {
        for sequencer in both(8) {
            let seq = sequencer.next_n(3).unwrap();
            sequencer.publish_range(0, seq);
            let late = Arc::new(Sequence::default());
            sequencer.add_gating_sequences(&[late.clone()]);
            assert_eq!(late.get(), 2);
            assert!(sequencer.remove_gating_sequence(&late));
            assert!(!sequencer.remove_gating_sequence(&late));
        }
    }
}
