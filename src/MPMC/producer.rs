// Publishing side of the ring buffer: claim, write in place, publish.
use std::sync::Arc;

use crate::error::Result;
use crate::MPMC::sequencer::Sequencer;
use crate::MPMC::Buffer::RingBuffer;

/// Publishes `[low, high]` when dropped.
///
/// A claimed sequence that is never published would stall every consumer
/// behind it, so the range goes out even if the writer panics.
struct PublishGuard<'a> {
    sequencer: &'a Arc<dyn Sequencer>,
    low: i64,
    high: i64,
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        if self.low == self.high {
            self.sequencer.publish(self.high);
        } else {
            self.sequencer.publish_range(self.low, self.high);
        }
    }
}

impl<E> RingBuffer<E> {
    /// Claim a slot (waiting for space), let `write` fill it, publish it.
    ///
    /// Fails only with `Halted` once the sequencer is shut down.
    pub fn publish_event<F>(&self, write: F) -> Result<i64>
    where
        F: FnOnce(&mut E, i64),
    {
        let sequence = self.sequencer.next()?;
        self.write_and_publish(sequence, write);
        Ok(sequence)
    }

    /// Like `publish_event` but fails with `InsufficientCapacity` instead of
    /// waiting. `write` is not called when the claim fails.
    pub fn try_publish_event<F>(&self, write: F) -> Result<i64>
    where
        F: FnOnce(&mut E, i64),
    {
        let sequence = self.sequencer.try_next()?;
        self.write_and_publish(sequence, write);
        Ok(sequence)
    }

    /// Claim `count` consecutive slots and publish them together.
    ///
    /// Consumers see either none or all of the batch.
    pub fn publish_events<F>(&self, count: usize, write: F) -> Result<i64>
    where
        F: FnMut(&mut E, i64),
    {
        let high = self.sequencer.next_n(count)?;
        self.write_range_and_publish(high - count as i64 + 1, high, write);
        Ok(high)
    }

    pub fn try_publish_events<F>(&self, count: usize, write: F) -> Result<i64>
    where
        F: FnMut(&mut E, i64),
    {
        let high = self.sequencer.try_next_n(count)?;
        self.write_range_and_publish(high - count as i64 + 1, high, write);
        Ok(high)
    }

    fn write_and_publish<F>(&self, sequence: i64, write: F)
    where
        F: FnOnce(&mut E, i64),
    {
        let _guard = PublishGuard {
            sequencer: &self.sequencer,
            low: sequence,
            high: sequence,
        };
        // SAFETY: `sequence` was just claimed by this thread and is not yet
        // published, so no other thread can reach this slot.
        let event = unsafe { self.slot_mut(sequence) };
        write(event, sequence);
    }

    fn write_range_and_publish<F>(&self, low: i64, high: i64, mut write: F)
    where
        F: FnMut(&mut E, i64),
    {
        let _guard = PublishGuard {
            sequencer: &self.sequencer,
            low,
            high,
        };
        for sequence in low..=high {
            // SAFETY: the whole range is claimed by this thread.
            let event = unsafe { self.slot_mut(sequence) };
            write(event, sequence);
        }
    }
}
