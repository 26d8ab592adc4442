use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::sequencer::Sequencer;
use crate::error::{DisruptorError, Result};
use crate::Core::sequence::Sequence;

/// A consumer's view of what it may read.
///
/// Available means published by producers *and* processed by every upstream
/// stage in `dependents`.
pub struct SequenceBarrier {
    sequencer: Arc<dyn Sequencer>,
    dependents: Vec<Arc<Sequence>>,
    alerted: AtomicBool,
}

impl SequenceBarrier {
    pub(crate) fn new(sequencer: Arc<dyn Sequencer>, dependents: Vec<Arc<Sequence>>) -> Self {
        Self {
            sequencer,
            dependents,
            alerted: AtomicBool::new(false),
        }
    }

    /// Wait until `sequence` can be read and return the highest sequence that
    /// can, which may be well past `sequence`.
    ///
    /// The result can be lower than `sequence` when another producer still
    /// holds an unpublished claim below it; callers simply wait again.
    pub fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.check_alert()?;

        let available = self.sequencer.wait_strategy().wait_for(
            sequence,
            self.sequencer.cursor(),
            &self.dependents,
            &|| self.is_alerted(),
        )?;

        if available < sequence {
            return Ok(available);
        }
        Ok(self.sequencer.highest_published_sequence(sequence, available))
    }

    pub fn cursor(&self) -> i64 {
        self.sequencer.cursor().get()
    }

    pub fn dependents(&self) -> &[Arc<Sequence>] {
        &self.dependents
    }

    pub fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    /// Interrupt any wait on this barrier.
    pub fn alert(&self) {
        self.alerted.store(true, Ordering::Release);
        self.sequencer.wait_strategy().signal_all_when_blocking();
    }

    pub fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }

    pub fn check_alert(&self) -> Result<()> {
        if self.is_alerted() {
            return Err(DisruptorError::Alerted);
        }
        Ok(())
    }
}

impl fmt::Debug for SequenceBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceBarrier")
            .field("cursor", &self.cursor())
            .field("dependents", &self.dependents)
            .field("alerted", &self.is_alerted())
            .finish()
    }
}
