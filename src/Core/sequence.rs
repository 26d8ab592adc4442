use crossbeam_utils::CachePadded;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Value every sequence starts from: nothing claimed, nothing processed.
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// A cache-line padded 64-bit counter.
///
/// Used for the producer cursor and for every consumer's progress (gating)
/// sequence. Writes are `Release` and reads `Acquire` so that whatever a
/// thread wrote into a slot before moving a sequence is visible to the thread
/// that observes the new value.
pub struct Sequence {
    value: CachePadded<AtomicI64>,
}

impl Sequence {
    pub fn new(initial: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial)),
        }
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Store with a full fence; pairs with `SeqCst` loads on the waiting side.
    #[inline]
    pub fn set_volatile(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }

    #[inline]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Atomically add `delta` and return the new value.
    #[inline]
    pub fn add_and_get(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::AcqRel) + delta
    }

    #[inline]
    pub(crate) fn relaxed(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(INITIAL_CURSOR_VALUE)
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sequence").field(&self.get()).finish()
    }
}

/// Smallest value among `sequences`, or `default` if the slice is empty.
pub fn minimum_sequence(sequences: &[Arc<Sequence>], default: i64) -> i64 {
    sequences
        .iter()
        .map(|s| s.get())
        .min()
        .map_or(default, |m| m.min(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_initial_cursor_value() {
        assert_eq!(Sequence::default().get(), INITIAL_CURSOR_VALUE);
        assert_eq!(Sequence::new(7).get(), 7);
    }

    #[test]
    fn compare_and_set_only_moves_from_expected() {
        let seq = Sequence::new(4);
        assert!(!seq.compare_and_set(3, 10));
        assert_eq!(seq.get(), 4);
        assert!(seq.compare_and_set(4, 10));
        assert_eq!(seq.get(), 10);
    }

    #[test]
    fn add_and_get_returns_new_value() {
        let seq = Sequence::default();
        assert_eq!(seq.add_and_get(1), 0);
        assert_eq!(seq.add_and_get(5), 5);
    }

    #[test]
    fn minimum_is_capped_by_default() {
        let seqs = vec![Arc::new(Sequence::new(9)), Arc::new(Sequence::new(4))];
        assert_eq!(minimum_sequence(&seqs, 12), 4);
        assert_eq!(minimum_sequence(&seqs, 2), 2);
        assert_eq!(minimum_sequence(&[], 12), 12);
    }

    #[test]
    fn is_padded_to_a_cache_line() {
        assert!(std::mem::size_of::<Sequence>() >= 64);
    }
}
