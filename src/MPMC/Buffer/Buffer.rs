// The pre-allocated event store shared by producers and consumers

use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::MPMC::sequencer::Sequencer;

/// A fixed-capacity circular array of reusable events.
///
/// Every slot is created once by the event factory and then overwritten in
/// place for the life of the buffer; nothing is allocated per publish.
///
/// ### Concurrency Design:
/// - **Producers** claim a sequence from the sequencer, write the slot at
///   `sequence & mask`, then publish. Until publish, the claiming producer is
///   the only thread touching that slot.
/// - **Consumers** only read slots up to what their barrier reports as
///   available, and only release a slot back to producers by advancing their
///   gating sequence past it.
/// - Consumer stages form a chain, so at any instant a slot belongs to at
///   most one stage.
pub struct RingBuffer<E> {
    /// Events, indexed by `sequence & mask`.
    pub(crate) slots: Box<[UnsafeCell<E>]>,

    /// `capacity - 1`; capacity is a power of two.
    pub(crate) mask: i64,

    /// Claims, publication and gating for this buffer.
    pub(crate) sequencer: Arc<dyn Sequencer>,
}

// SAFETY: slots are only reached through sequences handed out by the
// sequencer, which guarantees one writer or one consuming stage per slot at a
// time. Events move between threads, hence `E: Send`.
unsafe impl<E: Send> Send for RingBuffer<E> {}
unsafe impl<E: Send> Sync for RingBuffer<E> {}
