use std::fmt;

use crate::Proxy::{ArgumentHolder, RingBufferInvoker};
use crate::MPMC::Buffer::RingBuffer;
use crate::MPMC::Disruptor;

/// Debug function for RingBuffer
///
/// Shows the sequencing state only; slot contents are never read, since
/// producers may be writing them.
pub fn debug_ring_buffer<E>(buffer: &RingBuffer<E>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingBuffer")
        .field("capacity", &buffer.capacity())
        .field("cursor", &buffer.cursor())
        .field("minimum_gating_sequence", &buffer.minimum_gating_sequence())
        .field("remaining_capacity", &buffer.remaining_capacity())
        .finish_non_exhaustive()
}

/// Debug function for Disruptor
///
/// Shows:
/// - The ring buffer
/// - Every registered stage, in order
/// - Whether an exception handler was set and the disruptor started
pub fn debug_disruptor<E>(disruptor: &Disruptor<E>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (ring_buffer, stages, has_exception_handler, started) = disruptor.debug_parts();
    f.debug_struct("Disruptor")
        .field("ring_buffer", ring_buffer)
        .field("stages", &stages)
        .field("exception_handler", &has_exception_handler)
        .field("started", &started)
        .finish()
}

/// Debug function for RingBufferInvoker
pub fn debug_invoker(invoker: &RingBufferInvoker, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingBufferInvoker")
        .field("contract", &invoker.layout().contract())
        .field("overflow", &invoker.overflow_strategy())
        .field("capacity", &invoker.ring_buffer().capacity())
        .finish_non_exhaustive()
}

/// Debug function for ArgumentHolder
///
/// Argument values are type-erased, so only the cell layout and how many
/// cells are occupied are shown.
pub fn debug_argument_holder(holder: &ArgumentHolder, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match holder.layout() {
        Some(layout) => f
            .debug_struct("ArgumentHolder")
            .field("contract", &layout.contract())
            .field("cells", &layout.cell_count())
            .field("occupied", &holder.occupied())
            .finish(),
        None => f.write_str("ArgumentHolder(<unprepared>)"),
    }
}
