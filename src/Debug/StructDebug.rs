use std::fmt;
use std::sync::atomic::Ordering;

use crate::frame::FramedBuffer;
use crate::Core::region::QueueRegion;
use crate::Core::SharedMemoryBackend;
use crate::Queue::EventQueue;
use crate::Queue::Ring::RingBuffer;

/// Debug function for QueueRegion
///
/// Shows the header location and the sizing read from it, never the band.
pub fn debug_queue_region(region: &QueueRegion, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueRegion")
        .field("name", &region.name())
        .field("mapped_bytes", &region.shm().size())
        .field("header", &format_args!("{:p}", region.header_ptr()))
        .field("capacity", &region.capacity())
        .field("creator", &region.is_creator())
        .field("initialized", &region.is_initialized())
        .finish()
}

/// Debug function for RingBuffer
///
/// Cursor values are a relaxed snapshot; they may be stale by the time they print.
pub fn debug_ring_buffer(ring: &RingBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let header = ring.header();
    f.debug_struct("RingBuffer")
        .field("band", &format_args!("0x{:x}", ring.band as usize))
        .field("capacity", &ring.capacity())
        .field("head", &header.head.load(Ordering::Relaxed))
        .field("tail", &header.tail.load(Ordering::Relaxed))
        .field("records", &header.records.load(Ordering::Relaxed))
        .finish_non_exhaustive()
}

pub fn debug_event_queue(queue: &EventQueue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventQueue")
        .field("region", queue.region())
        .field("stats", &queue.stats())
        .finish()
}

/// Debug function for FramedBuffer
///
/// Prints the length and at most the first 16 payload bytes.
pub fn debug_framed_buffer(frame: &FramedBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if frame.is_terminate() {
        return f.write_str("FramedBuffer(TERMINATE)");
    }
    let payload = frame.payload();
    let shown = &payload[..payload.len().min(16)];
    f.debug_struct("FramedBuffer")
        .field("total_len", &frame.encoded_len())
        .field("head", &format_args!("{:02x?}", shown))
        .finish_non_exhaustive()
}
