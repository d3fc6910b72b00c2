// Byte ring holding variable-length records inside one shared memory band

use super::layout::QueueHeader;

/// Bytes of the per-record length prefix stored in the band.
pub const RECORD_HEADER: usize = 4;

/// A view over one queue's control block and data band.
///
/// This struct is NOT stored in shared memory. It is a transient view that holds
/// pointers into the mapped region and is only valid while the mapping lives.
///
/// ### Concurrency Design:
/// - Every cursor update and every band copy happens under the header's futex
///   lock word, so a record becomes visible to consumers only once it is
///   completely written and `tail` has moved past it.
/// - After releasing the lock, producers bump `data_signal` and consumers bump
///   `space_signal`; the opposite side waits on those words with a bounded
///   timeout instead of sleeping blindly.
pub struct RingBuffer {
    /// Pointer to the control block at the start of the region.
    pub(crate) header: *const QueueHeader,

    /// Pointer to the start of the data band.
    pub(crate) band: *mut u8,

    /// Size of the data band in bytes.
    pub(crate) capacity: usize,
}

/// Outcome of a single admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Pushed,
    /// Not enough free bytes right now; nothing was written.
    Full,
}

unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}
