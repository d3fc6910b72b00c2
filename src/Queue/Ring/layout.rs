use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// Identifies a region as an initialised event queue ("DAQ_RING").
pub const MAGIC_NUMBER: u64 = 0x4441_515F_5249_4E47;

/// Version of the memory layout below, including how the lock word is encoded.
pub const LAYOUT_VERSION: u32 = 2;

/// Alignment of the header and of the data band that follows it.
pub const BAND_ALIGN: usize = 128;

/// Control block at the very beginning of a queue's shared memory region.
///
/// The data band of `capacity` bytes starts at [`band_offset`]. Cursors are
/// monotonic byte counts; `tail - head` is the number of bytes in use and a
/// cursor maps into the band modulo `capacity`.
#[repr(C, align(128))]
pub struct QueueHeader {
    /// Written last by the creator with Release; attachers wait for it.
    pub magic: AtomicU64,

    pub version: u32,

    /// Reserved for per-queue options.
    pub flags: u32,

    /// Size of the data band in bytes.
    pub capacity: u64,

    /// Futex lock word guarding cursors and band contents: holder pid, top bit for waiters.
    pub lock: AtomicU32,

    /// Bumped after every successful enqueue; consumers wait on it.
    pub data_signal: AtomicU32,

    /// Bumped after every successful dequeue; producers wait on it.
    pub space_signal: AtomicU32,

    /// Number of threads currently parked on either signal.
    pub waiters: AtomicU32,

    /// Producer cursor: total bytes ever written.
    /// Padded to prevent false sharing with the consumer cursor.
    pub tail: CachePadded<AtomicU64>,

    /// Consumer cursor: total bytes ever released.
    pub head: CachePadded<AtomicU64>,

    /// Records currently held.
    pub records: AtomicU64,

    /// Lifetime totals, for statistics only.
    pub enqueued: AtomicU64,
    pub dequeued: AtomicU64,
}

/// Byte offset of the data band from the start of the region.
pub const fn band_offset() -> usize {
    (std::mem::size_of::<QueueHeader>() + BAND_ALIGN - 1) & !(BAND_ALIGN - 1)
}

/// Total region size for a band of `capacity` bytes.
pub const fn region_size(capacity: usize) -> usize {
    band_offset() + capacity
}
