// Result and statistics types handed out by EventQueue

/// Outcome of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// The whole record is now visible to consumers.
    Enqueued,
    /// Free space is insufficient right now; the queue is unchanged.
    WouldBlock,
}

/// Outcome of a non-blocking dequeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DequeueResult {
    Record(Vec<u8>),
    Empty,
}

impl DequeueResult {
    pub fn into_record(self) -> Option<Vec<u8>> {
        match self {
            DequeueResult::Record(bytes) => Some(bytes),
            DequeueResult::Empty => None,
        }
    }
}

/// Point-in-time view of a queue's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub capacity: usize,
    pub used_bytes: usize,
    pub records: u64,
    pub total_enqueued: u64,
    pub total_dequeued: u64,
}

impl QueueStats {
    pub fn free_bytes(&self) -> usize {
        self.capacity.saturating_sub(self.used_bytes)
    }
}
