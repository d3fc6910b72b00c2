// src/Queue/queue.rs

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::QueueError;
use crate::Core::region::QueueRegion;
use crate::Core::SharedMemory::unlink_shared_memory;
use crate::Queue::Ring::{Push, RingBuffer};
use crate::Queue::Structs::{DequeueResult, EnqueueResult, QueueStats};

/// A bounded FIFO of variable-length byte records shared by name.
///
/// Any number of producers and consumers, in this process or others, may open
/// the same name. Records are admitted whole or not at all and are handed out
/// in the order they were admitted.
pub struct EventQueue {
    region: QueueRegion,
}

impl EventQueue {
    /// Attach to the queue called `name`, creating it with a band of
    /// `size_bytes` if it does not exist yet.
    pub fn open(name: &str, size_bytes: usize) -> Result<Self, QueueError> {
        Ok(Self {
            region: QueueRegion::open(name, size_bytes)?,
        })
    }

    /// Attach to an existing queue, accepting whatever size it was created with.
    pub fn attach(name: &str) -> Result<Self, QueueError> {
        Ok(Self {
            region: QueueRegion::attach(name)?,
        })
    }

    /// Remove the name so no new process can attach. Mappings already open keep working.
    pub fn unlink(name: &str) -> Result<(), QueueError> {
        unlink_shared_memory(name).map_err(|source| QueueError::Attach {
            name: name.to_string(),
            source,
        })?;
        info!(queue = %name, "unlinked event queue");
        Ok(())
    }

    #[inline]
    fn ring(&self) -> &RingBuffer {
        self.region.ring()
    }

    fn check_fits(&self, len: usize) -> Result<(), QueueError> {
        let capacity = self.capacity();
        if len > u32::MAX as usize || RingBuffer::footprint(len) > capacity {
            return Err(QueueError::RecordTooLarge { len, capacity });
        }
        Ok(())
    }

    /// Append `record` if there is room for all of it.
    ///
    /// # Returns
    /// * `Ok(Enqueued)` once the record is visible to consumers
    /// * `Ok(WouldBlock)` if free space is short; nothing was written
    /// * `Err(RecordTooLarge)` if the record could never fit, even into an empty queue
    pub fn try_enqueue(&self, record: &[u8]) -> Result<EnqueueResult, QueueError> {
        self.check_fits(record.len())?;
        Ok(match self.ring().try_push(record) {
            Push::Pushed => EnqueueResult::Enqueued,
            Push::Full => EnqueueResult::WouldBlock,
        })
    }

    /// Remove and return the oldest record, or `Empty`.
    pub fn try_dequeue(&self) -> DequeueResult {
        match self.ring().try_pop() {
            Some(bytes) => DequeueResult::Record(bytes),
            None => DequeueResult::Empty,
        }
    }

    /// Enqueue, waiting in slices of at most `retry` until space is freed.
    ///
    /// Never drops the record; only a record that can never fit is an error.
    pub fn enqueue_blocking(&self, record: &[u8], retry: Duration) -> Result<(), QueueError> {
        self.check_fits(record.len())?;
        let ring = self.ring();
        loop {
            let epoch = ring.space_epoch();
            if ring.try_push(record) == Push::Pushed {
                return Ok(());
            }
            ring.wait_for_space(epoch, retry);
        }
    }

    /// Enqueue, giving up after `timeout` with `WouldBlock` and nothing written.
    pub fn enqueue_timeout(
        &self,
        record: &[u8],
        timeout: Duration,
        retry: Duration,
    ) -> Result<EnqueueResult, QueueError> {
        self.check_fits(record.len())?;
        let ring = self.ring();
        let deadline = Instant::now() + timeout;
        loop {
            let epoch = ring.space_epoch();
            if ring.try_push(record) == Push::Pushed {
                return Ok(EnqueueResult::Enqueued);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(EnqueueResult::WouldBlock);
            }
            ring.wait_for_space(epoch, retry.min(deadline - now));
        }
    }

    /// Dequeue, waiting in slices of at most `retry` until a record arrives.
    pub fn dequeue_blocking(&self, retry: Duration) -> Vec<u8> {
        let ring = self.ring();
        loop {
            let epoch = ring.data_epoch();
            if let Some(bytes) = ring.try_pop() {
                return bytes;
            }
            ring.wait_for_data(epoch, retry);
        }
    }

    /// Dequeue, giving up after `timeout`.
    pub fn dequeue_timeout(&self, timeout: Duration, retry: Duration) -> Option<Vec<u8>> {
        let ring = self.ring();
        let deadline = Instant::now() + timeout;
        loop {
            let epoch = ring.data_epoch();
            if let Some(bytes) = ring.try_pop() {
                return Some(bytes);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            ring.wait_for_data(epoch, retry.min(deadline - now));
        }
    }

    pub fn name(&self) -> &str {
        self.region.name()
    }

    /// Size of the data band in bytes.
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Largest record payload that fits an empty queue.
    pub fn max_record_len(&self) -> usize {
        self.capacity().saturating_sub(RingBuffer::footprint(0))
    }

    pub fn len(&self) -> usize {
        self.ring().record_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if this handle created the underlying region.
    pub fn is_creator(&self) -> bool {
        self.region.is_creator()
    }

    pub fn stats(&self) -> QueueStats {
        let ring = self.ring();
        let header = ring.header();
        QueueStats {
            capacity: ring.capacity(),
            used_bytes: ring.used_bytes(),
            records: ring.record_count(),
            total_enqueued: header.enqueued.load(Ordering::Relaxed),
            total_dequeued: header.dequeued.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn region(&self) -> &QueueRegion {
        &self.region
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_event_queue(self, f)
    }
}
