use std::sync::atomic::Ordering::{Acquire, Relaxed, Release, SeqCst};
use std::sync::atomic::AtomicU32;
use std::time::Duration;

use super::layout::QueueHeader;
use super::Ring::{Push, RingBuffer, RECORD_HEADER};
use crate::Core::futex::{futex_wait_timeout, futex_wake_all, WordGuard};

impl RingBuffer {
    /// Create a ring view over an existing, initialised region.
    ///
    /// # Safety
    /// `header` must point to an initialised [`QueueHeader`] and `band` to at
    /// least `header.capacity` writable bytes, both valid for the view's lifetime.
    pub unsafe fn new(header: *const QueueHeader, band: *mut u8) -> Self {
        let capacity = (*header).capacity as usize;
        Self {
            header,
            band,
            capacity,
        }
    }

    #[inline]
    pub(crate) fn header(&self) -> &QueueHeader {
        unsafe { &*self.header }
    }

    /// Band bytes as a slice. Only touched while the lock word is held.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    unsafe fn band_mut(&self) -> &mut [u8] {
        std::slice::from_raw_parts_mut(self.band, self.capacity)
    }

    /// Bytes a record of `len` payload bytes occupies in the band.
    #[inline]
    pub fn footprint(len: usize) -> usize {
        RECORD_HEADER + len
    }

    /// Size of the data band in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `record` as a whole, or not at all.
    ///
    /// The caller guarantees `footprint(record.len()) <= capacity`.
    pub fn try_push(&self, record: &[u8]) -> Push {
        let need = Self::footprint(record.len()) as u64;
        let header = self.header();
        {
            let _guard = WordGuard::lock(&header.lock);
            let head = header.head.load(Relaxed);
            let tail = header.tail.load(Relaxed);
            let free = self.capacity as u64 - (tail - head);
            if need > free {
                return Push::Full;
            }

            let band = unsafe { self.band_mut() };
            write_wrapped(band, tail, &(record.len() as u32).to_le_bytes());
            write_wrapped(band, tail + RECORD_HEADER as u64, record);

            // Publish only after the copy; a writer dying mid-copy leaves nothing visible.
            header.tail.store(tail + need, Relaxed);
            header.records.fetch_add(1, Relaxed);
            header.enqueued.fetch_add(1, Relaxed);
        }
        self.signal(&header.data_signal);
        Push::Pushed
    }

    /// Remove the oldest record. Returns None if the ring is empty.
    pub fn try_pop(&self) -> Option<Vec<u8>> {
        let header = self.header();
        let payload = {
            let _guard = WordGuard::lock(&header.lock);
            let head = header.head.load(Relaxed);
            let tail = header.tail.load(Relaxed);
            if head == tail {
                return None;
            }

            let band = unsafe { self.band_mut() };
            let mut len_word = [0u8; RECORD_HEADER];
            read_wrapped(band, head, &mut len_word);
            let len = u32::from_le_bytes(len_word) as usize;
            debug_assert!((Self::footprint(len) as u64) <= tail - head);

            let mut payload = vec![0u8; len];
            read_wrapped(band, head + RECORD_HEADER as u64, &mut payload);

            // Release the slot only after the copy.
            header.head.store(head + Self::footprint(len) as u64, Relaxed);
            header.records.fetch_sub(1, Relaxed);
            header.dequeued.fetch_add(1, Relaxed);
            payload
        };
        self.signal(&header.space_signal);
        Some(payload)
    }

    /// Bytes currently occupied, record headers included.
    pub fn used_bytes(&self) -> usize {
        let header = self.header();
        let _guard = WordGuard::lock(&header.lock);
        (header.tail.load(Relaxed) - header.head.load(Relaxed)) as usize
    }

    pub fn record_count(&self) -> u64 {
        self.header().records.load(Relaxed)
    }

    /// Snapshot of the data signal, taken before an attempt that may fail.
    pub fn data_epoch(&self) -> u32 {
        self.header().data_signal.load(Acquire)
    }

    pub fn space_epoch(&self) -> u32 {
        self.header().space_signal.load(Acquire)
    }

    /// Wait until a producer publishes after `epoch`, or `timeout` passes.
    pub fn wait_for_data(&self, epoch: u32, timeout: Duration) {
        self.park(&self.header().data_signal, epoch, timeout);
    }

    /// Wait until a consumer frees space after `epoch`, or `timeout` passes.
    pub fn wait_for_space(&self, epoch: u32, timeout: Duration) {
        self.park(&self.header().space_signal, epoch, timeout);
    }

    fn park(&self, signal: &AtomicU32, epoch: u32, timeout: Duration) {
        let waiters = &self.header().waiters;
        waiters.fetch_add(1, SeqCst);
        futex_wait_timeout(signal, epoch, Some(timeout));
        waiters.fetch_sub(1, SeqCst);
    }

    fn signal(&self, signal: &AtomicU32) {
        signal.fetch_add(1, SeqCst);
        if self.header().waiters.load(SeqCst) > 0 {
            futex_wake_all(signal);
        }
    }

    /// Mark the region as initialised for attachers.
    ///
    /// # Safety
    /// Only the creating process calls this, once, after zero-filling the header.
    pub(crate) unsafe fn publish(header: *mut QueueHeader, capacity: usize) {
        use super::layout::{LAYOUT_VERSION, MAGIC_NUMBER};
        (*header).version = LAYOUT_VERSION;
        (*header).flags = 0;
        (*header).capacity = capacity as u64;
        (*header).magic.store(MAGIC_NUMBER, Release);
    }
}

/// Copy `data` into the band at logical position `pos`, wrapping at the end.
fn write_wrapped(band: &mut [u8], pos: u64, data: &[u8]) {
    let cap = band.len();
    let start = (pos % cap as u64) as usize;
    let first = data.len().min(cap - start);
    band[start..start + first].copy_from_slice(&data[..first]);
    band[..data.len() - first].copy_from_slice(&data[first..]);
}

/// Fill `out` from the band at logical position `pos`, wrapping at the end.
fn read_wrapped(band: &[u8], pos: u64, out: &mut [u8]) {
    let cap = band.len();
    let start = (pos % cap as u64) as usize;
    let first = out.len().min(cap - start);
    out[..first].copy_from_slice(&band[start..start + first]);
    let rest = out.len() - first;
    out[first..].copy_from_slice(&band[..rest]);
}
