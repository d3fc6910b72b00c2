use super::*;

/// Getter methods for QueueRegion
///
/// These methods provide access to the private fields of QueueRegion
/// for debugging and monitoring purposes.
impl QueueRegion {
    /// Get a reference to the underlying shared memory backend
    pub fn shm(&self) -> &dyn SharedMemoryBackend {
        &*self.shm
    }

    /// Get the raw pointer to the QueueHeader
    pub fn header_ptr(&self) -> *const QueueHeader {
        self.header
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the data band in bytes.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// True if this process created the region rather than attaching.
    pub fn is_creator(&self) -> bool {
        self.created
    }

    /// Check if the region carries an initialised queue header
    ///
    /// Returns true if the magic number in the header matches the expected value.
    pub fn is_initialized(&self) -> bool {
        // Safety: the header pointer is valid while the mapping exists
        unsafe {
            !self.header.is_null()
                && (*self.header).magic.load(Ordering::Acquire) == MAGIC_NUMBER
        }
    }
}
