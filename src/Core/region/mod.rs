use crate::error::QueueError;
use crate::Core::SharedMemory::{
    attach_shared_memory, create_shared_memory, valid_name, SharedMemoryBackend,
};
use crate::Queue::Ring::layout::{
    band_offset, region_size, QueueHeader, LAYOUT_VERSION, MAGIC_NUMBER,
};
use crate::Queue::Ring::RingBuffer;
use std::io;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, info};
mod debug;
mod getters;

/// Smallest data band worth creating.
pub const MIN_CAPACITY: usize = 64;

/// How long an attacher waits for a concurrent creator to finish initialising.
const ATTACH_WAIT: Duration = Duration::from_secs(2);

/// Create/attach races resolved before giving up.
const OPEN_ATTEMPTS: usize = 8;

/// One named queue region: control block plus data band, mapped into this process.
pub struct QueueRegion {
    shm: Box<dyn SharedMemoryBackend>,
    header: *mut QueueHeader,
    ring: RingBuffer,
    name: String,
    created: bool,
}

impl QueueRegion {
    /// Attach to the named region, creating it with a `capacity` byte band if absent.
    pub fn open(name: &str, capacity: usize) -> Result<Self, QueueError> {
        check_name(name)?;
        if capacity < MIN_CAPACITY {
            return Err(QueueError::InvalidSize {
                requested: capacity,
                minimum: MIN_CAPACITY,
            });
        }

        let mut last_err = io::Error::new(io::ErrorKind::Other, "create/attach race not settled");
        for _ in 0..OPEN_ATTEMPTS {
            match Self::create(name, capacity) {
                Ok(region) => return Ok(region),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(attach_error(name, e)),
            }

            match Self::attach_existing(name) {
                Ok(region) => {
                    if region.capacity() != capacity {
                        return Err(QueueError::Incompatible {
                            name: name.to_string(),
                            existing: region.capacity(),
                            requested: capacity,
                        });
                    }
                    return Ok(region);
                }
                // Unlinked between our create and attach; try creating again.
                Err(e) if e.kind() == io::ErrorKind::NotFound => last_err = e,
                Err(e) => return Err(attach_error(name, e)),
            }
        }
        Err(attach_error(name, last_err))
    }

    /// Attach to an existing region whatever its capacity.
    pub fn attach(name: &str) -> Result<Self, QueueError> {
        check_name(name)?;
        Self::attach_existing(name).map_err(|e| attach_error(name, e))
    }

    fn create(name: &str, capacity: usize) -> io::Result<Self> {
        let shm = create_shared_memory(name, region_size(capacity))?;

        let header = shm.as_ptr() as *mut QueueHeader;
        // mmap hands back page-aligned memory, zero filled
        debug_assert_eq!(header as usize % std::mem::align_of::<QueueHeader>(), 0);
        unsafe { RingBuffer::publish(header, capacity) };

        let ring = unsafe { RingBuffer::new(header, shm.as_ptr().add(band_offset())) };
        info!(queue = %name, capacity, "created event queue");
        Ok(Self {
            shm,
            header,
            ring,
            name: name.to_string(),
            created: true,
        })
    }

    fn attach_existing(name: &str) -> io::Result<Self> {
        let deadline = Instant::now() + ATTACH_WAIT;

        let shm = loop {
            match attach_shared_memory(name) {
                Ok(shm) if shm.size() >= band_offset() => break shm,
                // Creator has not sized the file yet
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "shared memory never reached its final size",
                ));
            }
            std::thread::sleep(Duration::from_micros(100));
        };

        let header = shm.as_ptr() as *mut QueueHeader;
        unsafe {
            while (*header).magic.load(Ordering::Acquire) != MAGIC_NUMBER {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "Invalid magic number - shared memory not properly initialized",
                    ));
                }
                std::thread::sleep(Duration::from_micros(100));
            }

            if (*header).version != LAYOUT_VERSION {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "queue layout version {} does not match {}",
                        (*header).version,
                        LAYOUT_VERSION
                    ),
                ));
            }

            let capacity = (*header).capacity as usize;
            if shm.size() < region_size(capacity) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Shared memory size too small: expected at least {} bytes, got {}",
                        region_size(capacity),
                        shm.size()
                    ),
                ));
            }
        }

        let ring = unsafe { RingBuffer::new(header, shm.as_ptr().add(band_offset())) };
        debug!(queue = %name, capacity = ring.capacity(), "attached to event queue");
        Ok(Self {
            shm,
            header,
            ring,
            name: name.to_string(),
            created: false,
        })
    }

    /// Get a reference to the ring view over this region
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }
}

fn check_name(name: &str) -> Result<(), QueueError> {
    if valid_name(name) {
        Ok(())
    } else {
        Err(QueueError::NameInvalid(name.to_string()))
    }
}

fn attach_error(name: &str, source: io::Error) -> QueueError {
    QueueError::Attach {
        name: name.to_string(),
        source,
    }
}

// Implement Send + Sync since we manage synchronization internally
unsafe impl Send for QueueRegion {}
unsafe impl Sync for QueueRegion {}
