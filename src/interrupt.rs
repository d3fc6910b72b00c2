//! Ctrl+C handling for the forwarder binaries.
//!
//! The first interrupt exits at once while no queue operation can be in
//! flight. After [`Interrupt::defer`] it only raises a flag and shuts down the
//! watched sockets, so blocked reads return and loops stop between records. A
//! second interrupt always exits.

use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

/// Process exit status after an interrupt.
pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Default)]
struct Watched {
    deferred: bool,
    streams: Vec<TcpStream>,
}

#[derive(Default)]
pub struct Interrupt {
    requested: AtomicBool,
    presses: AtomicU32,
    watched: Mutex<Watched>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process-wide Ctrl+C handler bound to a new `Interrupt`.
    pub fn install() -> Result<Arc<Self>, ctrlc::Error> {
        let interrupt = Arc::new(Self::new());
        let handler = Arc::clone(&interrupt);
        ctrlc::set_handler(move || handler.trigger())?;
        Ok(interrupt)
    }

    /// Stop flag for `run_until` loops.
    pub fn flag(&self) -> &AtomicBool {
        &self.requested
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// From now on the first interrupt only raises the flag.
    pub fn defer(&self) {
        self.watched.lock().deferred = true;
    }

    /// Defer, and shut `stream` down when interrupted.
    pub fn watch(&self, stream: TcpStream) {
        let mut watched = self.watched.lock();
        watched.deferred = true;
        if self.is_requested() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        watched.streams.push(stream);
    }

    /// Handle one interrupt. Exits the process unless the stop can be deferred.
    pub fn trigger(&self) {
        let first = self.presses.fetch_add(1, Ordering::AcqRel) == 0;
        let watched = self.watched.lock();
        if !first || !watched.deferred {
            warn!("interrupted, exiting");
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }

        warn!("interrupted, stopping after the current record (interrupt again to exit now)");
        self.requested.store(true, Ordering::Release);
        for stream in &watched.streams {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}
