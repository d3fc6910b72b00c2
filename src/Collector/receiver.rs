// Multi-source EOS-tagged collector ("hltreceiver")

use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::reassembly::{Progress, ReassemblyState};
use crate::config::{StreamConfig, TerminatePolicy};
use crate::error::ForwardError;
use crate::frame::{encode_payload, FramedBuffer};
use crate::Queue::EventQueue;
use crate::Transport::{bind_listener, ForwarderExit};

/// Poll interval of the accept loop while it waits for more sources.
const ACCEPT_POLL: Duration = Duration::from_millis(5);

/// Collects EOS-delimited messages from one or more TCP sources into a queue.
///
/// Each accepted source gets its own thread and its own [`ReassemblyState`], so
/// fragments from different sources never mix. Every decoded message is
/// enqueued as an encoded frame. When the [`TerminatePolicy`] is satisfied a
/// single terminate record is enqueued after all data, and the session ends.
pub struct StreamReassembler {
    listener: TcpListener,
    queue: EventQueue,
    config: StreamConfig,
}

impl StreamReassembler {
    /// Listen on `port` on all interfaces.
    pub fn bind(port: u16, queue: EventQueue, config: StreamConfig) -> Result<Self, ForwardError> {
        Self::bind_addr(("0.0.0.0", port), queue, config)
    }

    pub fn bind_addr(
        addr: impl ToSocketAddrs,
        queue: EventQueue,
        config: StreamConfig,
    ) -> Result<Self, ForwardError> {
        // Catch an unusable tag before any source connects.
        ReassemblyState::from_config(&config).map_err(ForwardError::Settings)?;
        let listener = bind_listener(addr)?;
        Ok(Self {
            listener,
            queue,
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Accept the configured number of sources and collect until the session ends.
    pub fn run(&self) -> Result<ForwarderExit, ForwardError> {
        self.run_until(&AtomicBool::new(false))
    }

    /// Like [`run`](Self::run), but end the session once `stop` is set.
    ///
    /// Sources are shut down and no terminate is forwarded. A record already
    /// being enqueued is completed first.
    pub fn run_until(&self, stop: &AtomicBool) -> Result<ForwarderExit, ForwardError> {
        self.listener.set_nonblocking(true)?;
        let session = Session::new(&self.queue, &self.config);

        thread::scope(|scope| {
            let mut accepted = 0;
            while !session.is_done() {
                if stop.load(Ordering::Acquire) {
                    session.interrupt();
                    break;
                }
                if accepted == self.config.sources {
                    thread::sleep(ACCEPT_POLL);
                    continue;
                }
                match self.listener.accept() {
                    Ok((stream, peer)) => {
                        if let Err(e) = prepare(&stream, &self.config) {
                            session.fail(e.into());
                            break;
                        }
                        accepted += 1;
                        info!(peer = %peer, source = accepted, of = self.config.sources, "source connected");
                        match stream.try_clone() {
                            Ok(handle) => session.register(handle),
                            Err(e) => {
                                session.fail(e.into());
                                break;
                            }
                        }
                        let session = &session;
                        scope.spawn(move || session.serve(stream, peer));
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        session.fail(e.into());
                        break;
                    }
                }
            }
        });

        session.outcome()
    }
}

fn prepare(stream: &TcpStream, config: &StreamConfig) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(config.nodelay)
}

/// How one source stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceEnd {
    Terminated,
    Disconnected,
    /// The session ended first; remaining input was ignored.
    Stopped,
}

#[derive(Default)]
struct SessionInner {
    streams: Vec<TcpStream>,
    ended: usize,
    terminated: usize,
    terminate_forwarded: bool,
    interrupted: bool,
    error: Option<ForwardError>,
}

/// State shared by the source threads of one run.
struct Session<'a> {
    queue: &'a EventQueue,
    config: &'a StreamConfig,
    /// Set once a terminate record is queued; no data may follow it.
    closed: RwLock<bool>,
    inner: Mutex<SessionInner>,
    done: AtomicBool,
}

impl<'a> Session<'a> {
    fn new(queue: &'a EventQueue, config: &'a StreamConfig) -> Self {
        Self {
            queue,
            config,
            closed: RwLock::new(false),
            inner: Mutex::new(SessionInner::default()),
            done: AtomicBool::new(false),
        }
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn register(&self, stream: TcpStream) {
        let mut inner = self.inner.lock();
        if self.is_done() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        inner.streams.push(stream);
    }

    /// Read, decode and enqueue one source until it ends.
    fn serve(&self, mut stream: TcpStream, peer: SocketAddr) {
        let mut state = match ReassemblyState::from_config(self.config) {
            Ok(state) => state,
            Err(error) => return self.fail(ForwardError::Decode { peer, error }),
        };
        let mut buf = vec![0u8; self.config.read_chunk];
        let mut out = Vec::new();
        let mut messages = 0u64;

        let end = loop {
            let n = match stream.read(&mut buf) {
                Ok(0) if self.is_done() => break SourceEnd::Stopped,
                Ok(0) => break SourceEnd::Disconnected,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) if self.is_done() => break SourceEnd::Stopped,
                Err(e) => return self.fail(e.into()),
            };
            if self.is_done() {
                break SourceEnd::Stopped;
            }

            let progress = state.decode_chunk(&buf[..n], &mut out);
            for message in out.drain(..) {
                match self.push(&message) {
                    Ok(true) => messages += 1,
                    Ok(false) => {}
                    Err(e) => return self.fail(e),
                }
            }
            match progress {
                Ok(Progress::Continue) => {}
                Ok(Progress::Terminated) => break SourceEnd::Terminated,
                Err(error) => {
                    error!(peer = %peer, %error, "dropping source");
                    return self.fail(ForwardError::Decode { peer, error });
                }
            }
        };

        if end == SourceEnd::Disconnected && state.carry_over_len() > 0 {
            warn!(
                peer = %peer,
                discarded = state.carry_over_len(),
                "source closed inside a message"
            );
        }
        debug!(peer = %peer, messages, end = ?end, "source finished");
        self.source_ended(end, peer);
    }

    /// Enqueue one message. `Ok(false)` if the session is already closed.
    fn push(&self, message: &[u8]) -> Result<bool, ForwardError> {
        let closed = self.closed.read();
        if *closed {
            return Ok(false);
        }
        self.queue
            .enqueue_blocking(&encode_payload(message), self.config.reassembler_retry)?;
        Ok(true)
    }

    fn source_ended(&self, end: SourceEnd, peer: SocketAddr) {
        let mut inner = self.inner.lock();
        inner.ended += 1;

        match end {
            SourceEnd::Terminated => {
                inner.terminated += 1;
                info!(peer = %peer, "terminate received from source");
                let satisfied = match self.config.terminate_policy {
                    TerminatePolicy::FirstSource => true,
                    TerminatePolicy::AllSources => inner.terminated >= self.config.sources,
                };
                if satisfied {
                    if let Err(e) = self.forward_terminate(&mut inner) {
                        inner.error.get_or_insert(e);
                    }
                    self.stop(&mut inner);
                }
            }
            SourceEnd::Disconnected => info!(peer = %peer, "source disconnected"),
            SourceEnd::Stopped => {}
        }

        if inner.ended >= self.config.sources {
            self.stop(&mut inner);
        }
    }

    fn forward_terminate(&self, inner: &mut SessionInner) -> Result<(), ForwardError> {
        let mut closed = self.closed.write();
        if *closed {
            return Ok(());
        }
        *closed = true;
        self.queue.enqueue_blocking(
            &FramedBuffer::terminate().to_bytes(),
            self.config.reassembler_retry,
        )?;
        inner.terminate_forwarded = true;
        info!(queue = %self.queue.name(), "terminate forwarded downstream");
        Ok(())
    }

    fn fail(&self, error: ForwardError) {
        let mut inner = self.inner.lock();
        error!(%error, "collector session failed");
        inner.error.get_or_insert(error);
        self.stop(&mut inner);
    }

    fn interrupt(&self) {
        let mut inner = self.inner.lock();
        if self.is_done() {
            return;
        }
        inner.interrupted = true;
        info!(sources = inner.streams.len(), "collector interrupted");
        self.stop(&mut inner);
    }

    /// End the session and unblock every source thread still reading.
    fn stop(&self, inner: &mut SessionInner) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        for stream in &inner.streams {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn outcome(self) -> Result<ForwarderExit, ForwardError> {
        let inner = self.inner.into_inner();
        match inner.error {
            Some(e) => Err(e),
            None if inner.terminate_forwarded => Ok(ForwarderExit::Terminated),
            None if inner.interrupted => Ok(ForwarderExit::Interrupted),
            None => Ok(ForwarderExit::Disconnected),
        }
    }
}
