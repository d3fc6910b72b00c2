// src/Transport/channel.rs

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::error::ChannelError;
use crate::frame::{FrameHeader, FramedBuffer, HEADER_SIZE};

/// Which end of the connection this channel is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connects out to a remote receiver.
    Sender,
    /// Listens and accepts one peer.
    Receiver,
}

/// One TCP connection carrying length-prefixed event frames.
///
/// `send`/`recv` move exactly one [`FramedBuffer`] per call. `raw_send`/`raw_recv`
/// bypass framing for callers that already hold encoded records.
pub struct EventSocketChannel {
    role: Role,
    stream: Option<TcpStream>,
    listener: Option<TcpListener>,
    peer: Option<SocketAddr>,
    max_event_size: usize,
    nodelay: bool,
    terminated: bool,
}

impl EventSocketChannel {
    /// Connect to a receiver at `host:port` with default settings.
    pub fn connect_sender(host: &str, port: u16) -> Result<Self, ChannelError> {
        Self::connect_sender_with(host, port, &StreamConfig::default())
    }

    /// Connect once. Retrying is left to the caller.
    pub fn connect_sender_with(
        host: &str,
        port: u16,
        config: &StreamConfig,
    ) -> Result<Self, ChannelError> {
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&addr).map_err(|source| ChannelError::Connect {
            addr: addr.clone(),
            source,
        })?;
        stream.set_nodelay(config.nodelay)?;
        let peer = stream.peer_addr().ok();
        info!(peer = %addr, "connected event channel");

        Ok(Self {
            role: Role::Sender,
            stream: Some(stream),
            listener: None,
            peer,
            max_event_size: config.max_event_size,
            nodelay: config.nodelay,
            terminated: false,
        })
    }

    /// Listen on `port` on all interfaces; with `auto_accept`, block until one peer connects.
    pub fn listen_receiver(port: u16, auto_accept: bool) -> Result<Self, ChannelError> {
        Self::listen_receiver_with(("0.0.0.0", port), auto_accept, &StreamConfig::default())
    }

    pub fn listen_receiver_with(
        addr: impl ToSocketAddrs,
        auto_accept: bool,
        config: &StreamConfig,
    ) -> Result<Self, ChannelError> {
        let listener = bind_listener(addr)?;
        let mut channel = Self {
            role: Role::Receiver,
            stream: None,
            listener: Some(listener),
            peer: None,
            max_event_size: config.max_event_size,
            nodelay: config.nodelay,
            terminated: false,
        };
        if auto_accept {
            channel.accept()?;
        }
        Ok(channel)
    }

    /// Block until a peer connects. Replaces any previously accepted peer.
    pub fn accept(&mut self) -> Result<SocketAddr, ChannelError> {
        let listener = self.listener.as_ref().ok_or(ChannelError::NotConnected)?;
        let (stream, peer) = loop {
            match listener.accept() {
                Ok(pair) => break pair,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        stream.set_nodelay(self.nodelay)?;
        info!(peer = %peer, "accepted event channel");
        self.stream = Some(stream);
        self.peer = Some(peer);
        Ok(peer)
    }

    fn stream(&mut self) -> Result<&mut TcpStream, ChannelError> {
        self.stream.as_mut().ok_or(ChannelError::NotConnected)
    }

    /// Write one frame in full. Returns the number of bytes put on the wire.
    pub fn send(&mut self, frame: &FramedBuffer) -> Result<usize, ChannelError> {
        if self.terminated {
            return Err(ChannelError::AlreadyTerminated);
        }
        frame.check_size(self.max_event_size)?;
        let bytes = frame.to_bytes();
        self.stream()?.write_all(&bytes)?;
        if frame.is_terminate() {
            self.terminated = true;
            info!(peer = ?self.peer, "sent terminate frame");
        }
        Ok(bytes.len())
    }

    /// Read one frame.
    ///
    /// # Returns
    /// * `Ok(Some(frame))` for a data frame or the terminate sentinel
    /// * `Ok(None)` if the peer closed cleanly between frames
    /// * `Err(..)` on I/O failure, a close in the middle of a frame, or an oversized header
    pub fn recv(&mut self) -> Result<Option<FramedBuffer>, ChannelError> {
        let max = self.max_event_size;
        let stream = self.stream()?;

        let word = match read_header(stream)? {
            Some(word) => word,
            None => {
                debug!("peer closed event channel");
                return Ok(None);
            }
        };

        let total_len = match FrameHeader::parse(word, max) {
            Ok(FrameHeader::Terminate) => return Ok(Some(FramedBuffer::terminate())),
            Ok(FrameHeader::Data { total_len }) => total_len,
            Err(e) => {
                // Never buffer an over-limit record; drop the connection instead.
                warn!(error = %e, "rejecting frame, closing event channel");
                let _ = stream.shutdown(Shutdown::Both);
                return Err(e.into());
            }
        };

        let mut payload = vec![0u8; total_len - HEADER_SIZE];
        stream.read_exact(&mut payload)?;
        Ok(Some(FramedBuffer::new(payload)))
    }

    /// Write bytes that are already framed. Loops until all of `buf` is written.
    pub fn raw_send(&mut self, buf: &[u8]) -> Result<usize, ChannelError> {
        if self.terminated {
            return Err(ChannelError::AlreadyTerminated);
        }
        self.stream()?.write_all(buf)?;
        Ok(buf.len())
    }

    /// One read() into `buf`; 0 means the peer closed.
    pub fn raw_recv(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        let stream = self.stream()?;
        loop {
            match stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Address the receiver is listening on (useful after binding port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match (&self.listener, &self.stream) {
            (Some(l), _) => l.local_addr().ok(),
            (None, Some(s)) => s.local_addr().ok(),
            (None, None) => None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn max_event_size(&self) -> usize {
        self.max_event_size
    }

    /// Second handle on the connected socket, for shutting it down from another thread.
    pub fn try_clone_stream(&self) -> Result<TcpStream, ChannelError> {
        let stream = self.stream.as_ref().ok_or(ChannelError::NotConnected)?;
        Ok(stream.try_clone()?)
    }

    /// Close the connection; the listener, if any, stays open.
    pub fn shutdown(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for EventSocketChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bind a listener. std sets SO_REUSEADDR on Unix.
pub(crate) fn bind_listener(addr: impl ToSocketAddrs) -> Result<TcpListener, ChannelError> {
    let addrs: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
    let port = addrs.first().map(|a| a.port()).unwrap_or(0);
    let listener =
        TcpListener::bind(&addrs[..]).map_err(|source| ChannelError::Bind { port, source })?;
    if let Ok(local) = listener.local_addr() {
        info!(addr = %local, "listening for event streams");
    }
    Ok(listener)
}

/// Read the 4-byte header. `None` if the stream ended before its first byte.
fn read_header(stream: &mut TcpStream) -> io::Result<Option<[u8; HEADER_SIZE]>> {
    let mut word = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        match stream.read(&mut word[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed inside a frame header",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Some(word))
}
