use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Failures while parsing a length-prefixed event record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes are present than the header declares.
    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("frame of {declared} bytes exceeds the {max} byte event limit")]
    TooLarge { declared: usize, max: usize },

    /// Declared length is smaller than the header itself.
    #[error("declared frame length {declared} is smaller than the header")]
    Undersized { declared: usize },

    /// A queue record carries bytes past the frame its header declares.
    #[error("record of {actual} bytes holds a {declared} byte frame plus trailing bytes")]
    TrailingBytes { declared: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("failed to attach queue '{name}': {source}")]
    Attach {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid queue name '{0}'")]
    NameInvalid(String),

    #[error("queue size {requested} is invalid (minimum {minimum} bytes)")]
    InvalidSize { requested: usize, minimum: usize },

    #[error("queue '{name}' exists with capacity {existing}, requested {requested}")]
    Incompatible {
        name: String,
        existing: usize,
        requested: usize,
    },

    /// The record can never fit, even into an empty queue.
    #[error("record of {len} bytes can never fit a queue of {capacity} bytes")]
    RecordTooLarge { len: usize, capacity: usize },
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to listen on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("no peer accepted on this channel yet")]
    NotConnected,

    #[error("terminate already sent; channel accepts no further frames")]
    AlreadyTerminated,

    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Carry-over would grow past the configured capacity.
    #[error("reassembly buffer full: {pending} bytes pending, capacity {capacity}")]
    BufferFull { pending: usize, capacity: usize },

    #[error("end-of-segment tag must not be empty")]
    EmptyEosTag,
}

/// Anything that stops a forwarder loop.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("source {peer} dropped: {error}")]
    Decode {
        peer: SocketAddr,
        #[source]
        error: DecodeError,
    },

    /// Collector settings that can never decode anything.
    #[error("invalid reassembly settings: {0}")]
    Settings(#[source] DecodeError),

    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),
}
