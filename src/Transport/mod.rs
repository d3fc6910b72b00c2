mod channel;
mod rb2sock;
mod sock2rb;

pub use channel::{EventSocketChannel, Role};
pub(crate) use channel::bind_listener;
pub use rb2sock::QueueToSocketForwarder;
pub use sock2rb::SocketToQueueForwarder;

/// Result of one forwarding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpResult {
    /// A data record of this many bytes went through.
    Forwarded(usize),
    /// The terminate sentinel was observed; the pump loop must stop.
    Terminated,
    /// The peer closed without sending a terminate sentinel.
    Disconnected,
}

/// How a forwarder loop ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwarderExit {
    Terminated,
    Disconnected,
    /// The caller's stop flag was raised.
    Interrupted,
}

/// Forwarder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwarderState {
    Running,
    Stopped,
}
