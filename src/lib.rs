// Module naming follows project convention (Core, Queue, Transport, Collector)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Queue;
#[allow(non_snake_case)]
pub mod Transport;
#[allow(non_snake_case)]
pub mod Collector;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod config;
pub mod error;
pub mod ffi;
pub mod frame;
pub mod interrupt;
pub mod logging;

pub use config::{StreamConfig, TerminatePolicy};
pub use error::{ChannelError, DecodeError, ForwardError, FrameError, QueueError};
pub use frame::{FramedBuffer, HEADER_SIZE, MAXEVTSIZE, MSG_TERMINATE};
pub use interrupt::{Interrupt, EXIT_INTERRUPTED};
pub use Collector::{ReassemblyState, StreamReassembler};
pub use Queue::{EventQueue, QueueBuilder};
pub use Queue::Structs::{DequeueResult, EnqueueResult, QueueStats}; // re-export for stable path
pub use Transport::{
    EventSocketChannel, ForwarderExit, PumpResult, QueueToSocketForwarder, Role,
    SocketToQueueForwarder,
};
