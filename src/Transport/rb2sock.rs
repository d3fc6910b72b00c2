// Queue -> socket egress ("rb2sock")

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{EventSocketChannel, ForwarderExit, ForwarderState, PumpResult};
use crate::config::StreamConfig;
use crate::error::{ForwardError, FrameError};
use crate::frame::{inspect_record, FrameHeader, FramedBuffer};
use crate::Queue::EventQueue;

/// Drains an [`EventQueue`] of encoded frames into an [`EventSocketChannel`].
///
/// Records in the queue are expected to be encoded [`FramedBuffer`]s; they are
/// validated and written out as-is. A terminate record is sent exactly once,
/// after which the forwarder is stopped and sends nothing more.
pub struct QueueToSocketForwarder {
    queue: EventQueue,
    channel: EventSocketChannel,
    retry: Duration,
    max_event_size: usize,
    state: ForwarderState,
    forwarded: u64,
}

impl QueueToSocketForwarder {
    pub fn new(queue: EventQueue, channel: EventSocketChannel, config: &StreamConfig) -> Self {
        Self {
            queue,
            channel,
            retry: config.enqueue_retry,
            max_event_size: config.max_event_size,
            state: ForwarderState::Running,
            forwarded: 0,
        }
    }

    /// Wait for one record and push it through the channel.
    pub fn pump_once(&mut self) -> Result<PumpResult, ForwardError> {
        if self.state == ForwarderState::Stopped {
            return Ok(PumpResult::Terminated);
        }

        let record = self.queue.dequeue_blocking(self.retry);

        match inspect_record(&record, self.max_event_size)? {
            FrameHeader::Terminate => {
                self.channel.send(&FramedBuffer::terminate())?;
                self.state = ForwarderState::Stopped;
                info!(
                    queue = %self.queue.name(),
                    forwarded = self.forwarded,
                    "terminate dequeued and forwarded"
                );
                Ok(PumpResult::Terminated)
            }
            FrameHeader::Data { total_len } => {
                if record.len() != total_len {
                    warn!(
                        declared = total_len,
                        actual = record.len(),
                        "queue record does not match its frame"
                    );
                    return Err(FrameError::TrailingBytes {
                        declared: total_len,
                        actual: record.len(),
                    }
                    .into());
                }
                let sent = self.channel.raw_send(&record)?;
                self.forwarded += 1;
                debug!(bytes = sent, "forwarded record");
                Ok(PumpResult::Forwarded(sent))
            }
        }
    }

    /// Pump until the terminate sentinel has been forwarded.
    pub fn run(&mut self) -> Result<ForwarderExit, ForwardError> {
        loop {
            match self.pump_once()? {
                PumpResult::Forwarded(_) => continue,
                PumpResult::Terminated => return Ok(ForwarderExit::Terminated),
                PumpResult::Disconnected => return Ok(ForwarderExit::Disconnected),
            }
        }
    }

    pub fn state(&self) -> ForwarderState {
        self.state
    }

    /// Data records sent so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn channel(&self) -> &EventSocketChannel {
        &self.channel
    }
}
