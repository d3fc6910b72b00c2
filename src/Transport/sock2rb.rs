// Socket -> queue ingress ("sock2rb")

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{EventSocketChannel, ForwarderExit, ForwarderState, PumpResult};
use crate::config::StreamConfig;
use crate::error::ForwardError;
use crate::Queue::EventQueue;

/// Receives frames from an [`EventSocketChannel`] and enqueues them.
///
/// Each data frame is enqueued in its encoded form, waiting as long as it
/// takes for space; nothing received is ever dropped. The terminate sentinel is
/// a control signal and is not enqueued.
pub struct SocketToQueueForwarder {
    channel: EventSocketChannel,
    queue: EventQueue,
    retry: Duration,
    state: ForwarderState,
    forwarded: u64,
}

impl SocketToQueueForwarder {
    pub fn new(channel: EventSocketChannel, queue: EventQueue, config: &StreamConfig) -> Self {
        Self {
            channel,
            queue,
            retry: config.enqueue_retry,
            state: ForwarderState::Running,
            forwarded: 0,
        }
    }

    /// Receive one frame and place it in the queue.
    pub fn pump_once(&mut self) -> Result<PumpResult, ForwardError> {
        if self.state == ForwarderState::Stopped {
            return Ok(PumpResult::Terminated);
        }

        let frame = match self.channel.recv()? {
            Some(frame) => frame,
            None => {
                self.state = ForwarderState::Stopped;
                warn!(
                    peer = ?self.channel.peer_addr(),
                    forwarded = self.forwarded,
                    "peer closed without terminate"
                );
                return Ok(PumpResult::Disconnected);
            }
        };

        if frame.is_terminate() {
            self.state = ForwarderState::Stopped;
            info!(
                queue = %self.queue.name(),
                forwarded = self.forwarded,
                "terminate received"
            );
            return Ok(PumpResult::Terminated);
        }

        let record = frame.to_bytes();
        self.queue.enqueue_blocking(&record, self.retry)?;
        self.forwarded += 1;
        debug!(bytes = record.len(), "enqueued record");
        Ok(PumpResult::Forwarded(record.len()))
    }

    /// Pump until terminate or disconnect.
    pub fn run(&mut self) -> Result<ForwarderExit, ForwardError> {
        self.run_until(&AtomicBool::new(false))
    }

    /// Like [`run`](Self::run), but also stop between records once `stop` is set.
    ///
    /// Whoever sets `stop` should shut the socket down (see
    /// [`EventSocketChannel::try_clone_stream`]) so a blocked receive returns.
    /// A disconnect or socket error seen after `stop` counts as the interrupt.
    pub fn run_until(&mut self, stop: &AtomicBool) -> Result<ForwarderExit, ForwardError> {
        loop {
            if stop.load(Ordering::Acquire) {
                return Ok(self.interrupted());
            }
            match self.pump_once() {
                Ok(PumpResult::Forwarded(_)) => continue,
                Ok(PumpResult::Terminated) => return Ok(ForwarderExit::Terminated),
                Ok(PumpResult::Disconnected) | Err(ForwardError::Channel(_))
                    if stop.load(Ordering::Acquire) =>
                {
                    return Ok(self.interrupted())
                }
                Ok(PumpResult::Disconnected) => return Ok(ForwarderExit::Disconnected),
                Err(e) => return Err(e),
            }
        }
    }

    fn interrupted(&mut self) -> ForwarderExit {
        self.state = ForwarderState::Stopped;
        info!(forwarded = self.forwarded, "stopped on request");
        ForwarderExit::Interrupted
    }

    pub fn state(&self) -> ForwarderState {
        self.state
    }

    /// Data records enqueued so far.
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
