use super::EventQueue;
use crate::config::StreamConfig;
use crate::error::QueueError;

pub struct QueueBuilder {
    name: String,
    size_bytes: usize,
    attach_only: bool,
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self {
            name: "daq_evtstream".to_string(),
            size_bytes: StreamConfig::default().queue_size_bytes,
            attach_only: false,
        }
    }
}

impl QueueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_size(mut self, size_bytes: usize) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    /// Require the queue to exist already; its size is taken from the region.
    pub fn attach_only(mut self, attach_only: bool) -> Self {
        self.attach_only = attach_only;
        self
    }

    pub fn from_config(name: impl Into<String>, config: &StreamConfig) -> Self {
        Self::new()
            .with_name(name)
            .with_size(config.queue_size_bytes)
    }

    pub fn open(self) -> Result<EventQueue, QueueError> {
        if self.attach_only {
            EventQueue::attach(&self.name)
        } else {
            EventQueue::open(&self.name, self.size_bytes)
        }
    }
}
