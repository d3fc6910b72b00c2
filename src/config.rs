use std::time::Duration;

use crate::frame::MAXEVTSIZE;

/// When a multi-source collector considers the session over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminatePolicy {
    /// The first terminate message from any source ends the session.
    #[default]
    FirstSource,
    /// Every source must send its terminate message.
    AllSources,
}

/// Process-start settings shared by the forwarders and the collector.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub max_event_size: usize,
    pub queue_size_bytes: usize,
    /// Bounded wait between queue admission attempts in the forwarders.
    pub enqueue_retry: Duration,
    /// Bounded wait between queue pushes in the collector.
    pub reassembler_retry: Duration,
    pub eos_tag: Vec<u8>,
    pub terminate_tag: Vec<u8>,
    pub sources: usize,
    pub terminate_policy: TerminatePolicy,
    /// Largest single read() issued by the collector.
    pub read_chunk: usize,
    pub nodelay: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_event_size: MAXEVTSIZE,
            queue_size_bytes: 128 * 1024 * 1024, // 128MB default
            enqueue_retry: Duration::from_micros(20),
            reassembler_retry: Duration::from_micros(100),
            eos_tag: b"EOS".to_vec(),
            terminate_tag: b"Terminate".to_vec(),
            sources: 1,
            terminate_policy: TerminatePolicy::FirstSource,
            read_chunk: 64 * 1024,
            nodelay: true,
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_event_size(mut self, size: usize) -> Self {
        self.max_event_size = size;
        self
    }

    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size_bytes = size;
        self
    }

    pub fn with_enqueue_retry(mut self, interval: Duration) -> Self {
        self.enqueue_retry = interval;
        self
    }

    pub fn with_reassembler_retry(mut self, interval: Duration) -> Self {
        self.reassembler_retry = interval;
        self
    }

    pub fn with_eos_tag(mut self, tag: impl Into<Vec<u8>>) -> Self {
        self.eos_tag = tag.into();
        self
    }

    pub fn with_terminate_tag(mut self, tag: impl Into<Vec<u8>>) -> Self {
        self.terminate_tag = tag.into();
        self
    }

    pub fn with_sources(mut self, sources: usize) -> Self {
        self.sources = sources.max(1);
        self
    }

    pub fn with_terminate_policy(mut self, policy: TerminatePolicy) -> Self {
        self.terminate_policy = policy;
        self
    }

    pub fn with_read_chunk(mut self, bytes: usize) -> Self {
        self.read_chunk = bytes.max(1);
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}
