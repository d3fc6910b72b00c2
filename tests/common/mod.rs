// Helpers shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use daq_evtstream::EventQueue;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A queue name no other test (or test run) is using. Unlinked on drop.
pub struct TestQueueName(pub String);

impl TestQueueName {
    pub fn new(tag: &str) -> Self {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = format!("daq_test_{}_{}_{}", tag, std::process::id(), n);
        let _ = EventQueue::unlink(&name);
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Drop for TestQueueName {
    fn drop(&mut self) {
        let _ = EventQueue::unlink(&self.0);
    }
}
