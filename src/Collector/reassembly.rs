//! EOS-tag message reassembly.
//!
//! Bytes arrive in arbitrary chunks. A message ends where the EOS tag starts;
//! the tag itself is dropped. Whatever follows the last tag in a chunk is kept
//! as carry-over until a later chunk completes it. Tags split across chunk
//! boundaries are found because the scan resumes `tag_len - 1` bytes before
//! the end of the previous carry-over.

use bytes::{Buf, Bytes, BytesMut};

use crate::config::StreamConfig;
use crate::error::DecodeError;
use crate::frame::HEADER_SIZE;

/// Whether decoding may continue after a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    /// The terminate message was decoded; the rest of the chunk was discarded.
    Terminated,
}

/// Messages completed by one chunk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub messages: Vec<Bytes>,
    pub terminated: bool,
}

/// First offset of `tag` in `haystack`.
///
/// Only `haystack.len() - tag.len() + 1` start positions are tried, so the
/// scan never reads past the end; a haystack shorter than the tag has none.
pub fn find_eos(haystack: &[u8], tag: &[u8]) -> Option<usize> {
    if tag.is_empty() {
        return None;
    }
    haystack.windows(tag.len()).position(|w| w == tag)
}

/// Carry-over state for one upstream source.
pub struct ReassemblyState {
    carry: BytesMut,
    /// Where the next EOS scan starts inside `carry`.
    scan_from: usize,
    eos_tag: Bytes,
    terminate_tag: Bytes,
    capacity: usize,
}

impl ReassemblyState {
    /// `capacity` bounds the length of a single message.
    pub fn new(
        eos_tag: impl Into<Bytes>,
        terminate_tag: impl Into<Bytes>,
        capacity: usize,
    ) -> Result<Self, DecodeError> {
        let eos_tag = eos_tag.into();
        if eos_tag.is_empty() {
            return Err(DecodeError::EmptyEosTag);
        }
        Ok(Self {
            carry: BytesMut::new(),
            scan_from: 0,
            eos_tag,
            terminate_tag: terminate_tag.into(),
            capacity,
        })
    }

    /// Tags from `config`; a message plus its frame header must fit `max_event_size`.
    pub fn from_config(config: &StreamConfig) -> Result<Self, DecodeError> {
        Self::new(
            config.eos_tag.clone(),
            config.terminate_tag.clone(),
            config.max_event_size.saturating_sub(HEADER_SIZE),
        )
    }

    /// Feed one chunk, appending every completed message to `out`.
    ///
    /// Messages completed before an error are still in `out`. After an error
    /// the carry-over is cleared; the source should be dropped.
    pub fn decode_chunk(&mut self, chunk: &[u8], out: &mut Vec<Bytes>) -> Result<Progress, DecodeError> {
        let tag_len = self.eos_tag.len();
        self.carry.extend_from_slice(chunk);

        loop {
            let found = find_eos(&self.carry[self.scan_from..], &self.eos_tag);
            let Some(rel) = found else {
                self.scan_from = self.carry.len().saturating_sub(tag_len - 1);
                break;
            };

            let at = self.scan_from + rel;
            if at > self.capacity {
                return Err(self.overflow(at));
            }
            let message = self.carry.split_to(at).freeze();
            self.carry.advance(tag_len);
            self.scan_from = 0;

            if message == self.terminate_tag {
                self.reset();
                return Ok(Progress::Terminated);
            }
            out.push(message);
        }

        // Bytes that can no longer be the start of a tag belong to the open message.
        let committed = self.carry.len().saturating_sub(tag_len - 1);
        if committed > self.capacity {
            return Err(self.overflow(committed));
        }
        Ok(Progress::Continue)
    }

    /// Feed one chunk and collect what it completed.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Decoded, DecodeError> {
        let mut messages = Vec::new();
        let progress = self.decode_chunk(chunk, &mut messages)?;
        Ok(Decoded {
            messages,
            terminated: progress == Progress::Terminated,
        })
    }

    fn overflow(&mut self, pending: usize) -> DecodeError {
        self.reset();
        DecodeError::BufferFull {
            pending,
            capacity: self.capacity,
        }
    }

    /// Drop any carry-over.
    pub fn reset(&mut self) {
        self.carry.clear();
        self.scan_from = 0;
    }

    /// Bytes held over for an incomplete message.
    pub fn carry_over_len(&self) -> usize {
        self.carry.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
