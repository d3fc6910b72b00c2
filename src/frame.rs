//! Length-prefixed event records.
//!
//! Wire layout: `[u32 LE total length][payload]`, where the total counts the
//! four header bytes too. A header word equal to [`MSG_TERMINATE`] is the end
//! of stream marker and carries no payload; it sits above [`MAXEVTSIZE`] so it
//! can never be mistaken for a length.

use crate::error::FrameError;

/// Upper bound on one encoded event, header included.
pub const MAXEVTSIZE: usize = 80_000_000;

/// Size of the length word in bytes.
pub const HEADER_SIZE: usize = 4;

/// Reserved header word marking "no more data will follow".
pub const MSG_TERMINATE: u32 = 0x7FFF_FFFE;

/// What a four-byte header announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeader {
    /// A data record of `total_len` bytes, header included.
    Data { total_len: usize },
    Terminate,
}

impl FrameHeader {
    /// Interpret a raw header word against the given event size limit.
    pub fn parse(word: [u8; HEADER_SIZE], max_event_size: usize) -> Result<Self, FrameError> {
        let value = u32::from_le_bytes(word);
        if value == MSG_TERMINATE {
            return Ok(FrameHeader::Terminate);
        }
        let declared = value as usize;
        if declared > max_event_size {
            return Err(FrameError::TooLarge {
                declared,
                max: max_event_size,
            });
        }
        if declared < HEADER_SIZE {
            return Err(FrameError::Undersized { declared });
        }
        Ok(FrameHeader::Data {
            total_len: declared,
        })
    }
}

/// One discrete event record, or the terminate sentinel.
#[derive(Clone, PartialEq, Eq)]
pub struct FramedBuffer {
    payload: Vec<u8>,
    terminate: bool,
}

impl FramedBuffer {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            terminate: false,
        }
    }

    /// The end-of-stream sentinel.
    pub fn terminate() -> Self {
        Self {
            payload: Vec::new(),
            terminate: true,
        }
    }

    /// Parse one record from the front of `raw` using [`MAXEVTSIZE`].
    pub fn from_bytes(raw: &[u8]) -> Result<Self, FrameError> {
        Self::decode(raw, MAXEVTSIZE).map(|(frame, _)| frame)
    }

    /// Parse one record from the front of `raw`, returning it with the number
    /// of bytes it occupied. Bytes past the declared length are left alone.
    pub fn decode(raw: &[u8], max_event_size: usize) -> Result<(Self, usize), FrameError> {
        match inspect_record(raw, max_event_size)? {
            FrameHeader::Terminate => Ok((Self::terminate(), HEADER_SIZE)),
            FrameHeader::Data { total_len } => {
                Ok((Self::new(&raw[HEADER_SIZE..total_len]), total_len))
            }
        }
    }

    /// Header followed by payload, ready for a queue or a socket.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.terminate {
            return MSG_TERMINATE.to_le_bytes().to_vec();
        }
        encode_payload(&self.payload)
    }

    /// The header word this record is sent with.
    pub fn header_word(&self) -> u32 {
        if self.terminate {
            MSG_TERMINATE
        } else {
            self.encoded_len() as u32
        }
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    pub fn is_terminate(&self) -> bool {
        self.terminate
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Reject records that would not pass [`FrameHeader::parse`] on the far side.
    pub fn check_size(&self, max_event_size: usize) -> Result<(), FrameError> {
        let declared = self.encoded_len();
        if !self.terminate && declared > max_event_size {
            return Err(FrameError::TooLarge {
                declared,
                max: max_event_size,
            });
        }
        Ok(())
    }
}

/// Encode `payload` as a data record without building a [`FramedBuffer`] first.
pub fn encode_payload(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&((HEADER_SIZE + payload.len()) as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Validate an encoded record in place, without copying its payload.
pub fn inspect_record(raw: &[u8], max_event_size: usize) -> Result<FrameHeader, FrameError> {
    let word: [u8; HEADER_SIZE] = raw
        .get(..HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or(FrameError::Truncated {
            needed: HEADER_SIZE,
            available: raw.len(),
        })?;
    let header = FrameHeader::parse(word, max_event_size)?;
    if let FrameHeader::Data { total_len } = header {
        if raw.len() < total_len {
            return Err(FrameError::Truncated {
                needed: total_len,
                available: raw.len(),
            });
        }
    }
    Ok(header)
}

/// True when an encoded record is the terminate sentinel.
pub fn is_terminate_record(raw: &[u8]) -> bool {
    raw.get(..HEADER_SIZE)
        .and_then(|h| <[u8; HEADER_SIZE]>::try_from(h).ok())
        .map(|word| u32::from_le_bytes(word) == MSG_TERMINATE)
        .unwrap_or(false)
}

impl std::fmt::Debug for FramedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::Debug::StructDebug::debug_framed_buffer(self, f)
    }
}
