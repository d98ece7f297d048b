//! Stream framing for inbound FIX bytes.
//!
//! Frames are cut using BodyLength (9) rather than by searching for the
//! `10=` trailer, since `10=` can legitimately appear inside a value.

use crate::errors::{ExchangeError, Result};
use crate::fix::message::FixMessage;
use crate::fix::tags::SOH;
use memchr::{memchr, memmem};

pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;
const TRAILER_LEN: usize = 7; // "10=nnn" + SOH
const START_PATTERN: &[u8] = b"8=";
const LENGTH_PATTERN: &[u8] = b"9=";

#[derive(Debug)]
pub struct FixParser {
    buffer: Vec<u8>,
    max_message_size: usize,
}

impl Default for FixParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FixParser {
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(8192),
            max_message_size,
        }
    }

    pub fn append_buffer(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete message, `Ok(None)` when more bytes are needed.
    ///
    /// A bad frame is removed from the buffer before its error is returned,
    /// so the following call resumes at the next `8=`.
    pub fn get_message(&mut self) -> Result<Option<FixMessage>> {
        if !self.discard_to_start() {
            return Ok(None);
        }

        // 8=<begin><SOH>
        let Some(begin_end) = memchr(SOH, &self.buffer) else {
            return self.wait_or_drop();
        };
        let length_start = begin_end + 1;
        if self.buffer.len() < length_start + LENGTH_PATTERN.len() {
            return self.wait_or_drop();
        }
        if &self.buffer[length_start..length_start + LENGTH_PATTERN.len()] != LENGTH_PATTERN {
            return self.drop_frame("BodyLength (9) must follow BeginString");
        }

        // 9=<len><SOH>
        let value_start = length_start + LENGTH_PATTERN.len();
        let Some(length_end) = memchr(SOH, &self.buffer[value_start..]).map(|i| value_start + i) else {
            return self.wait_or_drop();
        };
        let body_length = match std::str::from_utf8(&self.buffer[value_start..length_end])
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            Some(len) => len,
            None => return self.drop_frame("BodyLength is not a number"),
        };

        let body_start = length_end + 1;
        let total = match body_start
            .checked_add(body_length)
            .and_then(|end| end.checked_add(TRAILER_LEN))
        {
            Some(total) if total <= self.max_message_size => total,
            _ => {
                return self.drop_frame(&format!(
                    "BodyLength {body_length} exceeds maximum message size {}",
                    self.max_message_size
                ))
            }
        };
        let trailer_start = total - TRAILER_LEN;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let trailer = &self.buffer[trailer_start..total];
        let trailer_ok = trailer.starts_with(b"10=")
            && trailer[3..6].iter().all(u8::is_ascii_digit)
            && trailer[6] == SOH;
        if !trailer_ok {
            return self.drop_frame("CheckSum (10) not found at BodyLength offset");
        }

        let frame: Vec<u8> = self.buffer.drain(..total).collect();
        FixMessage::decode(&frame).map(Some)
    }

    /// Drop bytes before the next `8=`; false when no start is buffered.
    fn discard_to_start(&mut self) -> bool {
        match memmem::find(&self.buffer, START_PATTERN) {
            Some(0) => true,
            Some(idx) => {
                tracing::warn!("Discarding {} bytes before FIX BeginString", idx);
                self.buffer.drain(..idx);
                true
            }
            None => {
                // a lone trailing '8' may be the first half of the next start
                let keep = usize::from(self.buffer.last() == Some(&b'8'));
                let discard = self.buffer.len() - keep;
                if discard > 0 {
                    tracing::warn!("Discarding {} bytes without FIX BeginString", discard);
                    self.buffer.drain(..discard);
                }
                false
            }
        }
    }

    fn wait_or_drop(&mut self) -> Result<Option<FixMessage>> {
        if self.buffer.len() > self.max_message_size {
            return self.drop_frame("header exceeds maximum message size");
        }
        Ok(None)
    }

    fn drop_frame(&mut self, reason: &str) -> Result<Option<FixMessage>> {
        // skip past this "8=" so the next search finds the following one
        let skip = START_PATTERN.len().min(self.buffer.len());
        self.buffer.drain(..skip);
        Err(ExchangeError::MalformedMessage(reason.to_string()))
    }
}
