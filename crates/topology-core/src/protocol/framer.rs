//! Stream framer: recovers whole messages from an unbounded, chunked byte stream.
//!
//! The proxy writes JSON objects back to back with no length prefix and no
//! delimiter, and TCP may split or coalesce them arbitrarily:
//!
//! ```text
//! read 1: {"type":"init","receiver_id":"A"}{"type":"qu
//! read 2: ery","n":["B"]}
//! ```
//!
//! # Scanning
//!
//! The framer walks the accumulated bytes once, tracking object depth and
//! whether the cursor is inside a JSON string (including `\"` escapes).  A
//! frame ends at the `}` that brings depth back to zero.  Nested objects such
//! as the `topology` map, and braces inside string values, never end a frame
//! early.
//!
//! Scan progress is kept between calls, so a large message delivered one
//! byte at a time is still scanned in linear time.
//!
//! # Error routing
//!
//! | Situation                          | Result                              |
//! |------------------------------------|-------------------------------------|
//! | Partial message at end of buffer   | `Ok(None)`: not an error, read more |
//! | Complete frame, invalid message    | [`FrameError::Malformed`], frame dropped |
//! | Junk between objects               | [`FrameError::UnexpectedByte`], junk dropped |
//! | Incomplete frame over the limit    | [`FrameError::FrameTooLarge`], buffer cleared |

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::protocol::codec::{decode_frame, FrameError};
use crate::protocol::messages::Message;

/// Default upper bound for a single frame: 16 MiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Progress through the frame currently at the front of the buffer.
#[derive(Debug, Clone, Copy, Default)]
struct ScanState {
    /// Bytes of the current frame already examined.
    pos: usize,
    /// Object nesting depth at `pos`.
    depth: usize,
    in_string: bool,
    escaped: bool,
}

/// Accumulates raw chunks and yields complete decoded [`Message`]s.
///
/// # Example
///
/// ```rust
/// use topology_core::protocol::{Framer, MessageType};
///
/// let mut framer = Framer::new();
/// framer.append(br#"{"type":"init","receiver_id":"A"}{"type":"qu"#);
/// let first = framer.extract().unwrap();
/// assert_eq!(first.len(), 1);
/// assert_eq!(first[0].kind, MessageType::Init);
///
/// framer.append(br#"ery","n":["B"]}"#);
/// let second = framer.extract().unwrap();
/// assert_eq!(second[0].neighbors, vec!["B"]);
/// assert!(framer.is_empty());
/// ```
pub struct Framer {
    buffer: BytesMut,
    scan: ScanState,
    max_frame_len: usize,
    /// Error found after messages were already collected by `extract`;
    /// reported on the following call so those messages are not lost.
    deferred: Option<FrameError>,
}

impl Framer {
    /// Creates a framer with the default frame limit.
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Creates a framer that rejects frames longer than `max_frame_len` bytes.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            scan: ScanState::default(),
            max_frame_len,
            deferred: None,
        }
    }

    /// Appends a raw chunk to the accumulator without decoding anything.
    pub fn append(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Appends `chunk` and extracts every message it completes.
    ///
    /// # Errors
    ///
    /// See [`Framer::extract`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Message>, FrameError> {
        self.append(chunk);
        self.extract()
    }

    /// Decodes all complete messages currently buffered, in arrival order.
    ///
    /// Returns an empty vector when the buffer holds only part of a message;
    /// those bytes stay buffered for the next call.
    ///
    /// # Errors
    ///
    /// Returns the first framing or decode error.  If valid messages were
    /// decoded ahead of the bad frame, they are returned first and the error
    /// is reported by the next call.
    pub fn extract(&mut self) -> Result<Vec<Message>, FrameError> {
        let mut messages = Vec::new();
        loop {
            match self.next_message() {
                Ok(Some(msg)) => messages.push(msg),
                Ok(None) => return Ok(messages),
                Err(e) if messages.is_empty() => return Err(e),
                Err(e) => {
                    self.deferred = Some(e);
                    return Ok(messages);
                }
            }
        }
    }

    /// Decodes the next complete message, if there is one.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] when the next frame is corrupt.  The corrupt
    /// bytes are consumed, so calling again continues with the following frame.
    pub fn next_message(&mut self) -> Result<Option<Message>, FrameError> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        match self.next_frame()? {
            Some(frame) => {
                let msg = decode_frame(&frame)?;
                debug!("framed {} message ({} bytes)", msg.kind, frame.len());
                Ok(Some(msg))
            }
            None => Ok(None),
        }
    }

    /// Splits the next complete JSON object off the front of the buffer.
    fn next_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.scan.depth == 0 {
            let whitespace = self
                .buffer
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            self.buffer.advance(whitespace);

            match self.buffer.first() {
                None => return Ok(None),
                Some(b'{') => {}
                Some(&byte) => {
                    let skipped = self
                        .buffer
                        .iter()
                        .position(|&b| b == b'{')
                        .unwrap_or(self.buffer.len());
                    self.buffer.advance(skipped);
                    return Err(FrameError::UnexpectedByte { byte, skipped });
                }
            }
        }

        while let Some(&b) = self.buffer.get(self.scan.pos) {
            self.scan.pos += 1;

            if self.scan.in_string {
                if self.scan.escaped {
                    self.scan.escaped = false;
                } else if b == b'\\' {
                    self.scan.escaped = true;
                } else if b == b'"' {
                    self.scan.in_string = false;
                }
                continue;
            }

            match b {
                b'"' => self.scan.in_string = true,
                b'{' => self.scan.depth += 1,
                b'}' => {
                    self.scan.depth -= 1;
                    if self.scan.depth == 0 {
                        let frame = self.buffer.split_to(self.scan.pos).freeze();
                        self.scan = ScanState::default();
                        return Ok(Some(frame));
                    }
                }
                _ => {}
            }
        }

        if self.buffer.len() > self.max_frame_len {
            let len = self.buffer.len();
            self.clear();
            return Err(FrameError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        trace!(
            "partial frame buffered ({} bytes, depth {})",
            self.buffer.len(),
            self.scan.depth
        );
        Ok(None)
    }

    /// Bytes received but not yet returned as a message.
    pub fn pending_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` when no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The configured frame length limit.
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Discards all buffered bytes and any deferred error.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scan = ScanState::default();
        self.deferred = None;
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
