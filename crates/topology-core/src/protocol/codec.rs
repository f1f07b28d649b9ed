//! JSON codec for single protocol messages.
//!
//! Wire format: one UTF-8 JSON object per message, written back to back.
//!
//! ```text
//! {"sender_id":"A",...,"type":"query"}{"sender_id":"A",...,"type":"query"}
//! ```
//!
//! Message *boundaries* are recovered by [`crate::protocol::Framer`]; this
//! module only converts one complete frame to and from a [`Message`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::messages::Message;

/// Errors that can occur while encoding, framing, or decoding messages.
///
/// Running out of bytes mid-message is *not* an error: the framer reports it
/// as `Ok(None)` and waits for the next chunk.
#[derive(Debug, Error)]
pub enum FrameError {
    /// A complete frame was found but it is not a valid message.
    #[error("malformed frame ({len} bytes): {reason}")]
    Malformed { len: usize, reason: String },

    /// Bytes outside of any JSON object that are not whitespace.
    #[error("unexpected byte 0x{byte:02X} outside a message ({skipped} bytes discarded)")]
    UnexpectedByte { byte: u8, skipped: usize },

    /// A frame kept growing past the configured limit without completing.
    #[error("frame exceeds maximum length: {len} > {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// An outgoing message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl FrameError {
    /// Returns `true` for errors that describe corrupt *input*.
    ///
    /// Encode failures are local bugs, not stream corruption.
    pub fn is_decode_error(&self) -> bool {
        !matches!(self, FrameError::Encode(_))
    }
}

/// How outgoing messages are separated on the wire.
///
/// The framer accepts both forms on input because it skips whitespace
/// between objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFraming {
    /// Objects written back to back with no delimiter.
    #[default]
    Concatenated,
    /// Each object followed by a single `\n`.
    Newline,
}

/// Encodes `msg` as JSON, appending a newline when `framing` asks for one.
///
/// # Errors
///
/// Returns [`FrameError::Encode`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use topology_core::protocol::{encode_message, Message, WireFraming};
///
/// let bytes = encode_message(&Message::query("A", "B", "1"), WireFraming::Newline).unwrap();
/// assert!(bytes.ends_with(b"}\n"));
/// ```
pub fn encode_message(msg: &Message, framing: WireFraming) -> Result<Vec<u8>, FrameError> {
    let mut buf = serde_json::to_vec(msg).map_err(FrameError::Encode)?;
    if framing == WireFraming::Newline {
        buf.push(b'\n');
    }
    Ok(buf)
}

/// Decodes exactly one complete frame.
///
/// # Errors
///
/// Returns [`FrameError::Malformed`] if `frame` is not a valid message.
pub fn decode_frame(frame: &[u8]) -> Result<Message, FrameError> {
    let mut de = serde_json::Deserializer::from_slice(frame);
    let msg = Message::deserialize(&mut de)
        .and_then(|msg| de.end().map(|()| msg))
        .map_err(|e| FrameError::Malformed {
            len: frame.len(),
            reason: e.to_string(),
        })?;
    Ok(msg)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
