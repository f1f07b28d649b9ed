//! The byte-stream port the discovery driver talks through.
//!
//! The driver depends only on the [`Channel`] trait.  The TCP implementation
//! lives in `infrastructure::network`; tests substitute scripted channels.

use async_trait::async_trait;
use thiserror::Error;
use topology_core::{FrameError, Message};

/// Errors raised by a [`Channel`].  All of them end the session.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The TCP connection to the proxy could not be established.
    #[error("failed to connect to proxy at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The proxy closed the connection, or the channel was already closed.
    #[error("connection closed by proxy")]
    Closed,

    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An outgoing message could not be serialized.
    #[error("failed to encode outgoing message: {0}")]
    Encode(#[source] FrameError),
}

/// Send/receive abstraction over the single stream to the proxy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Channel: Send {
    /// Encodes and writes one message.
    async fn send(&mut self, msg: &Message) -> Result<(), ChannelError>;

    /// Waits for the next chunk of raw bytes.
    ///
    /// Chunks carry no framing guarantee: one may hold half a message or
    /// several.  End of stream is reported as [`ChannelError::Closed`], never
    /// as an empty chunk.
    async fn receive_chunk(&mut self) -> Result<Vec<u8>, ChannelError>;

    /// Releases the underlying connection.
    async fn close(&mut self) -> Result<(), ChannelError>;
}
