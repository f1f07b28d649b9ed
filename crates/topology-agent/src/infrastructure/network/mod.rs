//! Network infrastructure: the TCP stream to the proxy.
//!
//! [`StreamChannel`] implements the application's [`Channel`] port over any
//! `AsyncRead + AsyncWrite` stream.  Production code wraps a `TcpStream`
//! obtained from [`connect`]; tests wrap in-memory mock streams.

use std::fmt;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use topology_core::{encode_message, Message, WireFraming};

use crate::application::channel::{Channel, ChannelError};

/// Size of the buffer each read fills.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Configuration for the proxy connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
}

impl ProxyEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for ProxyEndpoint {
    fn default() -> Self {
        Self::new("127.0.0.1", 12080)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opens the TCP connection to the proxy.
///
/// # Errors
///
/// Returns [`ChannelError::ConnectFailed`] if the connection is refused or
/// the host cannot be resolved.
pub async fn connect(
    endpoint: &ProxyEndpoint,
    framing: WireFraming,
) -> Result<StreamChannel<TcpStream>, ChannelError> {
    let addr = endpoint.to_string();
    let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|source| ChannelError::ConnectFailed {
            addr: addr.clone(),
            source,
        })?;
    stream.set_nodelay(true)?;
    info!("connected to proxy at {addr}");
    Ok(StreamChannel::new(stream, framing))
}

/// A [`Channel`] over a byte stream.
pub struct StreamChannel<S> {
    /// `None` once closed.
    stream: Option<S>,
    framing: WireFraming,
    read_buf: Vec<u8>,
}

impl<S> StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, framing: WireFraming) -> Self {
        Self {
            stream: Some(stream),
            framing,
            read_buf: vec![0u8; READ_CHUNK_SIZE],
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn stream_mut(&mut self) -> Result<&mut S, ChannelError> {
        self.stream.as_mut().ok_or(ChannelError::Closed)
    }
}

#[async_trait]
impl<S> Channel for StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, msg: &Message) -> Result<(), ChannelError> {
        let bytes = encode_message(msg, self.framing).map_err(ChannelError::Encode)?;
        let stream = self.stream_mut()?;
        stream.write_all(&bytes).await?;
        stream.flush().await?;
        debug!("sent {} message ({} bytes)", msg.kind, bytes.len());
        Ok(())
    }

    async fn receive_chunk(&mut self) -> Result<Vec<u8>, ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::Closed)?;
        let n = stream.read(&mut self.read_buf).await?;
        if n == 0 {
            return Err(ChannelError::Closed);
        }
        Ok(self.read_buf[..n].to_vec())
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        match self.stream.take() {
            Some(mut stream) => {
                stream.shutdown().await?;
                debug!("proxy connection closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
