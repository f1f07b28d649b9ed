//! RunDiscoveryUseCase: drives one discovery session over a [`Channel`].
//!
//! The driver owns the channel, a [`Framer`], and a [`Discoverer`], and
//! pumps bytes between them:
//!
//! ```text
//! loop until the discoverer is Finalizing:
//!     channel.receive_chunk() ─▶ framer.extract() ─▶ discoverer.handle() ─▶ channel.send(query)*
//! discoverer.finalize() ─▶ channel.send(report) ─▶ wait for proxy EOF ─▶ channel.close()
//! ```
//!
//! The channel is closed exactly once however the session ends.  On failure
//! the partial topology is logged but never sent to the proxy.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use topology_core::{
    Discoverer, DiscoveryError, DiscoveryState, DiscoveryStats, FrameError, Framer, Message,
    Topology, DEFAULT_MAX_FRAME_LEN,
};

use crate::application::channel::{Channel, ChannelError};

/// Error type for a discovery run.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The transport failed: connection lost, I/O error, or encode failure.
    #[error("transport error: {0}")]
    Channel(#[from] ChannelError),

    /// No bytes arrived within the configured read timeout.
    #[error("no data received from proxy within {0:?}")]
    Timeout(Duration),

    /// The proxy sent bytes that are not a valid message.
    #[error("undecodable data from proxy: {0}")]
    Decode(#[from] FrameError),

    /// The message sequence violated the discovery protocol.
    #[error("discovery protocol error: {0}")]
    Discovery(#[from] DiscoveryError),
}

/// Tunables for a discovery run.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Deadline for each read.  `None` blocks until data or a connection error.
    pub read_timeout: Option<Duration>,
    /// How long to wait for the proxy to hang up after the report is sent.
    pub close_wait: Duration,
    /// Log and skip undecodable frames instead of failing the run.
    pub skip_malformed: bool,
    /// Largest frame the framer accepts.
    pub max_frame_len: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            close_wait: Duration::from_secs(2),
            skip_malformed: false,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryReport {
    pub node_id: String,
    pub topology: Topology,
    pub stats: DiscoveryStats,
}

/// The run-discovery use case.
pub struct DiscoveryDriver<C> {
    channel: C,
    config: DriverConfig,
    framer: Framer,
    discoverer: Discoverer,
}

impl<C: Channel> DiscoveryDriver<C> {
    /// Creates a driver whose messages carry UUID v4 ids.
    pub fn new(channel: C, config: DriverConfig) -> Self {
        Self::with_discoverer(channel, config, Discoverer::new())
    }

    /// Creates a driver around a pre-built (fresh) discoverer.
    pub fn with_discoverer(channel: C, config: DriverConfig, discoverer: Discoverer) -> Self {
        let framer = Framer::with_max_frame_len(config.max_frame_len);
        Self {
            channel,
            config,
            framer,
            discoverer,
        }
    }

    /// Runs the session to completion and releases the channel.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] for transport failures, read timeouts, decode
    /// errors (unless `skip_malformed` is set), and protocol violations.
    pub async fn run(mut self) -> Result<DiscoveryReport, AgentError> {
        let outcome = self.drive().await;
        if let Err(e) = &outcome {
            self.log_partial_topology(e);
        }
        if let Err(e) = self.channel.close().await {
            warn!("failed to close proxy connection: {e}");
        }
        outcome
    }

    async fn drive(&mut self) -> Result<DiscoveryReport, AgentError> {
        info!("waiting for node id assignment from proxy");
        while !self.discoverer.is_finalizing() {
            for msg in self.next_messages().await? {
                let outgoing = self.discoverer.handle(msg)?;
                for query in &outgoing {
                    debug!("querying neighbors of {:?}", query.receiver_id);
                    self.channel.send(query).await?;
                }
            }
        }

        let report = self.discoverer.finalize()?;
        self.channel.send(&report).await?;
        info!(
            "sent topology report for {} nodes to proxy",
            report.topology.len()
        );
        self.await_proxy_close().await;

        Ok(DiscoveryReport {
            node_id: report.sender_id,
            topology: report.topology,
            stats: self.discoverer.stats(),
        })
    }

    /// Returns the next non-empty batch of decoded messages, reading as needed.
    async fn next_messages(&mut self) -> Result<Vec<Message>, AgentError> {
        loop {
            match self.framer.extract() {
                Ok(messages) if !messages.is_empty() => return Ok(messages),
                Ok(_) => {}
                Err(e) if self.config.skip_malformed && e.is_decode_error() => {
                    warn!("skipping undecodable data from proxy: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            let chunk = self.read_chunk().await?;
            debug!("received {} bytes from proxy", chunk.len());
            self.framer.append(&chunk);
        }
    }

    async fn read_chunk(&mut self) -> Result<Vec<u8>, AgentError> {
        match self.config.read_timeout {
            None => Ok(self.channel.receive_chunk().await?),
            Some(limit) => match tokio::time::timeout(limit, self.channel.receive_chunk()).await {
                Ok(chunk) => Ok(chunk?),
                Err(_) => Err(AgentError::Timeout(limit)),
            },
        }
    }

    /// Waits for the proxy to hang up, which confirms the report was taken.
    async fn await_proxy_close(&mut self) {
        let limit = self.config.close_wait;
        if limit.is_zero() {
            return;
        }
        let channel = &mut self.channel;
        let hang_up = tokio::time::timeout(limit, async {
            loop {
                match channel.receive_chunk().await {
                    Ok(chunk) => debug!("ignoring {} bytes received after the report", chunk.len()),
                    Err(e) => return e,
                }
            }
        })
        .await;

        match hang_up {
            Ok(ChannelError::Closed) => info!("proxy closed the connection; report accepted"),
            Ok(e) => warn!("connection error after the report was sent: {e}"),
            Err(_) => info!("proxy still connected after {limit:?}; closing"),
        }
    }

    fn log_partial_topology(&self, error: &AgentError) {
        let topology = self.discoverer.topology();
        match self.discoverer.state() {
            DiscoveryState::AwaitingInit => {
                warn!("discovery failed before a node id was assigned: {error}");
            }
            _ => {
                let explored: Vec<&str> = topology.keys().map(String::as_str).collect();
                let outstanding: Vec<&str> = self.discoverer.outstanding().collect();
                warn!(
                    "discovery failed after exploring {} nodes {:?} ({} outstanding {:?}); \
                     partial topology not sent: {error}",
                    explored.len(),
                    explored,
                    outstanding.len(),
                    outstanding
                );
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::channel::MockChannel;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use topology_core::{encode_message, MessageType, SequentialIds, WireFraming};

    // ── Test doubles ──────────────────────────────────────────────────────────

    /// Replays scripted inbound chunks and records what the driver sends.
    struct ScriptedChannel {
        inbound: VecDeque<Result<Vec<u8>, ChannelError>>,
        sent: Arc<Mutex<Vec<Message>>>,
        closes: Arc<AtomicUsize>,
    }

    impl ScriptedChannel {
        fn new(inbound: Vec<Result<Vec<u8>, ChannelError>>) -> Self {
            Self {
                inbound: inbound.into(),
                sent: Arc::default(),
                closes: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl Channel for ScriptedChannel {
        async fn send(&mut self, msg: &Message) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(msg.clone());
            Ok(())
        }

        async fn receive_chunk(&mut self) -> Result<Vec<u8>, ChannelError> {
            self.inbound.pop_front().unwrap_or(Err(ChannelError::Closed))
        }

        async fn close(&mut self) -> Result<(), ChannelError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Never produces a chunk.
    struct StalledChannel {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Channel for StalledChannel {
        async fn send(&mut self, _msg: &Message) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn receive_chunk(&mut self) -> Result<Vec<u8>, ChannelError> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), ChannelError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn wire(messages: &[Message]) -> Vec<u8> {
        messages
            .iter()
            .flat_map(|m| encode_message(m, WireFraming::Concatenated).unwrap())
            .collect()
    }

    fn reply(from: &str, neighbors: &[&str]) -> Message {
        Message::neighbors_reply(
            from,
            "A",
            "",
            neighbors.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn driver<C: Channel>(channel: C, config: DriverConfig) -> DiscoveryDriver<C> {
        DiscoveryDriver::with_discoverer(
            channel,
            config,
            Discoverer::with_id_source(SequentialIds::new("q")),
        )
    }

    fn scenario_stream() -> Vec<u8> {
        wire(&[
            Message::init("proxy", "A", "i1"),
            reply("A", &["B", "C"]),
            reply("B", &["D"]),
            reply("C", &[]),
            reply("D", &[]),
        ])
    }

    // ── Success path ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_run_discovers_topology_and_sends_one_report() {
        // Arrange: the whole stream split mid-message into two chunks
        let stream = scenario_stream();
        let (head, tail) = stream.split_at(50);
        let channel = ScriptedChannel::new(vec![Ok(head.to_vec()), Ok(tail.to_vec())]);
        let sent = Arc::clone(&channel.sent);
        let closes = Arc::clone(&channel.closes);

        // Act
        let report = driver(channel, DriverConfig::default()).run().await.unwrap();

        // Assert
        assert_eq!(report.node_id, "A");
        assert_eq!(report.topology.len(), 4);
        assert_eq!(report.topology["A"], vec!["B", "C"]);
        assert_eq!(report.topology["B"], vec!["D"]);
        assert_eq!(report.stats.queries_sent, 4);

        let sent = sent.lock().unwrap();
        let receivers: Vec<&str> = sent.iter().map(|m| m.receiver_id.as_str()).collect();
        assert_eq!(receivers, vec!["A", "B", "C", "D", ""]);
        let reports = sent.iter().filter(|m| m.kind == MessageType::Topology).count();
        assert_eq!(reports, 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_succeeds_even_if_close_fails() {
        // Arrange
        let stream = wire(&[Message::init("proxy", "A", "i1"), reply("A", &[])]);
        let mut mock = MockChannel::new();
        let mut inbound = VecDeque::from(vec![Ok(stream)]);
        mock.expect_receive_chunk()
            .returning(move || inbound.pop_front().unwrap_or(Err(ChannelError::Closed)));
        mock.expect_send().times(2).returning(|_| Ok(()));
        mock.expect_close()
            .times(1)
            .returning(|| Err(ChannelError::Io(std::io::ErrorKind::NotConnected.into())));

        // Act
        let result = driver(mock, DriverConfig::default()).run().await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_zero_close_wait_skips_waiting_for_eof() {
        // Arrange: after the report the mock would fail the test if read again
        let stream = wire(&[Message::init("proxy", "A", "i1"), reply("A", &[])]);
        let mut mock = MockChannel::new();
        mock.expect_receive_chunk()
            .times(1)
            .return_once(move || Ok(stream));
        mock.expect_send().times(2).returning(|_| Ok(()));
        mock.expect_close().times(1).returning(|| Ok(()));
        let config = DriverConfig {
            close_wait: Duration::ZERO,
            ..DriverConfig::default()
        };

        // Act
        let report = driver(mock, config).run().await.unwrap();

        // Assert
        assert_eq!(report.topology.len(), 1);
    }

    // ── Fatal transport errors ────────────────────────────────────────────────

    #[tokio::test]
    async fn test_connection_closed_before_init_is_fatal_and_closes_once() {
        // Arrange
        let mut mock = MockChannel::new();
        mock.expect_receive_chunk()
            .times(1)
            .returning(|| Err(ChannelError::Closed));
        mock.expect_send().never();
        mock.expect_close().times(1).returning(|| Ok(()));

        // Act
        let result = driver(mock, DriverConfig::default()).run().await;

        // Assert
        assert!(matches!(
            result,
            Err(AgentError::Channel(ChannelError::Closed))
        ));
    }

    #[tokio::test]
    async fn test_io_error_during_exploration_is_fatal_and_closes_once() {
        // Arrange: init arrives, then the connection breaks
        let init = wire(&[Message::init("proxy", "A", "i1")]);
        let mut inbound = VecDeque::from(vec![
            Ok(init),
            Err(ChannelError::Io(std::io::ErrorKind::ConnectionReset.into())),
        ]);
        let mut mock = MockChannel::new();
        mock.expect_receive_chunk()
            .times(2)
            .returning(move || inbound.pop_front().unwrap_or(Err(ChannelError::Closed)));
        mock.expect_send()
            .withf(|msg: &Message| msg.kind == MessageType::Query && msg.receiver_id == "A")
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_close().times(1).returning(|| Ok(()));

        // Act
        let result = driver(mock, DriverConfig::default()).run().await;

        // Assert
        assert!(matches!(result, Err(AgentError::Channel(ChannelError::Io(_)))));
    }

    #[tokio::test]
    async fn test_send_failure_is_fatal_and_no_report_is_sent() {
        let stream = wire(&[Message::init("proxy", "A", "i1")]);
        let mut mock = MockChannel::new();
        mock.expect_receive_chunk()
            .times(1)
            .return_once(move || Ok(stream));
        mock.expect_send()
            .times(1)
            .returning(|_| Err(ChannelError::Io(std::io::ErrorKind::BrokenPipe.into())));
        mock.expect_close().times(1).returning(|| Ok(()));

        let result = driver(mock, DriverConfig::default()).run().await;

        assert!(matches!(result, Err(AgentError::Channel(_))));
    }

    #[tokio::test]
    async fn test_read_timeout_is_fatal() {
        // Arrange
        let closes = Arc::new(AtomicUsize::new(0));
        let channel = StalledChannel {
            closes: Arc::clone(&closes),
        };
        let config = DriverConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..DriverConfig::default()
        };

        // Act
        let result = driver(channel, config).run().await;

        // Assert
        assert!(matches!(result, Err(AgentError::Timeout(d)) if d == Duration::from_millis(20)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    // ── Decode errors ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_malformed_frame_is_fatal_by_default() {
        // Arrange
        let mut stream = wire(&[Message::init("proxy", "A", "i1")]);
        stream.extend_from_slice(br#"{"type":"query","n":5}"#);
        let channel = ScriptedChannel::new(vec![Ok(stream)]);
        let sent = Arc::clone(&channel.sent);
        let closes = Arc::clone(&channel.closes);

        // Act
        let result = driver(channel, DriverConfig::default()).run().await;

        // Assert
        assert!(matches!(
            result,
            Err(AgentError::Decode(FrameError::Malformed { .. }))
        ));
        assert!(sent
            .lock()
            .unwrap()
            .iter()
            .all(|m| m.kind != MessageType::Topology));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_skipped_when_configured() {
        // Arrange: garbage and a bad frame interleaved with a valid session
        let mut stream = wire(&[Message::init("proxy", "A", "i1")]);
        stream.extend_from_slice(b"garbage");
        stream.extend_from_slice(br#"{"type":"query","n":5}"#);
        stream.extend(wire(&[reply("A", &["B"]), reply("B", &[])]));
        let channel = ScriptedChannel::new(vec![Ok(stream)]);
        let config = DriverConfig {
            skip_malformed: true,
            ..DriverConfig::default()
        };

        // Act
        let report = driver(channel, config).run().await.unwrap();

        // Assert
        assert_eq!(report.topology.len(), 2);
    }

    #[test]
    fn test_driver_config_defaults() {
        let cfg = DriverConfig::default();
        assert_eq!(cfg.read_timeout, None);
        assert_eq!(cfg.close_wait, Duration::from_secs(2));
        assert!(!cfg.skip_malformed);
        assert_eq!(cfg.max_frame_len, DEFAULT_MAX_FRAME_LEN);
    }
}
