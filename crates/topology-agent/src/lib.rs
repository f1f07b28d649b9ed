//! topology-agent library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the agent do?
//!
//! One agent runs beside each node of a network.  It:
//!
//! 1. Connects to the coordinating proxy over TCP.
//! 2. Waits for an `init` message assigning this node's id.
//! 3. Explores the graph breadth-first by sending `query` messages and
//!    reading the neighbor lists the proxy returns.
//! 4. Sends the complete topology back to the proxy, optionally writes it
//!    to a local file, and exits.

/// Application layer: the channel port and the discovery use case.
pub mod application;

/// Infrastructure layer: TCP channel, config file, report file.
pub mod infrastructure;

pub use application::channel::{Channel, ChannelError};
pub use application::run_discovery::{AgentError, DiscoveryDriver, DiscoveryReport, DriverConfig};
