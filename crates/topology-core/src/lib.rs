//! # topology-core
//!
//! Shared library for the topology discovery agent: the wire message type,
//! the stream framer that recovers messages from a chunked TCP stream, and
//! the breadth-first discovery state machine.
//!
//! This crate has no dependency on sockets or an async runtime.
//!
//! # Architecture overview
//!
//! Every node in a network runs one agent.  A proxy assigns the node an id,
//! answers neighbor queries on behalf of the other nodes, and finally
//! receives the node's view of the whole graph.
//!
//! - **`protocol`** – How bytes travel between agent and proxy.  Messages
//!   are bare JSON objects written back to back; the [`Framer`] splits the
//!   stream back into whole messages no matter how reads fragment it.
//!
//! - **`domain`** – Pure discovery logic.  The [`Discoverer`] consumes
//!   decoded messages and returns the queries (and finally the report) to
//!   send, so the whole BFS can be tested without a network.

pub mod domain;
pub mod protocol;

pub use domain::discovery::{
    Discoverer, DiscoveryError, DiscoveryState, DiscoveryStats, ReplyMatch,
};
pub use protocol::codec::{decode_frame, encode_message, FrameError, WireFraming};
pub use protocol::framer::{Framer, DEFAULT_MAX_FRAME_LEN};
pub use protocol::messages::{Message, MessageType, Topology};
pub use protocol::msg_id::{MessageIdSource, SequentialIds, UuidIds};
