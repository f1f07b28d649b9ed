//! Application layer use cases for the agent.
//!
//! - **`channel`** – The `Channel` port: send a message, receive a raw chunk,
//!   close.  Implemented in the infrastructure layer.
//! - **`run_discovery`** – Sequences one discovery session: handshake, BFS,
//!   final report, and releasing the channel.

pub mod channel;
pub mod run_discovery;
