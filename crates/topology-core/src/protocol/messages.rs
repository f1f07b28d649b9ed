//! Wire message type shared by every participant in a discovery session.
//!
//! Unlike a protocol with one struct per message kind, the proxy speaks a
//! single flat JSON object whose `"type"` field says which of the optional
//! fields are meaningful:
//!
//! ```json
//! {"sender_id":"proxy","receiver_id":"A","msg_id":"m1","type":"init"}
//! {"sender_id":"A","receiver_id":"B","msg_id":"m2","type":"query"}
//! {"sender_id":"B","receiver_id":"A","msg_id":"m3","type":"query","n":["C","D"]}
//! {"sender_id":"A","receiver_id":"","msg_id":"m4","type":"topology","topology":{"A":["B"]}}
//! ```
//!
//! # Tolerance rules
//!
//! - Missing fields decode as empty values.
//! - An explicit `null` for `n` or `topology` decodes as empty.  Some peers
//!   serialize absent collections as `null` rather than omitting them.
//! - An unrecognised `type` decodes as [`MessageType::Unknown`] instead of
//!   failing the whole frame.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Accumulated node-id → neighbor-list mapping.
///
/// A `BTreeMap` keeps the final report deterministic: entries are always
/// serialized in node-id order.
pub type Topology = BTreeMap<String, Vec<String>>;

/// Discriminant carried in the `"type"` field of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Sent once by the proxy; `receiver_id` is the id assigned to this node.
    Init,
    /// A neighbor query, or the reply to one (replies carry `n`).
    Query,
    /// The final topology report sent to the proxy.
    Topology,
    /// Any `type` value this agent does not understand.
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// Returns the wire spelling of this message type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Init => "init",
            MessageType::Query => "query",
            MessageType::Topology => "topology",
            MessageType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single protocol message as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Id of the participant that produced the message.
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender_id: String,

    /// Id of the addressed participant.  Empty for the final report.
    #[serde(default, deserialize_with = "null_as_default")]
    pub receiver_id: String,

    /// Per-message token.  Replies that echo it are correlated by it.
    #[serde(default, deserialize_with = "null_as_default")]
    pub msg_id: String,

    #[serde(rename = "type")]
    pub kind: MessageType,

    /// Neighbor list carried by a query reply.
    #[serde(
        rename = "n",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub neighbors: Vec<String>,

    /// Discovered graph carried by the final report.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub topology: Topology,
}

impl Message {
    /// Builds a `query` addressed to `receiver_id`.
    pub fn query(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        msg_id: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            msg_id: msg_id.into(),
            kind: MessageType::Query,
            neighbors: Vec::new(),
            topology: Topology::new(),
        }
    }

    /// Builds the final `topology` report.  The receiver is always `""`.
    pub fn topology_report(
        sender_id: impl Into<String>,
        msg_id: impl Into<String>,
        topology: Topology,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: String::new(),
            msg_id: msg_id.into(),
            kind: MessageType::Topology,
            neighbors: Vec::new(),
            topology,
        }
    }

    /// Builds an `init` message assigning `node_id` to the receiver.
    ///
    /// Agents never send this; it exists for stub proxies and tests.
    pub fn init(
        sender_id: impl Into<String>,
        node_id: impl Into<String>,
        msg_id: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: node_id.into(),
            msg_id: msg_id.into(),
            kind: MessageType::Init,
            neighbors: Vec::new(),
            topology: Topology::new(),
        }
    }

    /// Builds a query reply carrying `neighbors`.
    ///
    /// Agents never send this; it exists for stub proxies and tests.
    pub fn neighbors_reply(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        msg_id: impl Into<String>,
        neighbors: Vec<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            msg_id: msg_id.into(),
            kind: MessageType::Query,
            neighbors,
            topology: Topology::new(),
        }
    }
}

/// Deserializes `null` (or an absent field, via `#[serde(default)]`) as `T::default()`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
