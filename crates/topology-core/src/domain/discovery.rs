//! Breadth-first topology discovery state machine.
//!
//! The [`Discoverer`] never touches a socket.  It is fed decoded
//! [`Message`]s and answers with the messages that should be sent next,
//! which keeps the whole BFS testable without a network.
//!
//! ```text
//!  AwaitingInit ──init──▶ Exploring ──frontier empty──▶ Finalizing ──finalize()──▶ Done
//!                            │  ▲
//!                            └──┘ query reply: record neighbors, query unvisited ones
//! ```
//!
//! # Reply correlation
//!
//! The protocol does not promise that replies arrive in the order the queries
//! were sent.  Every outstanding query is tracked together with its `msg_id`
//! and addressed node, and a reply is matched against them in this order:
//!
//! 1. a reply whose `msg_id` equals an outstanding query's `msg_id`;
//! 2. a reply whose `sender_id` equals an outstanding query's addressed node;
//! 3. otherwise the oldest outstanding query (arrival-order fallback).

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::protocol::messages::{Message, MessageType, Topology};
use crate::protocol::msg_id::{MessageIdSource, UuidIds};

/// Lifecycle of one discovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    /// Waiting for the proxy to assign this node's id.
    AwaitingInit,
    /// Queries are outstanding.
    Exploring,
    /// Every reachable node has reported; the report is ready to build.
    Finalizing,
    /// The report has been produced.  Terminal.
    Done,
}

/// Errors raised by the state machine.
#[derive(Debug, Error, PartialEq)]
pub enum DiscoveryError {
    /// The `init` message did not carry a node id.
    #[error("init message from {sender:?} assigned an empty node id")]
    EmptyNodeId { sender: String },

    /// Input arrived after the session finished.
    #[error("discovery session is finished; refusing {0} message")]
    SessionFinished(MessageType),

    /// `finalize` was called while queries were still outstanding (or before init).
    #[error("cannot finalize discovery in state {0:?}")]
    NotReadyToFinalize(DiscoveryState),
}

/// How a reply was matched to its outstanding query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMatch {
    MsgId,
    Sender,
    Oldest,
}

/// Counters describing a session so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryStats {
    pub queries_sent: usize,
    pub replies_processed: usize,
    pub matched_by_msg_id: usize,
    pub matched_by_sender: usize,
    pub matched_by_order: usize,
    /// Messages that did not apply to the current state.
    pub ignored: usize,
}

/// A query that has been sent but not yet answered.
#[derive(Debug, Clone)]
struct PendingQuery {
    node: String,
    msg_id: String,
}

/// BFS discovery over a graph revealed one neighbor list at a time.
pub struct Discoverer {
    state: DiscoveryState,
    node_id: Option<String>,
    /// Frontier queue: outstanding queries in send order.
    frontier: VecDeque<PendingQuery>,
    visited: HashSet<String>,
    topology: Topology,
    ids: Box<dyn MessageIdSource>,
    stats: DiscoveryStats,
}

impl Discoverer {
    /// Creates a discoverer that stamps outgoing messages with UUID v4 ids.
    pub fn new() -> Self {
        Self::with_id_source(UuidIds)
    }

    /// Creates a discoverer with a custom `msg_id` source.
    pub fn with_id_source(ids: impl MessageIdSource + 'static) -> Self {
        Self {
            state: DiscoveryState::AwaitingInit,
            node_id: None,
            frontier: VecDeque::new(),
            visited: HashSet::new(),
            topology: Topology::new(),
            ids: Box::new(ids),
            stats: DiscoveryStats::default(),
        }
    }

    /// Feeds one inbound message and returns the messages to send in response.
    ///
    /// # Errors
    ///
    /// - [`DiscoveryError::EmptyNodeId`] if `init` carries no node id.
    /// - [`DiscoveryError::SessionFinished`] once the session is [`DiscoveryState::Done`].
    pub fn handle(&mut self, msg: Message) -> Result<Vec<Message>, DiscoveryError> {
        match self.state {
            DiscoveryState::AwaitingInit => {
                if msg.kind != MessageType::Init {
                    debug!("ignoring {} message while awaiting init", msg.kind);
                    self.stats.ignored += 1;
                    return Ok(Vec::new());
                }
                if msg.receiver_id.is_empty() {
                    return Err(DiscoveryError::EmptyNodeId {
                        sender: msg.sender_id,
                    });
                }
                Ok(vec![self.begin_exploring(msg.receiver_id)])
            }
            DiscoveryState::Exploring => {
                if msg.kind != MessageType::Query {
                    warn!(
                        "ignoring {} message from {:?} during exploration",
                        msg.kind, msg.sender_id
                    );
                    self.stats.ignored += 1;
                    return Ok(Vec::new());
                }
                Ok(self.record_reply(msg))
            }
            DiscoveryState::Finalizing => {
                debug!(
                    "ignoring {} message from {:?}: no queries outstanding",
                    msg.kind, msg.sender_id
                );
                self.stats.ignored += 1;
                Ok(Vec::new())
            }
            DiscoveryState::Done => Err(DiscoveryError::SessionFinished(msg.kind)),
        }
    }

    /// Builds the final report and moves to [`DiscoveryState::Done`].
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotReadyToFinalize`] unless the state is
    /// [`DiscoveryState::Finalizing`].
    pub fn finalize(&mut self) -> Result<Message, DiscoveryError> {
        if self.state != DiscoveryState::Finalizing {
            return Err(DiscoveryError::NotReadyToFinalize(self.state));
        }
        let node_id = self.node_id.clone().unwrap_or_default();
        let report = Message::topology_report(node_id, self.ids.next_id(), self.topology.clone());
        self.state = DiscoveryState::Done;
        info!(
            "topology complete: {} nodes, {} queries",
            self.topology.len(),
            self.stats.queries_sent
        );
        Ok(report)
    }

    /// Entry action of `Exploring`: visit ourselves and query our own neighbors.
    fn begin_exploring(&mut self, node_id: String) -> Message {
        info!("assigned node id {node_id:?}; starting discovery");
        self.visited.insert(node_id.clone());
        self.node_id = Some(node_id.clone());
        self.state = DiscoveryState::Exploring;
        self.enqueue(node_id.clone(), node_id)
    }

    /// Marks `target` as outstanding and builds the query addressed to it.
    fn enqueue(&mut self, own_id: String, target: String) -> Message {
        let msg_id = self.ids.next_id();
        self.frontier.push_back(PendingQuery {
            node: target.clone(),
            msg_id: msg_id.clone(),
        });
        self.stats.queries_sent += 1;
        Message::query(own_id, target, msg_id)
    }

    fn record_reply(&mut self, reply: Message) -> Vec<Message> {
        let (index, how) = self.correlate(&reply);
        let Some(pending) = self.frontier.remove(index) else {
            return Vec::new();
        };
        match how {
            ReplyMatch::MsgId => self.stats.matched_by_msg_id += 1,
            ReplyMatch::Sender => self.stats.matched_by_sender += 1,
            ReplyMatch::Oldest => self.stats.matched_by_order += 1,
        }
        self.stats.replies_processed += 1;
        debug!(
            "node {:?} reported {} neighbors (matched by {:?})",
            pending.node,
            reply.neighbors.len(),
            how
        );

        let own_id = self.node_id.clone().unwrap_or_default();
        let mut outgoing = Vec::new();
        for neighbor in &reply.neighbors {
            if neighbor.is_empty() {
                warn!("node {:?} listed an empty neighbor id; skipping", pending.node);
                continue;
            }
            if self.visited.insert(neighbor.clone()) {
                outgoing.push(self.enqueue(own_id.clone(), neighbor.clone()));
            }
        }
        self.topology.insert(pending.node, reply.neighbors);

        if self.frontier.is_empty() {
            debug!("frontier exhausted after {} replies", self.stats.replies_processed);
            self.state = DiscoveryState::Finalizing;
        }
        outgoing
    }

    /// Picks the outstanding query a reply answers.  Requires a non-empty frontier.
    fn correlate(&self, reply: &Message) -> (usize, ReplyMatch) {
        if !reply.msg_id.is_empty() {
            if let Some(i) = self.frontier.iter().position(|p| p.msg_id == reply.msg_id) {
                return (i, ReplyMatch::MsgId);
            }
        }
        if !reply.sender_id.is_empty() {
            if let Some(i) = self.frontier.iter().position(|p| p.node == reply.sender_id) {
                return (i, ReplyMatch::Sender);
            }
        }
        (0, ReplyMatch::Oldest)
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// This node's id, once `init` has been received.
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    /// The topology discovered so far.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Number of distinct nodes ever enqueued (including this node).
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Addressed node ids of queries still awaiting a reply, oldest first.
    pub fn outstanding(&self) -> impl Iterator<Item = &str> {
        self.frontier.iter().map(|p| p.node.as_str())
    }

    pub fn stats(&self) -> DiscoveryStats {
        self.stats
    }

    /// Returns `true` when the report is ready to be built.
    pub fn is_finalizing(&self) -> bool {
        self.state == DiscoveryState::Finalizing
    }

    pub fn is_done(&self) -> bool {
        self.state == DiscoveryState::Done
    }
}

impl Default for Discoverer {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
