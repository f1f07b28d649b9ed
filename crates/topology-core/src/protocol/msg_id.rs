//! Sources of `msg_id` tokens for outgoing messages.
//!
//! Every message the agent sends carries a fresh `msg_id`.  Production code
//! uses random UUID v4 strings; tests use [`SequentialIds`] so the exact
//! bytes written to the wire are predictable.

use uuid::Uuid;

/// Produces unique `msg_id` values.
pub trait MessageIdSource: Send {
    /// Returns a token not returned before by this source.
    fn next_id(&mut self) -> String;
}

/// Random UUID v4 ids, e.g. `"67e55044-10b1-426f-9247-bb680e5fe0c8"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl MessageIdSource for UuidIds {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic ids: `"{prefix}0"`, `"{prefix}1"`, ...
///
/// The counter wraps at `u64::MAX` instead of panicking.
///
/// # Examples
///
/// ```rust
/// use topology_core::protocol::{MessageIdSource, SequentialIds};
///
/// let mut ids = SequentialIds::new("q");
/// assert_eq!(ids.next_id(), "q0");
/// assert_eq!(ids.next_id(), "q1");
/// ```
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    /// The number that the next id will carry.
    pub fn current(&self) -> u64 {
        self.next
    }
}

impl MessageIdSource for SequentialIds {
    fn next_id(&mut self) -> String {
        let n = self.next;
        self.next = self.next.wrapping_add(1);
        format!("{}{}", self.prefix, n)
    }
}

impl<T: MessageIdSource + ?Sized> MessageIdSource for Box<T> {
    fn next_id(&mut self) -> String {
        (**self).next_id()
    }
}
