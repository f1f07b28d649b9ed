//! Domain logic for topology discovery.
//!
//! Nothing in here performs I/O.  Code in the agent's application layer
//! drives these types; they never call back into it.

/// Breadth-first discovery state machine.
///
/// See [`discovery::Discoverer`] for the main type.
pub mod discovery;
