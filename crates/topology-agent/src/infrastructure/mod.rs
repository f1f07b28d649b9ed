//! Infrastructure layer for the agent.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `topology_core`, but MUST NOT be imported by the application layer.
//!
//! - **`network`** – TCP implementation of the application's `Channel` port.
//! - **`storage`** – TOML configuration and the JSON report file.

pub mod network;
pub mod storage;
