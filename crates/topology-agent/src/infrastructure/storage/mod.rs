//! Storage infrastructure: configuration file and report file.
//!
//! - `config` reads (and writes) the TOML agent configuration.
//! - `report` writes the final topology as JSON when a report path is set.

pub mod config;
pub mod report;
