//! TOML-based configuration for the agent.
//!
//! Every field has a `#[serde(default = ...)]` helper, so an empty file, a
//! partial file, and no file at all are all valid:
//!
//! ```toml
//! [proxy]
//! host = "127.0.0.1"
//! port = 12080
//! read_timeout_secs = 0      # 0 = block indefinitely
//! close_wait_secs = 2
//!
//! [wire]
//! newline_delimited = false
//! max_frame_bytes = 16777216
//!
//! [discovery]
//! skip_malformed = false
//!
//! [log]
//! level = "info"
//!
//! [report]
//! path = "topology.json"
//! ```
//!
//! Command-line flags are applied on top of the loaded values by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use topology_core::{WireFraming, DEFAULT_MAX_FRAME_LEN};

use crate::application::run_discovery::DriverConfig;
use crate::infrastructure::network::ProxyEndpoint;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub wire: WireConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Where the proxy lives and how patiently to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-read deadline in seconds.  `0` blocks indefinitely.
    #[serde(default)]
    pub read_timeout_secs: u64,
    /// Seconds to wait for the proxy to hang up after the report.
    #[serde(default = "default_close_wait_secs")]
    pub close_wait_secs: u64,
}

/// Wire format options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireConfig {
    /// Terminate each outgoing message with `\n`.
    #[serde(default)]
    pub newline_delimited: bool,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    /// Log and skip undecodable frames instead of aborting.
    #[serde(default)]
    pub skip_malformed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"topology_core=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportConfig {
    /// Also write the final topology to this file as pretty JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    12080
}
fn default_close_wait_secs() -> u64 {
    2
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_LEN
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            read_timeout_secs: 0,
            close_wait_secs: default_close_wait_secs(),
        }
    }
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            newline_delimited: false,
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl AgentConfig {
    pub fn endpoint(&self) -> ProxyEndpoint {
        ProxyEndpoint::new(self.proxy.host.clone(), self.proxy.port)
    }

    pub fn framing(&self) -> WireFraming {
        if self.wire.newline_delimited {
            WireFraming::Newline
        } else {
            WireFraming::Concatenated
        }
    }

    /// Builds the driver options described by this config.
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            read_timeout: match self.proxy.read_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            close_wait: Duration::from_secs(self.proxy.close_wait_secs),
            skip_malformed: self.discovery.skip_malformed,
            max_frame_len: self.wire.max_frame_bytes,
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads the config from `path`, or returns the defaults when `path` is `None`.
///
/// A path that was given explicitly must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(AgentConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AgentConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
