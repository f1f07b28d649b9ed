//! Topology agent entry point.
//!
//! Connects to the proxy, runs one discovery session, and exits.
//!
//! # Usage
//!
//! ```text
//! topology-agent [OPTIONS]
//!
//! Options:
//!   --config <PATH>              TOML config file
//!   --proxy-host <HOST>          Proxy hostname or IP [default: 127.0.0.1]
//!   --proxy-port <PORT>          Proxy port [default: 12080]
//!   --read-timeout-secs <SECS>   Per-read deadline, 0 = none [default: 0]
//!   --close-wait-secs <SECS>     Wait for proxy EOF after the report [default: 2]
//!   --report <PATH>              Also write the topology to this JSON file
//!   --newline-delimited          Terminate outgoing messages with '\n'
//!   --skip-malformed             Skip undecodable frames instead of aborting
//!   --log-level <FILTER>         Log filter when RUST_LOG is unset [default: info]
//! ```
//!
//! Values are resolved as: command line / environment variable, then the
//! config file, then the built-in default.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ Cli::into_agent_config()   -- file + flag overrides
//!  └─ network::connect()         -- TCP stream to the proxy
//!  └─ DiscoveryDriver::run()     -- raced against Ctrl+C
//!  └─ report::write_report()     -- optional JSON file
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use topology_agent::application::run_discovery::DiscoveryDriver;
use topology_agent::infrastructure::network::connect;
use topology_agent::infrastructure::storage::config::{load_config, AgentConfig};
use topology_agent::infrastructure::storage::report::write_report;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Discovers the network topology reachable from this node through the proxy.
#[derive(Debug, Default, Parser)]
#[command(
    name = "topology-agent",
    about = "Discovers the peer topology through a coordinating proxy",
    version
)]
struct Cli {
    /// TOML configuration file.  Without it, built-in defaults apply.
    #[arg(long, env = "TOPOLOGY_AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Hostname or IP address of the proxy.
    #[arg(long, env = "TOPOLOGY_PROXY_HOST")]
    proxy_host: Option<String>,

    /// TCP port of the proxy.
    #[arg(long, env = "TOPOLOGY_PROXY_PORT")]
    proxy_port: Option<u16>,

    /// Abort if the proxy sends nothing for this many seconds.  `0` waits forever.
    #[arg(long, env = "TOPOLOGY_READ_TIMEOUT")]
    read_timeout_secs: Option<u64>,

    /// Seconds to wait for the proxy to close the connection after the report.
    #[arg(long, env = "TOPOLOGY_CLOSE_WAIT")]
    close_wait_secs: Option<u64>,

    /// Also write the discovered topology to this file as JSON.
    #[arg(long, env = "TOPOLOGY_REPORT")]
    report: Option<PathBuf>,

    /// Terminate each outgoing message with a newline.
    #[arg(long)]
    newline_delimited: bool,

    /// Log and skip undecodable frames instead of aborting.
    #[arg(long)]
    skip_malformed: bool,

    /// `tracing` filter used when `RUST_LOG` is not set.
    #[arg(long, env = "TOPOLOGY_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file (if any) and applies the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if `--config` names a file that cannot be read or parsed.
    fn into_agent_config(self) -> anyhow::Result<AgentConfig> {
        let config = match &self.config {
            Some(path) => load_config(Some(path))
                .with_context(|| format!("failed to load config from '{}'", path.display()))?,
            None => AgentConfig::default(),
        };
        Ok(self.apply_overrides(config))
    }

    fn apply_overrides(self, mut config: AgentConfig) -> AgentConfig {
        if let Some(host) = self.proxy_host {
            config.proxy.host = host;
        }
        if let Some(port) = self.proxy_port {
            config.proxy.port = port;
        }
        if let Some(secs) = self.read_timeout_secs {
            config.proxy.read_timeout_secs = secs;
        }
        if let Some(secs) = self.close_wait_secs {
            config.proxy.close_wait_secs = secs;
        }
        if let Some(path) = self.report {
            config.report.path = Some(path);
        }
        if self.newline_delimited {
            config.wire.newline_delimited = true;
        }
        if self.skip_malformed {
            config.discovery.skip_malformed = true;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
        config
    }
}

/// Installs the global `tracing` subscriber.  `RUST_LOG` takes precedence.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_agent_config()?;
    init_tracing(&config.log.level);

    let endpoint = config.endpoint();
    info!("topology agent starting; proxy={endpoint}");

    let channel = connect(&endpoint, config.framing())
        .await
        .with_context(|| format!("could not reach proxy at {endpoint}"))?;
    let driver = DiscoveryDriver::new(channel, config.driver_config());

    // Dropping the driver on Ctrl+C drops the channel and with it the socket.
    let report = tokio::select! {
        result = driver.run() => result.context("discovery failed")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            warn!("received Ctrl+C; abandoning discovery");
            anyhow::bail!("discovery interrupted");
        }
    };

    info!(
        "node {} discovered {} nodes with {} queries",
        report.node_id,
        report.topology.len(),
        report.stats.queries_sent
    );

    if let Some(path) = &config.report.path {
        write_report(path, &report)
            .with_context(|| format!("failed to write report to '{}'", path.display()))?;
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
