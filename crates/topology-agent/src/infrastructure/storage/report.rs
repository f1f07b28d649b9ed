//! Writes the final discovery report to a local JSON file.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::application::run_discovery::DiscoveryReport;

/// Error type for report file output.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error writing report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Writes `report` to `path` as pretty-printed JSON.
///
/// Parent directories are created if missing and an existing file is
/// replaced.
///
/// # Errors
///
/// Returns [`ReportError::Io`] for file-system failures.
pub fn write_report(path: &Path, report: &DiscoveryReport) -> Result<(), ReportError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let mut content = serde_json::to_vec_pretty(report)?;
    content.push(b'\n');
    std::fs::write(path, content).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("wrote topology report to {}", path.display());
    Ok(())
}
