//! Diagnostic logging setup.
//!
//! User-facing progress goes to stdout; the full diagnostic trail (every
//! external command, captured streams, warnings) is persisted to
//! `deployment/logs/deploy.log`. Filtering follows `KB_DEPLOY_LOG` when
//! set, else the `-v` count.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::error::DeployResult;

/// Environment variable overriding the log filter.
pub const LOG_ENV_VAR: &str = "KB_DEPLOY_LOG";

/// Name of the persisted log file inside the log directory.
pub const LOG_FILE: &str = "deploy.log";

/// Initialize file logging under `log_dir`.
///
/// Safe to call more than once; only the first initialization wins, so
/// tests can set up their own subscribers.
pub fn init(log_dir: &Path, verbose: u8) -> DeployResult<()> {
    std::fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE))?;

    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .try_init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_creates_log_dir_and_file() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("deployment/logs");

        init(&log_dir, 0).unwrap();

        assert!(log_dir.join(LOG_FILE).exists());
    }

    #[test]
    fn init_twice_is_harmless() {
        let dir = tempdir().unwrap();
        init(dir.path(), 0).unwrap();
        init(dir.path(), 2).unwrap();
    }
}
