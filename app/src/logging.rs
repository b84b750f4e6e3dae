//! File logging. The terminal belongs to the TUI, so every event goes to the
//! log file under the config directory.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Overrides `log_filter` from the config file when set.
pub const LOG_ENV: &str = "DATALINK_LOG";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open log file at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid log filter `{filter}`: {source}")]
    Filter {
        filter: String,
        #[source]
        source: ParseError,
    },
    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

/// `DATALINK_LOG` wins over the configured default when it parses.
pub fn build_filter(default_filter: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }

    EnvFilter::try_new(default_filter).map_err(|source| LoggingError::Filter {
        filter: default_filter.to_string(),
        source,
    })
}

pub fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    if let Some(parent_dir) = path.parent() {
        fs::create_dir_all(parent_dir).map_err(|source| LoggingError::CreateDir {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::Open {
            path: path.to_path_buf(),
            source,
        })
}

pub fn init(log_path: &Path, default_filter: &str) -> Result<(), LoggingError> {
    let filter = build_filter(default_filter)?;
    let file = open_log_file(log_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|err| LoggingError::Init(err.to_string()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{build_filter, open_log_file, LoggingError};

    #[test]
    fn log_file_is_created_with_missing_parents() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("nested").join("datalink.log");

        open_log_file(&path).expect("open log file");
        assert!(path.exists());
    }

    #[test]
    fn configured_filter_is_validated() {
        assert!(build_filter("info,datalink_core=debug").is_ok());
        let err = build_filter("info,=[").expect_err("invalid filter");
        assert!(matches!(err, LoggingError::Filter { .. }));
    }
}
