use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fault::{FaultInjector, Latency};
use crate::query_history::{DEFAULT_HISTORY_LIMIT, DEFAULT_RECENT_LIMIT};
use crate::sql_generator::DEFAULT_PREVIEW_LIMIT;

pub const CONFIG_DIR_ENV: &str = "DATALINK_CONFIG_DIR";
const APP_DIR_NAME: &str = "datalink";
const CONFIG_FILE_NAME: &str = "config.toml";
const CONNECTIONS_FILE_NAME: &str = "connections.toml";
const HISTORY_FILE_NAME: &str = "history.toml";
const LOG_FILE_NAME: &str = "datalink.log";
const EXPORT_DIR_NAME: &str = "exports";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStorage {
    #[default]
    Keyring,
    Memory,
}

/// Delays and failure rates of the simulated database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub connect_latency_ms: u64,
    pub test_latency_ms: u64,
    pub disconnect_latency_ms: u64,
    pub schema_latency_ms: u64,
    pub details_latency_ms: u64,
    pub query_latency_min_ms: u64,
    pub query_latency_max_ms: u64,
    pub connect_failure_rate: f64,
    pub test_failure_rate: f64,
    pub query_failure_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            connect_latency_ms: 1000,
            test_latency_ms: 1500,
            disconnect_latency_ms: 500,
            schema_latency_ms: 500,
            details_latency_ms: 300,
            query_latency_min_ms: 500,
            query_latency_max_ms: 2000,
            connect_failure_rate: 0.15,
            test_failure_rate: 0.2,
            query_failure_rate: 0.1,
        }
    }
}

impl SimulationConfig {
    /// No delays and no injected failures.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            connect_latency_ms: 0,
            test_latency_ms: 0,
            disconnect_latency_ms: 0,
            schema_latency_ms: 0,
            details_latency_ms: 0,
            query_latency_min_ms: 0,
            query_latency_max_ms: 0,
            connect_failure_rate: 0.0,
            test_failure_rate: 0.0,
            query_failure_rate: 0.0,
        }
    }

    #[must_use]
    pub fn connect_latency(&self) -> Latency {
        Latency::from_millis(self.connect_latency_ms)
    }

    #[must_use]
    pub fn test_latency(&self) -> Latency {
        Latency::from_millis(self.test_latency_ms)
    }

    #[must_use]
    pub fn disconnect_latency(&self) -> Latency {
        Latency::from_millis(self.disconnect_latency_ms)
    }

    #[must_use]
    pub fn schema_latency(&self) -> Latency {
        Latency::from_millis(self.schema_latency_ms)
    }

    #[must_use]
    pub fn details_latency(&self) -> Latency {
        Latency::from_millis(self.details_latency_ms)
    }

    #[must_use]
    pub fn query_latency(&self) -> Latency {
        Latency::between_millis(self.query_latency_min_ms, self.query_latency_max_ms)
    }

    #[must_use]
    pub fn connect_faults(&self) -> FaultInjector {
        rate_injector(self.connect_failure_rate)
    }

    #[must_use]
    pub fn test_faults(&self) -> FaultInjector {
        rate_injector(self.test_failure_rate)
    }

    #[must_use]
    pub fn query_faults(&self) -> FaultInjector {
        rate_injector(self.query_failure_rate)
    }
}

fn rate_injector(rate: f64) -> FaultInjector {
    if rate <= 0.0 || rate.is_nan() {
        FaultInjector::Never
    } else if rate >= 1.0 {
        FaultInjector::Always
    } else {
        FaultInjector::Rate(rate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub history_limit: usize,
    pub recent_limit: usize,
    pub schema_ttl_secs: u64,
    pub preview_limit: usize,
    pub log_filter: String,
    pub password_storage: PasswordStorage,
    /// Where result exports land; `exports/` under the config dir when unset.
    pub export_dir: Option<PathBuf>,
    pub simulation: SimulationConfig,
    #[serde(skip)]
    config_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            recent_limit: DEFAULT_RECENT_LIMIT,
            schema_ttl_secs: 300,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            log_filter: "info".to_string(),
            password_storage: PasswordStorage::default(),
            export_dir: None,
            simulation: SimulationConfig::default(),
            config_dir: PathBuf::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl AppConfig {
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_from_dir(default_config_dir()?)
    }

    /// Reads `config.toml` from `dir`; a missing or blank file yields defaults.
    pub fn load_from_dir(dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_dir = dir.into();
        let path = config_dir.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            if raw.trim().is_empty() {
                Self::default()
            } else {
                toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            Self::default()
        };

        config.config_dir = config_dir;
        Ok(config)
    }

    /// Defaults rooted at `dir`, without reading anything.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: dir.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    #[must_use]
    pub fn connections_path(&self) -> PathBuf {
        self.config_dir.join(CONNECTIONS_FILE_NAME)
    }

    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.config_dir.join(HISTORY_FILE_NAME)
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.config_dir.join(LOG_FILE_NAME)
    }

    #[must_use]
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| self.config_dir.join(EXPORT_DIR_NAME))
    }

    #[must_use]
    pub fn schema_ttl(&self) -> Duration {
        Duration::from_secs(self.schema_ttl_secs)
    }
}

pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(custom) = env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(custom));
    }

    let base_dir = if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(ConfigError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(ConfigError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join(APP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, PasswordStorage};
    use crate::fault::{FaultInjector, Latency};

    #[test]
    fn missing_config_file_yields_defaults_rooted_in_dir() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");

        let config = AppConfig::load_from_dir(temp_dir.path()).expect("load config");
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.recent_limit, 10);
        assert_eq!(config.preview_limit, 10);
        assert_eq!(config.schema_ttl(), Duration::from_secs(300));
        assert_eq!(config.password_storage, PasswordStorage::Keyring);
        assert_eq!(config.connections_path(), temp_dir.path().join("connections.toml"));
        assert_eq!(config.history_path(), temp_dir.path().join("history.toml"));
        assert_eq!(config.export_dir(), temp_dir.path().join("exports"));
        assert_eq!(
            config.simulation.query_latency(),
            Latency::between_millis(500, 2000)
        );
        assert!(matches!(
            config.simulation.connect_faults(),
            FaultInjector::Rate(rate) if (rate - 0.15).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        std::fs::write(
            temp_dir.path().join("config.toml"),
            "history_limit = 25\npassword_storage = \"memory\"\nexport_dir = \"/srv/exports\"\n\n[simulation]\nquery_failure_rate = 0.0\nquery_latency_max_ms = 0\nquery_latency_min_ms = 0\n",
        )
        .expect("write config");

        let config = AppConfig::load_from_dir(temp_dir.path()).expect("load config");
        assert_eq!(config.history_limit, 25);
        assert_eq!(config.recent_limit, 10);
        assert_eq!(config.password_storage, PasswordStorage::Memory);
        assert_eq!(config.export_dir(), std::path::PathBuf::from("/srv/exports"));
        assert!(matches!(config.simulation.query_faults(), FaultInjector::Never));
        assert_eq!(config.simulation.query_latency(), Latency::None);
        assert_eq!(config.simulation.connect_latency_ms, 1000);
    }

    #[test]
    fn malformed_config_reports_parse_error() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        std::fs::write(temp_dir.path().join("config.toml"), "history_limit = \"many\"")
            .expect("write config");

        let err = AppConfig::load_from_dir(temp_dir.path()).expect_err("parse should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
