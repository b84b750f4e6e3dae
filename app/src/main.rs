mod logging;

use datalink_adapters::{build_session, secret_store_for, SessionBuildError, SimulatedSession};
use datalink_core::config::{AppConfig, ConfigError};
use datalink_tui::{TuiError, TuiOptions};
use thiserror::Error;
use tracing::{error, info};

use crate::logging::LoggingError;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Session(#[from] SessionBuildError),
    #[error(transparent)]
    Tui(#[from] TuiError),
}

fn tui_options(config: &AppConfig) -> TuiOptions {
    TuiOptions {
        preview_limit: config.preview_limit,
        export_dir: config.export_dir(),
    }
}

fn run_app(
    config: &AppConfig,
    run_tui: impl FnOnce(SimulatedSession, TuiOptions) -> Result<(), TuiError>,
) -> Result<(), AppError> {
    let session = build_session(config, secret_store_for(config))?;
    info!(
        config_dir = %config.config_dir().display(),
        connections = session.connections().len(),
        "session ready"
    );

    run_tui(session, tui_options(config)).map_err(|err| {
        error!(%err, "terminal ui failed");
        AppError::from(err)
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_default().map_err(AppError::from)?;
    logging::init(&config.log_path(), &config.log_filter).map_err(AppError::from)?;
    run_app(&config, datalink_tui::run)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;

    use datalink_core::config::{AppConfig, PasswordStorage, SimulationConfig};
    use tempfile::TempDir;

    use super::{run_app, AppError};

    fn config(temp_dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::in_dir(temp_dir.path());
        config.password_storage = PasswordStorage::Memory;
        config.simulation = SimulationConfig::instant();
        config
    }

    #[test]
    fn run_app_hands_the_session_to_the_tui() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let config = config(&temp_dir);

        let result = run_app(&config, |session, options| {
            assert!(session.connections().is_empty());
            assert_eq!(options.preview_limit, 10);
            assert_eq!(options.export_dir, temp_dir.path().join("exports"));
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn run_app_propagates_tui_errors() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let config = config(&temp_dir);

        let result = run_app(&config, |_, _| {
            Err(datalink_tui::TuiError::Io(io::Error::other("boom")))
        });
        assert!(matches!(result, Err(AppError::Tui(_))));
    }

    #[test]
    fn corrupt_connections_file_stops_startup() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let config = config(&temp_dir);
        std::fs::write(config.connections_path(), "connections = 7").expect("write connections");

        let result = run_app(&config, |_, _| Ok(()));
        assert!(matches!(result, Err(AppError::Session(_))));
    }
}
