pub mod demo_data;
pub mod export;
pub mod keyring_secrets;
pub mod simulated;

use std::sync::Arc;

use datalink_core::config::{AppConfig, PasswordStorage};
use datalink_core::connection_manager::ConnectionManager;
use datalink_core::profiles::{FileConnectionStore, ProfilesError};
use datalink_core::query_history::{FileQueryHistoryStore, QueryHistoryError};
use datalink_core::query_runner::QueryRunner;
use datalink_core::schema_cache::SchemaCacheService;
use datalink_core::secrets::{MemorySecretStore, SecretStore};
use datalink_core::session::Session;
use thiserror::Error;

use crate::keyring_secrets::KeyringSecretStore;
use crate::simulated::{CannedQueryBackend, DemoSchemaBackend, SimulatedConnectionBackend};

pub type SimulatedSession =
    Session<SimulatedConnectionBackend, CannedQueryBackend, DemoSchemaBackend>;

#[derive(Debug, Error)]
pub enum SessionBuildError {
    #[error(transparent)]
    Connections(#[from] ProfilesError),
    #[error(transparent)]
    History(#[from] QueryHistoryError),
}

#[must_use]
pub fn secret_store_for(config: &AppConfig) -> Arc<dyn SecretStore> {
    match config.password_storage {
        PasswordStorage::Keyring => Arc::new(KeyringSecretStore::default()),
        PasswordStorage::Memory => Arc::new(MemorySecretStore::new()),
    }
}

/// Opens the stores under the config directory and wires them to the
/// simulated backends described by `config.simulation`.
pub fn build_session(
    config: &AppConfig,
    secrets: Arc<dyn SecretStore>,
) -> Result<SimulatedSession, SessionBuildError> {
    let connections = FileConnectionStore::load_from_path(config.connections_path(), secrets)?;
    let history = FileQueryHistoryStore::load_from_path(config.history_path(), config.history_limit)?;
    let simulation = &config.simulation;

    Ok(Session::new(
        connections,
        history,
        ConnectionManager::new(SimulatedConnectionBackend::from_config(simulation)),
        QueryRunner::new(CannedQueryBackend::from_config(simulation)),
        SchemaCacheService::new(DemoSchemaBackend::from_config(simulation), config.schema_ttl()),
    )
    .with_recent_limit(config.recent_limit))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datalink_core::config::{AppConfig, SimulationConfig};
    use datalink_core::profiles::{ConnectionFields, DatabaseKind};
    use datalink_core::secrets::MemorySecretStore;
    use tempfile::TempDir;

    use super::build_session;

    #[tokio::test]
    async fn built_session_runs_against_demo_data() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let mut config = AppConfig::in_dir(temp_dir.path());
        config.simulation = SimulationConfig::instant();

        let mut session =
            build_session(&config, Arc::new(MemorySecretStore::new())).expect("build session");
        let profile = session
            .create_connection(&ConnectionFields {
                name: "analytics".to_string(),
                kind: DatabaseKind::Postgresql,
                host: "db.internal".to_string(),
                port: None,
                database: "analytics_db".to_string(),
                username: "analyst".to_string(),
                password: String::new(),
            })
            .expect("create connection");

        session.connect(profile.id).await.expect("connect");
        let executed = session
            .execute(profile.id, "SELECT * FROM orders")
            .await
            .expect("execute");
        assert_eq!(executed.row_count, 4);

        let catalog = session.schema(profile.id).await.expect("schema");
        assert_eq!(catalog.database_name, "analytics_db");
        assert!(config.connections_path().exists());
        assert!(config.history_path().exists());
    }
}
