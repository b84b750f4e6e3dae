use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use datalink_adapters::export::{export_to_dir, ExportFormat, ExportSummary};
use datalink_adapters::SimulatedSession;
use datalink_core::connection_manager::ConnectionTestReport;
use datalink_core::profiles::{ConnectionFields, ConnectionProfile};
use datalink_core::query_history::QueryRecord;
use datalink_core::query_runner::ExecutedQuery;
use datalink_core::result_set::TabularResult;
use datalink_core::schema_cache::{SchemaCatalog, SchemaSearchResults, TableDetails};
use datalink_core::session::SessionError;
use tokio::sync::Mutex;

/// Kinds of background work; at most one of each runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BusyKind {
    SaveConnection,
    DeleteConnection,
    TestConnection,
    Connect,
    Disconnect,
    Execute,
    History,
    Schema,
    TableDetails,
    Search,
    Export,
}

impl BusyKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::SaveConnection => "Saving connection",
            Self::DeleteConnection => "Deleting connection",
            Self::TestConnection => "Testing connection",
            Self::Connect => "Connecting",
            Self::Disconnect => "Disconnecting",
            Self::Execute => "Running query",
            Self::History => "Updating history",
            Self::Schema => "Loading schema",
            Self::TableDetails => "Loading table details",
            Self::Search => "Searching schema",
            Self::Export => "Exporting results",
        }
    }
}

/// Work that needs the session lock.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SaveConnection {
        id: Option<u64>,
        fields: ConnectionFields,
    },
    DeleteConnection(u64),
    TestConnection(ConnectionFields),
    Connect(u64),
    Disconnect,
    Execute {
        connection_id: u64,
        sql: String,
    },
    ToggleFavorite(u64),
    DeleteQuery(u64),
    LoadSchema {
        connection_id: u64,
        refresh: bool,
    },
    LoadTableDetails {
        connection_id: u64,
        table: String,
    },
    SearchSchema {
        connection_id: u64,
        term: String,
    },
}

/// A snapshot of the result grid in its displayed order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub result: Arc<TabularResult>,
    pub order: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Session(SessionCommand),
    Export(ExportRequest),
}

impl Command {
    #[must_use]
    pub fn kind(&self) -> BusyKind {
        match self {
            Self::Session(command) => match command {
                SessionCommand::SaveConnection { .. } => BusyKind::SaveConnection,
                SessionCommand::DeleteConnection(_) => BusyKind::DeleteConnection,
                SessionCommand::TestConnection(_) => BusyKind::TestConnection,
                SessionCommand::Connect(_) => BusyKind::Connect,
                SessionCommand::Disconnect => BusyKind::Disconnect,
                SessionCommand::Execute { .. } => BusyKind::Execute,
                SessionCommand::ToggleFavorite(_) | SessionCommand::DeleteQuery(_) => {
                    BusyKind::History
                }
                SessionCommand::LoadSchema { .. } => BusyKind::Schema,
                SessionCommand::LoadTableDetails { .. } => BusyKind::TableDetails,
                SessionCommand::SearchSchema { .. } => BusyKind::Search,
            },
            Self::Export(_) => BusyKind::Export,
        }
    }
}

impl From<SessionCommand> for Command {
    fn from(command: SessionCommand) -> Self {
        Self::Session(command)
    }
}

impl From<ExportRequest> for Command {
    fn from(request: ExportRequest) -> Self {
        Self::Export(request)
    }
}

/// Copy of the session data the screens list, taken after each action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub connections: Vec<ConnectionProfile>,
    pub active: Option<ConnectionProfile>,
    pub recent: Vec<QueryRecord>,
    pub favorites: Vec<QueryRecord>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn capture(session: &SimulatedSession) -> Self {
        Self {
            connections: session.connections().to_vec(),
            active: session.active_connection().cloned(),
            recent: session.recent_queries(None).to_vec(),
            favorites: session.favorite_queries().into_iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ActionOutput {
    ConnectionSaved(ConnectionProfile),
    ConnectionDeleted(ConnectionProfile),
    ConnectionTested(ConnectionTestReport),
    Connected(ConnectionProfile),
    Disconnected,
    Executed(ExecutedQuery),
    HistoryUpdated(QueryRecord),
    SchemaLoaded {
        connection_id: u64,
        catalog: Arc<SchemaCatalog>,
        refreshed: bool,
    },
    TableDetailsLoaded {
        connection_id: u64,
        details: TableDetails,
    },
    SearchCompleted {
        connection_id: u64,
        results: SchemaSearchResults,
    },
    Exported(ExportSummary),
}

#[derive(Debug)]
pub struct Outcome {
    pub kind: BusyKind,
    pub result: Result<ActionOutput, String>,
    pub snapshot: Option<SessionSnapshot>,
}

/// Runs one command to completion. Session commands hold the session lock
/// for their whole duration, so overlapping commands run one after another.
pub async fn perform(session: &Mutex<SimulatedSession>, command: Command, export_dir: &Path) -> Outcome {
    let kind = command.kind();
    match command {
        Command::Export(request) => Outcome {
            kind,
            result: export_to_dir(
                export_dir,
                request.format,
                &request.result,
                &request.order,
                Utc::now(),
            )
            .map(ActionOutput::Exported)
            .map_err(|err| err.to_string()),
            snapshot: None,
        },
        Command::Session(command) => {
            let mut session = session.lock().await;
            let result = run_session_command(&mut session, command)
                .await
                .map_err(|err| err.to_string());
            Outcome {
                kind,
                result,
                snapshot: Some(SessionSnapshot::capture(&session)),
            }
        }
    }
}

async fn run_session_command(
    session: &mut SimulatedSession,
    command: SessionCommand,
) -> Result<ActionOutput, SessionError> {
    let output = match command {
        SessionCommand::SaveConnection { id: None, fields } => {
            ActionOutput::ConnectionSaved(session.create_connection(&fields)?)
        }
        SessionCommand::SaveConnection {
            id: Some(id),
            fields,
        } => ActionOutput::ConnectionSaved(session.update_connection(id, &fields)?),
        SessionCommand::DeleteConnection(id) => {
            ActionOutput::ConnectionDeleted(session.delete_connection(id).await?)
        }
        SessionCommand::TestConnection(fields) => {
            ActionOutput::ConnectionTested(session.test_connection(&fields).await?)
        }
        SessionCommand::Connect(id) => ActionOutput::Connected(session.connect(id).await?),
        SessionCommand::Disconnect => {
            session.disconnect().await?;
            ActionOutput::Disconnected
        }
        SessionCommand::Execute { connection_id, sql } => {
            ActionOutput::Executed(session.execute(connection_id, &sql).await?)
        }
        SessionCommand::ToggleFavorite(id) => {
            ActionOutput::HistoryUpdated(session.toggle_favorite(id)?)
        }
        SessionCommand::DeleteQuery(id) => ActionOutput::HistoryUpdated(session.delete_query(id)?),
        SessionCommand::LoadSchema {
            connection_id,
            refresh,
        } => {
            let catalog = if refresh {
                session.refresh_schema(connection_id).await?
            } else {
                session.schema(connection_id).await?
            };
            ActionOutput::SchemaLoaded {
                connection_id,
                catalog,
                refreshed: refresh,
            }
        }
        SessionCommand::LoadTableDetails {
            connection_id,
            table,
        } => ActionOutput::TableDetailsLoaded {
            connection_id,
            details: session.table_details(connection_id, &table).await?,
        },
        SessionCommand::SearchSchema {
            connection_id,
            term,
        } => ActionOutput::SearchCompleted {
            connection_id,
            results: session.search_schema(connection_id, &term).await?,
        },
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datalink_adapters::build_session;
    use datalink_adapters::export::ExportFormat;
    use datalink_core::config::{AppConfig, SimulationConfig};
    use datalink_core::profiles::{ConnectionFields, DatabaseKind};
    use datalink_core::secrets::MemorySecretStore;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    use super::{perform, ActionOutput, BusyKind, ExportRequest, SessionCommand};

    fn fields() -> ConnectionFields {
        ConnectionFields {
            name: "shop".to_string(),
            kind: DatabaseKind::Mysql,
            host: "localhost".to_string(),
            port: None,
            database: "ecommerce_db".to_string(),
            username: "root".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn commands_update_the_shared_session_and_report_snapshots() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let mut config = AppConfig::in_dir(temp_dir.path());
        config.simulation = SimulationConfig::instant();
        let session = Mutex::new(
            build_session(&config, Arc::new(MemorySecretStore::new())).expect("build session"),
        );
        let export_dir = temp_dir.path().join("exports");

        let saved = perform(
            &session,
            SessionCommand::SaveConnection {
                id: None,
                fields: fields(),
            }
            .into(),
            &export_dir,
        )
        .await;
        assert_eq!(saved.kind, BusyKind::SaveConnection);
        let snapshot = saved.snapshot.expect("snapshot");
        assert_eq!(snapshot.connections.len(), 1);
        let id = snapshot.connections[0].id;

        let connected = perform(&session, SessionCommand::Connect(id).into(), &export_dir).await;
        assert!(matches!(connected.result, Ok(ActionOutput::Connected(_))));
        assert_eq!(
            connected
                .snapshot
                .and_then(|snapshot| snapshot.active)
                .map(|profile| profile.id),
            Some(id)
        );

        let executed = perform(
            &session,
            SessionCommand::Execute {
                connection_id: id,
                sql: "SELECT * FROM users".to_string(),
            }
            .into(),
            &export_dir,
        )
        .await;
        let Ok(ActionOutput::Executed(query)) = executed.result else {
            panic!("query should succeed");
        };
        assert_eq!(query.row_count, 5);
        assert_eq!(executed.snapshot.map(|snapshot| snapshot.recent.len()), Some(1));

        let exported = perform(
            &session,
            ExportRequest {
                format: ExportFormat::Json,
                result: Arc::new(query.result),
                order: vec![4, 3],
            }
            .into(),
            &export_dir,
        )
        .await;
        assert!(exported.snapshot.is_none());
        let Ok(ActionOutput::Exported(summary)) = exported.result else {
            panic!("export should succeed");
        };
        assert_eq!(summary.rows, 2);
        assert!(summary.path.starts_with(&export_dir));
    }

    #[tokio::test]
    async fn session_errors_are_reported_as_text() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let mut config = AppConfig::in_dir(temp_dir.path());
        config.simulation = SimulationConfig::instant();
        let session = Mutex::new(
            build_session(&config, Arc::new(MemorySecretStore::new())).expect("build session"),
        );

        let outcome = perform(
            &session,
            SessionCommand::Execute {
                connection_id: 1,
                sql: "SELECT 1".to_string(),
            }
            .into(),
            temp_dir.path(),
        )
        .await;
        assert_eq!(outcome.result.err().as_deref(), Some("no active connection"));

        let outcome = perform(
            &session,
            SessionCommand::LoadSchema {
                connection_id: 7,
                refresh: false,
            }
            .into(),
            temp_dir.path(),
        )
        .await;
        assert_eq!(outcome.result.err().as_deref(), Some("connection 7 not found"));
    }
}
