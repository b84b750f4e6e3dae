use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::connection_manager::{
    ConnectionBackend, ConnectionManager, ConnectionManagerError, ConnectionStatus,
    ConnectionTestReport,
};
use crate::profiles::{
    ConnectionFields, ConnectionProfile, FileConnectionStore, ProfilesError, ValidationError,
};
use crate::query_history::{
    FileQueryHistoryStore, NewQueryRecord, QueryHistoryError, QueryRecord, QueryRecordPatch,
    QueryStatus, DEFAULT_RECENT_LIMIT,
};
use crate::query_runner::{ExecutedQuery, QueryBackend, QueryRunner, QueryRunnerError};
use crate::schema_cache::{
    SchemaBackend, SchemaCacheError, SchemaCacheService, SchemaCatalog, SchemaSearchResults,
    TableDetails,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active connection")]
    NoActiveConnection,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Profiles(#[from] ProfilesError),
    #[error(transparent)]
    History(#[from] QueryHistoryError),
    #[error(transparent)]
    Connection(#[from] ConnectionManagerError),
    #[error(transparent)]
    Query(#[from] QueryRunnerError),
    #[error(transparent)]
    Schema(#[from] SchemaCacheError),
}

/// Application state: saved connections, the active connection, query
/// history and the schema cache. Every UI action goes through here.
pub struct Session<C, Q, S>
where
    C: ConnectionBackend,
    Q: QueryBackend,
    S: SchemaBackend,
{
    connections: FileConnectionStore,
    history: FileQueryHistoryStore,
    manager: ConnectionManager<C>,
    runner: QueryRunner<Q>,
    schema: SchemaCacheService<S>,
    recent_limit: usize,
}

impl<C, Q, S> Session<C, Q, S>
where
    C: ConnectionBackend + Send + Sync,
    Q: QueryBackend + Send + Sync,
    S: SchemaBackend + Send + Sync,
{
    /// A profile still flagged active from an earlier run is cleared, since
    /// no live connection backs it.
    #[must_use]
    pub fn new(
        mut connections: FileConnectionStore,
        history: FileQueryHistoryStore,
        manager: ConnectionManager<C>,
        runner: QueryRunner<Q>,
        schema: SchemaCacheService<S>,
    ) -> Self {
        if let Some(stale) = connections.clear_active() {
            info!(connection_id = stale, "cleared stale active connection flag");
        }

        Self {
            connections,
            history,
            manager,
            runner,
            schema,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    #[must_use]
    pub fn with_recent_limit(mut self, recent_limit: usize) -> Self {
        self.recent_limit = recent_limit;
        self
    }

    #[must_use]
    pub fn connections(&self) -> &[ConnectionProfile] {
        self.connections.profiles()
    }

    #[must_use]
    pub fn connection(&self, id: u64) -> Option<&ConnectionProfile> {
        self.connections.profile(id)
    }

    pub fn create_connection(
        &mut self,
        fields: &ConnectionFields,
    ) -> Result<ConnectionProfile, SessionError> {
        let profile = self.connections.create(fields)?;
        self.connections.persist()?;
        info!(connection_id = profile.id, name = %profile.name, "connection created");
        Ok(profile)
    }

    pub fn update_connection(
        &mut self,
        id: u64,
        fields: &ConnectionFields,
    ) -> Result<ConnectionProfile, SessionError> {
        let profile = self.connections.update(id, fields)?;
        self.connections.persist()?;
        self.schema.invalidate();
        info!(connection_id = id, "connection updated");
        Ok(profile)
    }

    /// Removes a saved connection, disconnecting first when it is the active one.
    pub async fn delete_connection(&mut self, id: u64) -> Result<ConnectionProfile, SessionError> {
        if self.connections.profile(id).is_none() {
            return Err(ProfilesError::NotFound(id).into());
        }
        if self.manager.active_profile().map(|profile| profile.id) == Some(id) {
            self.disconnect().await?;
        }

        let removed = self.connections.delete(id)?;
        self.connections.persist()?;
        self.schema.invalidate();
        info!(connection_id = id, "connection deleted");
        Ok(removed)
    }

    pub async fn test_connection(
        &self,
        fields: &ConnectionFields,
    ) -> Result<ConnectionTestReport, SessionError> {
        fields.validate()?;
        let report = self
            .manager
            .test_connection(&fields.draft_profile())
            .await
            .inspect_err(|err| warn!(error = %err, "connection test failed"))?;
        info!(
            server_version = report.server_version.as_deref().unwrap_or_default(),
            latency_ms = report.latency.map_or(0, |latency| latency.as_millis()),
            "connection test succeeded"
        );
        Ok(report)
    }

    pub async fn connect(&mut self, id: u64) -> Result<ConnectionProfile, SessionError> {
        let profile = self
            .connections
            .profile(id)
            .cloned()
            .ok_or(ProfilesError::NotFound(id))?;

        let latency = match self.manager.connect(profile).await {
            Ok(latency) => latency,
            Err(err) => {
                warn!(connection_id = id, error = %err, "connect failed");
                // A failed switch has already closed the previous connection.
                if self.manager.active_profile().is_none()
                    && self.connections.clear_active().is_some()
                {
                    self.connections.persist()?;
                }
                return Err(err.into());
            }
        };
        let active = self.connections.mark_active(id)?;
        self.connections.persist()?;
        info!(
            connection_id = id,
            latency_ms = latency.as_millis(),
            "connected"
        );
        Ok(active)
    }

    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.manager.disconnect().await?;
        if let Some(id) = self.connections.clear_active() {
            self.connections.persist()?;
            info!(connection_id = id, "disconnected");
        }
        Ok(())
    }

    #[must_use]
    pub fn active_connection(&self) -> Option<&ConnectionProfile> {
        self.connections.active()
    }

    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    /// Runs `sql` against `connection_id` and records it in the history. The
    /// connection has to be the active one.
    pub async fn execute(
        &mut self,
        connection_id: u64,
        sql: &str,
    ) -> Result<ExecutedQuery, SessionError> {
        let profile = self
            .active_connection()
            .filter(|profile| profile.id == connection_id)
            .cloned()
            .ok_or(SessionError::NoActiveConnection)?;

        let executed = self
            .runner
            .execute(&profile, sql)
            .await
            .inspect_err(|err| warn!(connection_id = profile.id, error = %err, "query failed"))?;

        self.history.create(NewQueryRecord {
            connection_id: profile.id,
            sql: sql.to_string(),
            execution_time_ms: executed.execution_time_ms(),
            row_count: executed.row_count,
            status: QueryStatus::Completed,
        });
        self.history.persist()?;
        info!(
            connection_id = profile.id,
            rows = executed.row_count,
            elapsed_ms = executed.execution_time_ms(),
            "query executed"
        );
        Ok(executed)
    }

    #[must_use]
    pub fn history(&self) -> &[QueryRecord] {
        self.history.list()
    }

    #[must_use]
    pub fn query(&self, id: u64) -> Option<&QueryRecord> {
        self.history.get(id)
    }

    #[must_use]
    pub fn recent_queries(&self, limit: Option<usize>) -> &[QueryRecord] {
        self.history.recent(limit.unwrap_or(self.recent_limit))
    }

    #[must_use]
    pub fn favorite_queries(&self) -> Vec<&QueryRecord> {
        self.history.favorites()
    }

    pub fn record_query(&mut self, record: NewQueryRecord) -> Result<QueryRecord, SessionError> {
        let created = self.history.create(record);
        self.history.persist()?;
        Ok(created)
    }

    pub fn update_query(
        &mut self,
        id: u64,
        patch: QueryRecordPatch,
    ) -> Result<QueryRecord, SessionError> {
        let updated = self.history.update(id, patch)?;
        self.history.persist()?;
        Ok(updated)
    }

    pub fn delete_query(&mut self, id: u64) -> Result<QueryRecord, SessionError> {
        let removed = self.history.delete(id)?;
        self.history.persist()?;
        Ok(removed)
    }

    pub fn toggle_favorite(&mut self, id: u64) -> Result<QueryRecord, SessionError> {
        let toggled = self.history.toggle_favorite(id)?;
        self.history.persist()?;
        Ok(toggled)
    }

    pub async fn schema(&mut self, connection_id: u64) -> Result<Arc<SchemaCatalog>, SessionError> {
        let profile = self.profile_for(connection_id)?;
        Ok(self.schema.schema(&profile).await?)
    }

    pub async fn refresh_schema(
        &mut self,
        connection_id: u64,
    ) -> Result<Arc<SchemaCatalog>, SessionError> {
        let profile = self.profile_for(connection_id)?;
        let catalog = self.schema.refresh(&profile).await?;
        info!(connection_id, database = %catalog.database_name, "schema refreshed");
        Ok(catalog)
    }

    pub async fn table_details(
        &mut self,
        connection_id: u64,
        table_name: &str,
    ) -> Result<TableDetails, SessionError> {
        let profile = self.profile_for(connection_id)?;
        Ok(self.schema.table_details(&profile, table_name).await?)
    }

    pub async fn search_schema(
        &mut self,
        connection_id: u64,
        term: &str,
    ) -> Result<SchemaSearchResults, SessionError> {
        let profile = self.profile_for(connection_id)?;
        Ok(self.schema.search(&profile, term).await?)
    }

    fn profile_for(&self, connection_id: u64) -> Result<ConnectionProfile, SessionError> {
        self.connections
            .profile(connection_id)
            .cloned()
            .ok_or_else(|| ProfilesError::NotFound(connection_id).into())
    }
}
