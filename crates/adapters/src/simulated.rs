use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datalink_core::config::SimulationConfig;
use datalink_core::connection_manager::{BackendError, ConnectionBackend, ServerInfo};
use datalink_core::fault::{FaultInjector, Latency};
use datalink_core::profiles::{ConnectionProfile, DatabaseKind};
use datalink_core::query_runner::{QueryBackend, QueryBackendError};
use datalink_core::result_set::TabularResult;
use datalink_core::schema_cache::{
    SchemaBackend, SchemaBackendError, SchemaCatalog, TableSchema, TableStatistics,
};
use rand::Rng;
use tracing::debug;

use crate::demo_data::{canned_result, demo_catalog};

pub const CONNECT_FAILURE_MESSAGE: &str = "Failed to establish database connection";
pub const UNREACHABLE_MESSAGE: &str = "Unable to reach database server";
pub const SYNTAX_ERROR_MESSAGE: &str = "Syntax error: Invalid SQL statement";

/// Handle for a simulated open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedConnection {
    pub profile_id: u64,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedConnectionBackend {
    connect_latency: Latency,
    test_latency: Latency,
    disconnect_latency: Latency,
    connect_faults: FaultInjector,
    test_faults: FaultInjector,
}

impl SimulatedConnectionBackend {
    #[must_use]
    pub fn from_config(simulation: &SimulationConfig) -> Self {
        Self {
            connect_latency: simulation.connect_latency(),
            test_latency: simulation.test_latency(),
            disconnect_latency: simulation.disconnect_latency(),
            connect_faults: simulation.connect_faults(),
            test_faults: simulation.test_faults(),
        }
    }

    #[must_use]
    pub fn with_connect_faults(mut self, faults: FaultInjector) -> Self {
        self.connect_faults = faults;
        self
    }

    #[must_use]
    pub fn with_test_faults(mut self, faults: FaultInjector) -> Self {
        self.test_faults = faults;
        self
    }
}

fn server_version(kind: DatabaseKind) -> &'static str {
    match kind {
        DatabaseKind::Mysql => "8.0.33",
        DatabaseKind::Postgresql => "15.4",
        DatabaseKind::Sqlite => "3.42.0",
    }
}

#[async_trait]
impl ConnectionBackend for SimulatedConnectionBackend {
    type Connection = SimulatedConnection;

    async fn connect(&self, profile: &ConnectionProfile) -> Result<Self::Connection, BackendError> {
        self.connect_latency.wait().await;
        if self.connect_faults.should_fail() {
            return Err(BackendError::new(CONNECT_FAILURE_MESSAGE));
        }

        debug!(connection_id = profile.id, endpoint = %profile.endpoint(), "simulated connect");
        Ok(SimulatedConnection {
            profile_id: profile.id,
            opened_at: Utc::now(),
        })
    }

    async fn ping(&self, _connection: &mut Self::Connection) -> Result<(), BackendError> {
        Ok(())
    }

    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError> {
        self.disconnect_latency.wait().await;
        debug!(connection_id = connection.profile_id, "simulated disconnect");
        Ok(())
    }

    async fn server_info(&self, profile: &ConnectionProfile) -> Result<ServerInfo, BackendError> {
        self.test_latency.wait().await;
        if self.test_faults.should_fail() {
            return Err(BackendError::new(UNREACHABLE_MESSAGE));
        }

        Ok(ServerInfo {
            server_version: server_version(profile.kind).to_string(),
            latency: Duration::from_millis(rand::thread_rng().gen_range(10..110)),
        })
    }
}

/// Answers every statement with a canned result chosen by keyword.
#[derive(Debug, Clone, Default)]
pub struct CannedQueryBackend {
    latency: Latency,
    faults: FaultInjector,
}

impl CannedQueryBackend {
    #[must_use]
    pub fn new(latency: Latency, faults: FaultInjector) -> Self {
        Self { latency, faults }
    }

    #[must_use]
    pub fn from_config(simulation: &SimulationConfig) -> Self {
        Self::new(simulation.query_latency(), simulation.query_faults())
    }
}

#[async_trait]
impl QueryBackend for CannedQueryBackend {
    async fn run_query(
        &self,
        profile: &ConnectionProfile,
        sql: &str,
    ) -> Result<TabularResult, QueryBackendError> {
        self.latency.wait().await;
        if self.faults.should_fail() {
            return Err(QueryBackendError::new(SYNTAX_ERROR_MESSAGE));
        }

        debug!(connection_id = profile.id, "serving canned result");
        canned_result(sql).map_err(|err| QueryBackendError::new(err.to_string()))
    }
}

const MAX_STATISTICS_AGE_SECS: i64 = 30 * 24 * 60 * 60;

/// Serves the built-in demo catalogs with made-up table statistics.
#[derive(Debug, Clone, Default)]
pub struct DemoSchemaBackend {
    schema_latency: Latency,
    details_latency: Latency,
}

impl DemoSchemaBackend {
    #[must_use]
    pub fn new(schema_latency: Latency, details_latency: Latency) -> Self {
        Self {
            schema_latency,
            details_latency,
        }
    }

    #[must_use]
    pub fn from_config(simulation: &SimulationConfig) -> Self {
        Self::new(simulation.schema_latency(), simulation.details_latency())
    }
}

#[async_trait]
impl SchemaBackend for DemoSchemaBackend {
    async fn fetch_schema(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<SchemaCatalog, SchemaBackendError> {
        self.schema_latency.wait().await;
        Ok(demo_catalog(profile.kind))
    }

    async fn fetch_table_statistics(
        &self,
        _profile: &ConnectionProfile,
        _table: &TableSchema,
    ) -> Result<TableStatistics, SchemaBackendError> {
        self.details_latency.wait().await;
        let mut rng = rand::thread_rng();
        let age = chrono::Duration::seconds(rng.gen_range(0..MAX_STATISTICS_AGE_SECS));

        Ok(TableStatistics {
            row_count: rng.gen_range(100..10_100),
            table_size: format!("{} MB", rng.gen_range(50..550)),
            last_updated: Utc::now() - age,
        })
    }
}
