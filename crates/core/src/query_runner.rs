use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use crate::profiles::ConnectionProfile;
use crate::result_set::TabularResult;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryBackendError {
    message: String,
}

impl QueryBackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryRunnerError {
    #[error("SQL text is empty")]
    EmptySql,
    #[error("query backend failed: {0}")]
    Backend(#[source] QueryBackendError),
}

#[async_trait]
pub trait QueryBackend {
    async fn run_query(
        &self,
        profile: &ConnectionProfile,
        sql: &str,
    ) -> Result<TabularResult, QueryBackendError>;
}

/// A finished query: the full result plus how long it took.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedQuery {
    pub result: TabularResult,
    pub execution_time: Duration,
    pub row_count: usize,
}

impl ExecutedQuery {
    #[must_use]
    pub fn execution_time_ms(&self) -> u64 {
        u64::try_from(self.execution_time.as_millis()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug)]
pub struct QueryRunner<B: QueryBackend> {
    backend: B,
}

impl<B: QueryBackend> QueryRunner<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn execute(
        &self,
        profile: &ConnectionProfile,
        sql: &str,
    ) -> Result<ExecutedQuery, QueryRunnerError> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(QueryRunnerError::EmptySql);
        }

        let started_at = Instant::now();
        let result = self
            .backend
            .run_query(profile, sql)
            .await
            .map_err(QueryRunnerError::Backend)?;

        Ok(ExecutedQuery {
            row_count: result.row_count(),
            execution_time: started_at.elapsed(),
            result,
        })
    }
}
