use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::profiles::ConnectionProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnKey {
    #[default]
    None,
    Primary,
    Unique,
    Indexed,
}

impl ColumnKey {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Primary => "PRI",
            Self::Unique => "UNI",
            Self::Indexed => "MUL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub key: ColumnKey,
    pub default_value: Option<String>,
    pub extra: Option<String>,
}

impl ColumnSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            key: ColumnKey::None,
            default_value: None,
            extra: None,
        }
    }

    #[must_use]
    pub fn is_auto_increment(&self) -> bool {
        self.extra
            .as_deref()
            .is_some_and(|extra| extra.contains("auto_increment"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub indexes: Vec<IndexSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSchema {
    pub name: String,
    pub definition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Procedure,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineSchema {
    pub name: String,
    pub kind: RoutineKind,
    pub parameters: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaCatalog {
    pub database_name: String,
    pub tables: Vec<TableSchema>,
    pub views: Vec<ViewSchema>,
    pub procedures: Vec<RoutineSchema>,
}

impl SchemaCatalog {
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|table| table.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatistics {
    pub row_count: u64,
    pub table_size: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDetails {
    pub table: TableSchema,
    pub statistics: TableStatistics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMatch {
    pub table_name: String,
    pub column: ColumnSchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaSearchResults {
    pub term: String,
    pub tables: Vec<TableSchema>,
    pub columns: Vec<ColumnMatch>,
    pub views: Vec<ViewSchema>,
}

impl SchemaSearchResults {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.columns.is_empty() && self.views.is_empty()
    }
}

const MIN_SEARCH_TERM_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SchemaBackendError {
    message: String,
}

impl SchemaBackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SchemaCacheError {
    #[error("schema backend failed: {0}")]
    Backend(#[source] SchemaBackendError),
    #[error("table `{0}` not found")]
    TableNotFound(String),
}

#[async_trait]
pub trait SchemaBackend {
    async fn fetch_schema(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<SchemaCatalog, SchemaBackendError>;

    async fn fetch_table_statistics(
        &self,
        profile: &ConnectionProfile,
        table: &TableSchema,
    ) -> Result<TableStatistics, SchemaBackendError>;
}

#[derive(Debug)]
struct CachedSchema {
    connection_id: u64,
    fetched_at: Instant,
    schema: Arc<SchemaCatalog>,
}

#[derive(Debug)]
pub struct SchemaCacheService<B: SchemaBackend> {
    backend: B,
    ttl: Duration,
    cache: Option<CachedSchema>,
}

impl<B: SchemaBackend> SchemaCacheService<B> {
    #[must_use]
    pub fn new(backend: B, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            cache: None,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    pub async fn schema(
        &mut self,
        profile: &ConnectionProfile,
    ) -> Result<Arc<SchemaCatalog>, SchemaCacheError> {
        self.schema_at(profile, Instant::now()).await
    }

    pub async fn refresh(
        &mut self,
        profile: &ConnectionProfile,
    ) -> Result<Arc<SchemaCatalog>, SchemaCacheError> {
        self.refresh_at(profile, Instant::now()).await
    }

    pub async fn table_details(
        &mut self,
        profile: &ConnectionProfile,
        table_name: &str,
    ) -> Result<TableDetails, SchemaCacheError> {
        let schema = self.schema(profile).await?;
        let table = schema
            .table(table_name)
            .cloned()
            .ok_or_else(|| SchemaCacheError::TableNotFound(table_name.to_string()))?;

        let statistics = self
            .backend
            .fetch_table_statistics(profile, &table)
            .await
            .map_err(SchemaCacheError::Backend)?;
        Ok(TableDetails { table, statistics })
    }

    pub async fn search(
        &mut self,
        profile: &ConnectionProfile,
        term: &str,
    ) -> Result<SchemaSearchResults, SchemaCacheError> {
        let trimmed = term.trim();
        if trimmed.chars().count() < MIN_SEARCH_TERM_CHARS {
            return Ok(SchemaSearchResults {
                term: term.to_string(),
                ..SchemaSearchResults::default()
            });
        }

        let schema = self.schema(profile).await?;
        let needle = trimmed.to_lowercase();
        let matches = |name: &str| name.to_lowercase().contains(&needle);

        let tables = schema
            .tables
            .iter()
            .filter(|table| matches(&table.name))
            .cloned()
            .collect();
        let columns = schema
            .tables
            .iter()
            .flat_map(|table| {
                table
                    .columns
                    .iter()
                    .filter(|column| matches(&column.name))
                    .map(|column| ColumnMatch {
                        table_name: table.name.clone(),
                        column: column.clone(),
                    })
            })
            .collect();
        let views = schema
            .views
            .iter()
            .filter(|view| matches(&view.name))
            .cloned()
            .collect();

        Ok(SchemaSearchResults {
            term: term.to_string(),
            tables,
            columns,
            views,
        })
    }

    async fn schema_at(
        &mut self,
        profile: &ConnectionProfile,
        now: Instant,
    ) -> Result<Arc<SchemaCatalog>, SchemaCacheError> {
        if let Some(cache) = &self.cache {
            if cache.connection_id == profile.id
                && now.duration_since(cache.fetched_at) <= self.ttl
            {
                tracing::debug!(connection_id = profile.id, "schema cache hit");
                return Ok(Arc::clone(&cache.schema));
            }
        }
        self.refresh_at(profile, now).await
    }

    async fn refresh_at(
        &mut self,
        profile: &ConnectionProfile,
        now: Instant,
    ) -> Result<Arc<SchemaCatalog>, SchemaCacheError> {
        let schema = Arc::new(
            self.backend
                .fetch_schema(profile)
                .await
                .map_err(SchemaCacheError::Backend)?,
        );

        self.cache = Some(CachedSchema {
            connection_id: profile.id,
            fetched_at: now,
            schema: Arc::clone(&schema),
        });
        Ok(schema)
    }
}
