use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    #[default]
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRecord {
    pub id: u64,
    pub connection_id: u64,
    pub sql: String,
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub row_count: usize,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub status: QueryStatus,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewQueryRecord {
    pub connection_id: u64,
    pub sql: String,
    pub execution_time_ms: u64,
    pub row_count: usize,
    pub status: QueryStatus,
}

/// Fields to overwrite on an existing record; `None` leaves a field as is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryRecordPatch {
    pub sql: Option<String>,
    pub is_favorite: Option<bool>,
    pub status: Option<QueryStatus>,
}

#[derive(Debug, Error)]
pub enum QueryHistoryError {
    #[error("query {0} not found")]
    NotFound(u64),
    #[error("failed to read history file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse history file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to create config directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize query history: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to write history file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDocument {
    #[serde(default)]
    queries: Vec<QueryRecord>,
}

impl HistoryDocument {
    fn normalize(&mut self, limit: usize) {
        let mut seen = HashSet::new();
        self.queries.retain(|record| seen.insert(record.id));
        self.queries.truncate(limit);
    }
}

/// Executed-query log kept newest first and capped at `limit` entries.
#[derive(Debug, Clone)]
pub struct FileQueryHistoryStore {
    path: PathBuf,
    limit: usize,
    records: Vec<QueryRecord>,
}

impl FileQueryHistoryStore {
    pub fn load_from_path(path: impl Into<PathBuf>, limit: usize) -> Result<Self, QueryHistoryError> {
        let path = path.into();
        let limit = limit.max(1);
        if !path.exists() {
            return Ok(Self {
                path,
                limit,
                records: Vec::new(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| QueryHistoryError::Read {
            path: path.clone(),
            source,
        })?;

        if raw.trim().is_empty() {
            return Ok(Self {
                path,
                limit,
                records: Vec::new(),
            });
        }

        let mut doc: HistoryDocument =
            toml::from_str(&raw).map_err(|source| QueryHistoryError::Parse {
                path: path.clone(),
                source,
            })?;
        doc.normalize(limit);

        Ok(Self {
            path,
            limit,
            records: doc.queries,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn list(&self) -> &[QueryRecord] {
        &self.records
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<&QueryRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn create(&mut self, new: NewQueryRecord) -> QueryRecord {
        let id = self
            .records
            .iter()
            .map(|record| record.id)
            .max()
            .unwrap_or(0)
            + 1;
        let record = QueryRecord {
            id,
            connection_id: new.connection_id,
            sql: new.sql.trim().to_string(),
            executed_at: Utc::now(),
            execution_time_ms: new.execution_time_ms,
            row_count: new.row_count,
            is_favorite: false,
            status: new.status,
            updated_at: None,
        };

        self.records.insert(0, record.clone());
        self.records.truncate(self.limit);
        record
    }

    pub fn update(
        &mut self,
        id: u64,
        patch: QueryRecordPatch,
    ) -> Result<QueryRecord, QueryHistoryError> {
        let record = self.record_mut(id)?;
        if let Some(sql) = patch.sql {
            record.sql = sql.trim().to_string();
        }
        if let Some(is_favorite) = patch.is_favorite {
            record.is_favorite = is_favorite;
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }

    pub fn delete(&mut self, id: u64) -> Result<QueryRecord, QueryHistoryError> {
        let index = self
            .records
            .iter()
            .position(|record| record.id == id)
            .ok_or(QueryHistoryError::NotFound(id))?;
        Ok(self.records.remove(index))
    }

    pub fn toggle_favorite(&mut self, id: u64) -> Result<QueryRecord, QueryHistoryError> {
        let record = self.record_mut(id)?;
        record.is_favorite = !record.is_favorite;
        Ok(record.clone())
    }

    #[must_use]
    pub fn favorites(&self) -> Vec<&QueryRecord> {
        self.records.iter().filter(|record| record.is_favorite).collect()
    }

    #[must_use]
    pub fn recent(&self, limit: usize) -> &[QueryRecord] {
        &self.records[..limit.min(self.records.len())]
    }

    pub fn persist(&self) -> Result<(), QueryHistoryError> {
        if let Some(parent_dir) = self.path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| QueryHistoryError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let doc = HistoryDocument {
            queries: self.records.clone(),
        };
        let rendered = toml::to_string_pretty(&doc)
            .map_err(|source| QueryHistoryError::Serialize { source })?;

        fs::write(&self.path, rendered).map_err(|source| QueryHistoryError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn record_mut(&mut self, id: u64) -> Result<&mut QueryRecord, QueryHistoryError> {
        self.records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(QueryHistoryError::NotFound(id))
    }
}
