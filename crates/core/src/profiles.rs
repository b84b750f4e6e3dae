use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::secrets::{SecretStore, SecretStoreError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[default]
    Mysql,
    Postgresql,
    Sqlite,
}

impl DatabaseKind {
    pub const ALL: [Self; 3] = [Self::Mysql, Self::Postgresql, Self::Sqlite];

    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Self::Mysql => 3306,
            Self::Postgresql => 5432,
            Self::Sqlite => 0,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Mysql => "MySQL",
            Self::Postgresql => "PostgreSQL",
            Self::Sqlite => "SQLite",
        }
    }

    /// Server-based engines need a host and a user; SQLite only a file.
    #[must_use]
    pub fn is_networked(self) -> bool {
        !matches!(self, Self::Sqlite)
    }

    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Mysql => Self::Postgresql,
            Self::Postgresql => Self::Sqlite,
            Self::Sqlite => Self::Mysql,
        }
    }

    #[must_use]
    pub fn previous(self) -> Self {
        match self {
            Self::Mysql => Self::Sqlite,
            Self::Postgresql => Self::Mysql,
            Self::Sqlite => Self::Postgresql,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("connection name is required")]
    MissingName,
    #[error("host is required")]
    MissingHost,
    #[error("database is required")]
    MissingDatabase,
    #[error("username is required")]
    MissingUsername,
}

/// User-entered connection settings, including the write-only password.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionFields {
    pub name: String,
    pub kind: DatabaseKind,
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl ConnectionFields {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        if self.kind.is_networked() && self.host.trim().is_empty() {
            return Err(ValidationError::MissingHost);
        }
        if self.database.trim().is_empty() {
            return Err(ValidationError::MissingDatabase);
        }
        if self.kind.is_networked() && self.username.trim().is_empty() {
            return Err(ValidationError::MissingUsername);
        }
        Ok(())
    }

    #[must_use]
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.kind.default_port())
    }

    /// Unsaved profile used to test settings before they are stored.
    #[must_use]
    pub fn draft_profile(&self) -> ConnectionProfile {
        let mut profile = ConnectionProfile::new(self.name.trim(), self.kind, self.database.trim());
        profile.host = self.host.trim().to_string();
        profile.port = self.effective_port();
        profile.username = self.username.trim().to_string();
        profile.password_set = !self.password.is_empty();
        profile
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub id: u64,
    pub name: String,
    pub kind: DatabaseKind,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password_set: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub last_connected: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConnectionProfile {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: DatabaseKind, database: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            kind,
            host: String::new(),
            port: kind.default_port(),
            database: database.into(),
            username: String::new(),
            password_set: false,
            is_active: false,
            last_connected: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Editable fields of this profile. The password is never filled in.
    #[must_use]
    pub fn to_fields(&self) -> ConnectionFields {
        ConnectionFields {
            name: self.name.clone(),
            kind: self.kind,
            host: self.host.clone(),
            port: Some(self.port),
            database: self.database.clone(),
            username: self.username.clone(),
            password: String::new(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        if self.kind.is_networked() {
            format!("{}:{}/{}", self.host, self.port, self.database)
        } else {
            self.database.clone()
        }
    }
}

#[derive(Debug, Error)]
pub enum ProfilesError {
    #[error("invalid connection settings: {0}")]
    Validation(#[from] ValidationError),
    #[error("connection {0} not found")]
    NotFound(u64),
    #[error("failed to update stored password: {0}")]
    Secret(#[from] SecretStoreError),
    #[error("failed to read connections file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse connections file at {path}: {source}")]
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
    #[error("failed to serialize connections: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to write connections file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConnectionsDocument {
    #[serde(default)]
    connections: Vec<ConnectionProfile>,
}

impl ConnectionsDocument {
    fn normalize(&mut self) {
        let mut by_id = std::collections::BTreeMap::new();
        for profile in self.connections.drain(..) {
            by_id.insert(profile.id, profile);
        }
        self.connections = by_id.into_values().collect();

        let mut seen_active = false;
        for profile in &mut self.connections {
            if profile.is_active {
                profile.is_active = !seen_active;
                seen_active = true;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileConnectionStore {
    path: PathBuf,
    profiles: Vec<ConnectionProfile>,
    secrets: Arc<dyn SecretStore>,
}

impl FileConnectionStore {
    pub fn load_from_path(
        path: impl Into<PathBuf>,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self, ProfilesError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                profiles: Vec::new(),
                secrets,
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| ProfilesError::Read {
            path: path.clone(),
            source,
        })?;

        if raw.trim().is_empty() {
            return Ok(Self {
                path,
                profiles: Vec::new(),
                secrets,
            });
        }

        let mut doc: ConnectionsDocument =
            toml::from_str(&raw).map_err(|source| ProfilesError::Parse {
                path: path.clone(),
                source,
            })?;
        doc.normalize();

        Ok(Self {
            path,
            profiles: doc.connections,
            secrets,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn profiles(&self) -> &[ConnectionProfile] {
        &self.profiles
    }

    #[must_use]
    pub fn profile(&self, id: u64) -> Option<&ConnectionProfile> {
        self.profiles.iter().find(|profile| profile.id == id)
    }

    #[must_use]
    pub fn active(&self) -> Option<&ConnectionProfile> {
        self.profiles.iter().find(|profile| profile.is_active)
    }

    pub fn create(&mut self, fields: &ConnectionFields) -> Result<ConnectionProfile, ProfilesError> {
        fields.validate()?;

        let id = self
            .profiles
            .iter()
            .map(|profile| profile.id)
            .max()
            .unwrap_or(0)
            + 1;
        let mut profile = fields.draft_profile();
        profile.id = id;
        profile.password_set = false;

        if !fields.password.is_empty() {
            self.secrets.store_password(id, &fields.password)?;
            profile.password_set = true;
        }

        self.profiles.push(profile.clone());
        Ok(profile)
    }

    /// Replaces the editable fields. An empty password keeps the stored one.
    pub fn update(
        &mut self,
        id: u64,
        fields: &ConnectionFields,
    ) -> Result<ConnectionProfile, ProfilesError> {
        fields.validate()?;
        let index = self.index_of(id)?;

        if !fields.password.is_empty() {
            self.secrets.store_password(id, &fields.password)?;
        }

        let existing = &mut self.profiles[index];
        existing.name = fields.name.trim().to_string();
        existing.kind = fields.kind;
        existing.host = fields.host.trim().to_string();
        existing.port = fields.effective_port();
        existing.database = fields.database.trim().to_string();
        existing.username = fields.username.trim().to_string();
        existing.password_set = existing.password_set || !fields.password.is_empty();
        existing.updated_at = Some(Utc::now());
        Ok(existing.clone())
    }

    pub fn delete(&mut self, id: u64) -> Result<ConnectionProfile, ProfilesError> {
        let index = self.index_of(id)?;
        let removed = self.profiles.remove(index);
        if removed.password_set {
            self.secrets.forget_password(id)?;
        }
        Ok(removed)
    }

    /// Flags `id` as the single active profile and stamps its connect time.
    pub fn mark_active(&mut self, id: u64) -> Result<ConnectionProfile, ProfilesError> {
        let index = self.index_of(id)?;
        for profile in &mut self.profiles {
            profile.is_active = false;
        }

        let profile = &mut self.profiles[index];
        profile.is_active = true;
        profile.last_connected = Some(Utc::now());
        Ok(profile.clone())
    }

    pub fn clear_active(&mut self) -> Option<u64> {
        let active = self.profiles.iter_mut().find(|profile| profile.is_active)?;
        active.is_active = false;
        Some(active.id)
    }

    pub fn persist(&self) -> Result<(), ProfilesError> {
        if let Some(parent_dir) = self.path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| ProfilesError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let doc = ConnectionsDocument {
            connections: self.profiles.clone(),
        };
        let rendered =
            toml::to_string_pretty(&doc).map_err(|source| ProfilesError::Serialize { source })?;

        fs::write(&self.path, rendered).map_err(|source| ProfilesError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn index_of(&self, id: u64) -> Result<usize, ProfilesError> {
        self.profiles
            .iter()
            .position(|profile| profile.id == id)
            .ok_or(ProfilesError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::{
        ConnectionFields, DatabaseKind, FileConnectionStore, ProfilesError, ValidationError,
    };
    use crate::secrets::{MemorySecretStore, SecretStore};

    fn temp_connections_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("connections.toml")
    }

    fn mysql_fields(name: &str) -> ConnectionFields {
        ConnectionFields {
            name: name.to_string(),
            kind: DatabaseKind::Mysql,
            host: "127.0.0.1".to_string(),
            port: None,
            database: "ecommerce_db".to_string(),
            username: "root".to_string(),
            password: "s3cret".to_string(),
        }
    }

    #[test]
    fn validation_follows_engine_requirements() {
        let mut fields = mysql_fields("local");
        assert_eq!(fields.validate(), Ok(()));

        fields.host.clear();
        assert_eq!(fields.validate(), Err(ValidationError::MissingHost));

        fields.kind = DatabaseKind::Sqlite;
        fields.username.clear();
        assert_eq!(fields.validate(), Ok(()));

        fields.database = "  ".to_string();
        assert_eq!(fields.validate(), Err(ValidationError::MissingDatabase));

        fields.name.clear();
        assert_eq!(fields.validate(), Err(ValidationError::MissingName));
    }

    #[test]
    fn missing_connections_file_loads_empty_store() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let store = FileConnectionStore::load_from_path(
            temp_connections_path(&temp_dir),
            Arc::new(MemorySecretStore::new()),
        )
        .expect("failed to load store");
        assert!(store.profiles().is_empty());
        assert!(store.active().is_none());
    }

    #[test]
    fn create_assigns_ids_default_ports_and_keeps_password_out_of_the_file() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_connections_path(&temp_dir);
        let secrets = Arc::new(MemorySecretStore::new());
        let mut store = FileConnectionStore::load_from_path(&path, secrets.clone())
            .expect("failed to load store");

        let first = store.create(&mysql_fields("one")).expect("create first");
        let mut pg = mysql_fields("two");
        pg.kind = DatabaseKind::Postgresql;
        let second = store.create(&pg).expect("create second");

        assert_eq!(first.id, 1);
        assert_eq!(first.port, 3306);
        assert_eq!(second.id, 2);
        assert_eq!(second.port, 5432);
        assert!(first.password_set);
        assert!(secrets.has_password(1));

        store.persist().expect("persist");
        let raw = std::fs::read_to_string(&path).expect("read file");
        assert!(!raw.contains("s3cret"));

        let reloaded =
            FileConnectionStore::load_from_path(&path, secrets).expect("failed to reload");
        assert_eq!(reloaded.profiles(), store.profiles());
    }

    #[test]
    fn update_keeps_password_when_blank_and_reports_missing_ids() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let secrets = Arc::new(MemorySecretStore::new());
        let mut store =
            FileConnectionStore::load_from_path(temp_connections_path(&temp_dir), secrets.clone())
                .expect("failed to load store");
        let created = store.create(&mysql_fields("local")).expect("create");

        let mut fields = created.to_fields();
        assert!(fields.password.is_empty());
        fields.database = "ecommerce_dev".to_string();
        let updated = store.update(created.id, &fields).expect("update");

        assert_eq!(updated.database, "ecommerce_dev");
        assert!(updated.password_set);
        assert!(updated.updated_at.is_some());
        assert!(secrets.has_password(created.id));

        let err = store.update(99, &fields).expect_err("missing id");
        assert!(matches!(err, ProfilesError::NotFound(99)));
    }

    #[test]
    fn delete_removes_profile_and_password() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let secrets = Arc::new(MemorySecretStore::new());
        let mut store =
            FileConnectionStore::load_from_path(temp_connections_path(&temp_dir), secrets.clone())
                .expect("failed to load store");
        let created = store.create(&mysql_fields("local")).expect("create");

        store.delete(created.id).expect("delete");
        assert!(store.profile(created.id).is_none());
        assert!(!secrets.has_password(created.id));

        let err = store.delete(created.id).expect_err("second delete");
        assert!(matches!(err, ProfilesError::NotFound(_)));
    }

    #[test]
    fn only_one_profile_is_active_at_a_time() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let mut store = FileConnectionStore::load_from_path(
            temp_connections_path(&temp_dir),
            Arc::new(MemorySecretStore::new()),
        )
        .expect("failed to load store");
        let one = store.create(&mysql_fields("one")).expect("create");
        let two = store.create(&mysql_fields("two")).expect("create");

        store.mark_active(one.id).expect("activate one");
        let active = store.mark_active(two.id).expect("activate two");
        assert!(active.last_connected.is_some());
        assert_eq!(store.active().map(|profile| profile.id), Some(two.id));
        assert!(!store.profile(one.id).expect("one exists").is_active);

        assert_eq!(store.clear_active(), Some(two.id));
        assert!(store.active().is_none());
        assert_eq!(store.clear_active(), None);
    }
}
