use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use crate::profiles::ConnectionProfile;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub server_version: String,
    pub latency: Duration,
}

#[async_trait]
pub trait ConnectionBackend {
    type Connection: Send;

    async fn connect(&self, profile: &ConnectionProfile) -> Result<Self::Connection, BackendError>;
    async fn ping(&self, connection: &mut Self::Connection) -> Result<(), BackendError>;
    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError>;
    /// One-off reachability check for settings that may not be saved yet.
    async fn server_info(&self, profile: &ConnectionProfile) -> Result<ServerInfo, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTestReport {
    pub success: bool,
    pub message: String,
    pub server_version: Option<String>,
    pub latency: Option<Duration>,
}

impl ConnectionTestReport {
    /// A failed test has no server to report on.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            server_version: None,
            latency: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub profile_id: Option<u64>,
    pub profile_name: Option<String>,
    pub is_connected: bool,
    pub last_latency: Option<Duration>,
}

impl ConnectionStatus {
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            profile_id: None,
            profile_name: None,
            is_connected: false,
            last_latency: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectionManagerError {
    #[error("connection backend failed: {0}")]
    Backend(#[source] BackendError),
}

#[derive(Debug)]
struct ActiveConnection<C> {
    profile: ConnectionProfile,
    handle: C,
}

#[derive(Debug)]
pub struct ConnectionManager<B: ConnectionBackend> {
    backend: B,
    active: Option<ActiveConnection<B::Connection>>,
    last_latency: Option<Duration>,
}

impl<B: ConnectionBackend> ConnectionManager<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            active: None,
            last_latency: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            profile_id: self.active.as_ref().map(|active| active.profile.id),
            profile_name: self
                .active
                .as_ref()
                .map(|active| active.profile.name.clone()),
            is_connected: self.active.is_some(),
            last_latency: self.last_latency,
        }
    }

    #[must_use]
    pub fn active_profile(&self) -> Option<&ConnectionProfile> {
        self.active.as_ref().map(|active| &active.profile)
    }

    /// Connects to `profile`. Connecting to the profile that is already active
    /// is a no-op; connecting to another one closes the current connection
    /// first.
    pub async fn connect(
        &mut self,
        profile: ConnectionProfile,
    ) -> Result<Duration, ConnectionManagerError> {
        if let Some(active) = &self.active {
            if active.profile.id == profile.id {
                return Ok(self.last_latency.unwrap_or_default());
            }
            self.disconnect().await?;
        }

        let started_at = Instant::now();
        let mut handle = self
            .backend
            .connect(&profile)
            .await
            .map_err(ConnectionManagerError::Backend)?;
        self.backend
            .ping(&mut handle)
            .await
            .map_err(ConnectionManagerError::Backend)?;

        let latency = started_at.elapsed();
        self.last_latency = Some(latency);
        self.active = Some(ActiveConnection { profile, handle });

        Ok(latency)
    }

    pub async fn test_connection(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<ConnectionTestReport, ConnectionManagerError> {
        let info = self
            .backend
            .server_info(profile)
            .await
            .map_err(ConnectionManagerError::Backend)?;

        Ok(ConnectionTestReport {
            success: true,
            message: "Connection successful".to_string(),
            server_version: Some(info.server_version),
            latency: Some(info.latency),
        })
    }

    pub async fn disconnect(&mut self) -> Result<(), ConnectionManagerError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };

        self.backend
            .disconnect(active.handle)
            .await
            .map_err(ConnectionManagerError::Backend)?;
        self.last_latency = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };
    use std::time::Duration;

    use super::{
        BackendError, ConnectionBackend, ConnectionManager, ConnectionManagerError,
        ConnectionStatus, ServerInfo,
    };
    use crate::profiles::{ConnectionProfile, DatabaseKind};

    #[derive(Debug, Default)]
    struct FakeBackend {
        connect_calls: AtomicUsize,
        disconnect_calls: AtomicUsize,
        fail_connect: AtomicUsize,
        fail_ping: AtomicUsize,
        fail_server_info: AtomicUsize,
        ping_calls: AtomicUsize,
    }

    #[derive(Debug)]
    struct FakeConnection {
        _state: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl ConnectionBackend for FakeBackend {
        type Connection = FakeConnection;

        async fn connect(
            &self,
            _profile: &ConnectionProfile,
        ) -> Result<Self::Connection, BackendError> {
            self.connect_calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_connect.load(Ordering::Relaxed) > 0 {
                self.fail_connect.fetch_sub(1, Ordering::Relaxed);
                return Err(BackendError::new("connect failed"));
            }

            Ok(FakeConnection {
                _state: Mutex::new(0),
            })
        }

        async fn ping(&self, _connection: &mut Self::Connection) -> Result<(), BackendError> {
            self.ping_calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_ping.load(Ordering::Relaxed) > 0 {
                self.fail_ping.fetch_sub(1, Ordering::Relaxed);
                return Err(BackendError::new("ping failed"));
            }
            Ok(())
        }

        async fn disconnect(&self, _connection: Self::Connection) -> Result<(), BackendError> {
            self.disconnect_calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn server_info(&self, _profile: &ConnectionProfile) -> Result<ServerInfo, BackendError> {
            if self.fail_server_info.load(Ordering::Relaxed) > 0 {
                return Err(BackendError::new("Unable to reach database server"));
            }
            Ok(ServerInfo {
                server_version: "8.0.33".to_string(),
                latency: Duration::from_millis(42),
            })
        }
    }

    fn sample_profile(id: u64) -> ConnectionProfile {
        let mut profile = ConnectionProfile::new("local", DatabaseKind::Mysql, "app");
        profile.id = id;
        profile
    }

    #[tokio::test]
    async fn connect_updates_status_and_profile() {
        let mut manager = ConnectionManager::new(FakeBackend::default());

        let latency = manager
            .connect(sample_profile(1))
            .await
            .expect("connect should succeed");
        assert!(latency >= Duration::ZERO);

        let status = manager.status();
        assert!(status.is_connected);
        assert_eq!(status.profile_id, Some(1));
        assert_eq!(status.profile_name.as_deref(), Some("local"));
        assert!(status.last_latency.is_some());
    }

    #[tokio::test]
    async fn reconnecting_the_active_profile_is_a_no_op() {
        let mut manager = ConnectionManager::new(FakeBackend::default());
        manager
            .connect(sample_profile(1))
            .await
            .expect("first connect should succeed");
        manager
            .connect(sample_profile(1))
            .await
            .expect("repeat connect should succeed");

        let backend = &manager.backend;
        assert_eq!(backend.connect_calls.load(Ordering::Relaxed), 1);
        assert_eq!(backend.disconnect_calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn connecting_another_profile_replaces_the_active_one() {
        let mut manager = ConnectionManager::new(FakeBackend::default());
        manager
            .connect(sample_profile(1))
            .await
            .expect("first connect should succeed");
        manager
            .connect(sample_profile(2))
            .await
            .expect("switch should succeed");

        assert_eq!(manager.status().profile_id, Some(2));
        assert_eq!(manager.backend.disconnect_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_clears_status() {
        let mut manager = ConnectionManager::new(FakeBackend::default());
        manager
            .connect(sample_profile(1))
            .await
            .expect("connect should succeed");
        manager
            .disconnect()
            .await
            .expect("disconnect should succeed");
        manager
            .disconnect()
            .await
            .expect("disconnect should stay idempotent");

        assert_eq!(manager.status(), ConnectionStatus::disconnected());
    }

    #[tokio::test]
    async fn failed_connect_does_not_set_active_connection() {
        let backend = FakeBackend {
            fail_connect: AtomicUsize::new(1),
            ..FakeBackend::default()
        };
        let mut manager = ConnectionManager::new(backend);

        let err = manager
            .connect(sample_profile(1))
            .await
            .expect_err("connect should fail");
        assert!(matches!(err, ConnectionManagerError::Backend(_)));
        assert!(manager.active_profile().is_none());
    }

    #[tokio::test]
    async fn test_connection_reports_server_info() {
        let manager = ConnectionManager::new(FakeBackend::default());
        let report = manager
            .test_connection(&sample_profile(0))
            .await
            .expect("server info should load");
        assert!(report.success);
        assert_eq!(report.server_version.as_deref(), Some("8.0.33"));
        assert_eq!(report.latency, Some(Duration::from_millis(42)));
        assert!(manager.active_profile().is_none());

        let failing = ConnectionManager::new(FakeBackend {
            fail_server_info: AtomicUsize::new(1),
            ..FakeBackend::default()
        });
        let err = failing
            .test_connection(&sample_profile(0))
            .await
            .expect_err("server info should fail");
        assert_eq!(
            err.to_string(),
            "connection backend failed: Unable to reach database server"
        );
    }
}
