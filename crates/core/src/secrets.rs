use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SecretStoreError {
    message: String,
}

impl SecretStoreError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Write-only password storage keyed by connection id. Passwords go in and
/// never come back out through this interface.
pub trait SecretStore: Send + Sync + fmt::Debug {
    fn store_password(&self, connection_id: u64, password: &str) -> Result<(), SecretStoreError>;
    fn forget_password(&self, connection_id: u64) -> Result<(), SecretStoreError>;
    fn has_password(&self, connection_id: u64) -> bool;
}

#[derive(Debug, Default)]
pub struct MemorySecretStore {
    passwords: Mutex<HashMap<u64, String>>,
}

impl MemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_passwords<T>(
        &self,
        apply: impl FnOnce(&mut HashMap<u64, String>) -> T,
    ) -> Result<T, SecretStoreError> {
        let mut passwords = self
            .passwords
            .lock()
            .map_err(|_| SecretStoreError::new("secret store lock poisoned"))?;
        Ok(apply(&mut passwords))
    }
}

impl SecretStore for MemorySecretStore {
    fn store_password(&self, connection_id: u64, password: &str) -> Result<(), SecretStoreError> {
        self.with_passwords(|passwords| {
            passwords.insert(connection_id, password.to_string());
        })
    }

    fn forget_password(&self, connection_id: u64) -> Result<(), SecretStoreError> {
        self.with_passwords(|passwords| {
            passwords.remove(&connection_id);
        })
    }

    fn has_password(&self, connection_id: u64) -> bool {
        self.with_passwords(|passwords| passwords.contains_key(&connection_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{MemorySecretStore, SecretStore};

    #[test]
    fn stores_and_forgets_passwords_by_connection_id() {
        let store = MemorySecretStore::new();
        assert!(!store.has_password(1));

        store.store_password(1, "hunter2").expect("store password");
        assert!(store.has_password(1));
        assert!(!store.has_password(2));

        store.forget_password(1).expect("forget password");
        assert!(!store.has_password(1));
        store.forget_password(1).expect("forgetting twice is fine");
    }
}
