use datalink_core::secrets::{SecretStore, SecretStoreError};

pub const DEFAULT_KEYRING_SERVICE: &str = "datalink";

/// Connection passwords kept in the operating system keyring, one entry per
/// connection id.
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEYRING_SERVICE)
    }
}

impl KeyringSecretStore {
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }
}

fn account_for(connection_id: u64) -> String {
    format!("connection-{connection_id}")
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
impl KeyringSecretStore {
    fn entry(&self, connection_id: u64) -> Result<keyring::Entry, SecretStoreError> {
        keyring::Entry::new(&self.service, &account_for(connection_id))
            .map_err(|err| SecretStoreError::new(format!("keyring unavailable: {err}")))
    }
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
impl SecretStore for KeyringSecretStore {
    fn store_password(&self, connection_id: u64, password: &str) -> Result<(), SecretStoreError> {
        self.entry(connection_id)?
            .set_password(password)
            .map_err(|err| SecretStoreError::new(format!("failed to store password: {err}")))
    }

    fn forget_password(&self, connection_id: u64) -> Result<(), SecretStoreError> {
        match self.entry(connection_id)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(SecretStoreError::new(format!(
                "failed to remove password: {err}"
            ))),
        }
    }

    fn has_password(&self, connection_id: u64) -> bool {
        self.entry(connection_id)
            .and_then(|entry| {
                entry
                    .get_password()
                    .map_err(|err| SecretStoreError::new(err.to_string()))
            })
            .is_ok_and(|password| !password.is_empty())
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
impl SecretStore for KeyringSecretStore {
    fn store_password(&self, connection_id: u64, _password: &str) -> Result<(), SecretStoreError> {
        Err(SecretStoreError::new(format!(
            "no keyring on this platform for {}",
            account_for(connection_id)
        )))
    }

    fn forget_password(&self, _connection_id: u64) -> Result<(), SecretStoreError> {
        Ok(())
    }

    fn has_password(&self, _connection_id: u64) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{account_for, KeyringSecretStore, DEFAULT_KEYRING_SERVICE};

    #[test]
    fn accounts_are_keyed_by_connection_id() {
        assert_eq!(account_for(7), "connection-7");
        assert_eq!(KeyringSecretStore::default().service(), DEFAULT_KEYRING_SERVICE);
    }

    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    #[test]
    fn mock_keyring_accepts_writes_and_missing_deletes() {
        use datalink_core::secrets::SecretStore;

        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let store = KeyringSecretStore::new("datalink-test");

        store.store_password(1, "hunter2").expect("store password");
        store
            .forget_password(2)
            .expect("forgetting an unknown entry is fine");
    }
}
