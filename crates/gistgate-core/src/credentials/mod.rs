//! Credential storage port and the rotation ledger built on top of it.
//!
//! A provider's credentials are two named values in a [`CredentialStore`]:
//! the primary key under [`PRIMARY_KEY`] and additional keys under
//! [`EXTRA_KEYS`]. The store is re-read on every ledger call so edits made
//! by an operator take effect without a restart.

pub mod clock;
pub mod ledger;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use gistgate_types::error::CredentialStoreError;
use gistgate_types::llm::ProviderId;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{CoolingKey, CredentialLedger, LedgerSettings, RotationSnapshot, RotationState, RotationStore};

/// Name of the primary credential value.
pub const PRIMARY_KEY: &str = "api_key";

/// Name of the additional-credentials list.
pub const EXTRA_KEYS: &str = "extra_keys";

/// The keys one backing store holds for a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialLayer {
    /// Store name, as reported by [`CredentialStore::name`].
    pub source: String,
    pub primary: Option<String>,
    pub extra: Vec<String>,
    /// Whether writes to the store are accepted.
    pub writable: bool,
}

/// Read/write access to per-provider named credential values.
///
/// Synchronous: the ledger calls this on every lookup and never awaits.
/// Implementations live in `gistgate-infra` (file, environment, chain);
/// [`MemoryCredentialStore`] is provided here for composition and tests.
pub trait CredentialStore: Send + Sync {
    /// Display name of the backend (for `keys list` output and logs).
    fn name(&self) -> &str;

    fn get_string(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Option<String>, CredentialStoreError>;

    /// A missing list is an empty list.
    fn get_list(&self, provider: ProviderId, name: &str)
    -> Result<Vec<String>, CredentialStoreError>;

    fn set_string(
        &self,
        provider: ProviderId,
        name: &str,
        value: &str,
    ) -> Result<(), CredentialStoreError>;

    fn set_list(
        &self,
        provider: ProviderId,
        name: &str,
        values: &[String],
    ) -> Result<(), CredentialStoreError>;

    /// Whether every write fails with [`CredentialStoreError::ReadOnly`].
    fn is_read_only(&self) -> bool {
        false
    }

    /// Keys per backing store, in priority order.
    ///
    /// Composite stores return one layer per member so callers can tell
    /// which keys a write can actually change.
    fn layers(&self, provider: ProviderId) -> Result<Vec<CredentialLayer>, CredentialStoreError> {
        Ok(vec![CredentialLayer {
            source: self.name().to_string(),
            primary: self.get_string(provider, PRIMARY_KEY)?,
            extra: self.get_list(provider, EXTRA_KEYS)?,
            writable: !self.is_read_only(),
        }])
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_string(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Option<String>, CredentialStoreError> {
        (**self).get_string(provider, name)
    }

    fn get_list(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Vec<String>, CredentialStoreError> {
        (**self).get_list(provider, name)
    }

    fn set_string(
        &self,
        provider: ProviderId,
        name: &str,
        value: &str,
    ) -> Result<(), CredentialStoreError> {
        (**self).set_string(provider, name, value)
    }

    fn set_list(
        &self,
        provider: ProviderId,
        name: &str,
        values: &[String],
    ) -> Result<(), CredentialStoreError> {
        (**self).set_list(provider, name, values)
    }

    fn is_read_only(&self) -> bool {
        (**self).is_read_only()
    }

    fn layers(&self, provider: ProviderId) -> Result<Vec<CredentialLayer>, CredentialStoreError> {
        (**self).layers(provider)
    }
}

#[derive(Debug, Clone)]
enum StoredValue {
    Single(String),
    List(Vec<String>),
}

/// In-process credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: RwLock<HashMap<(ProviderId, String), StoredValue>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor: primary key plus extra keys for one provider.
    pub fn with_keys(provider: ProviderId, primary: &str, extra: &[&str]) -> Self {
        let store = Self::new();
        if let Ok(mut values) = store.values.write() {
            values.insert(
                (provider, PRIMARY_KEY.to_string()),
                StoredValue::Single(primary.to_string()),
            );
            values.insert(
                (provider, EXTRA_KEYS.to_string()),
                StoredValue::List(extra.iter().map(|k| k.to_string()).collect()),
            );
        }
        store
    }

    fn lock_error() -> CredentialStoreError {
        CredentialStoreError::Io("credential map lock poisoned".to_string())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_string(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Option<String>, CredentialStoreError> {
        let values = self.values.read().map_err(|_| Self::lock_error())?;
        Ok(match values.get(&(provider, name.to_string())) {
            Some(StoredValue::Single(value)) => Some(value.clone()),
            Some(StoredValue::List(list)) => list.first().cloned(),
            None => None,
        })
    }

    fn get_list(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Vec<String>, CredentialStoreError> {
        let values = self.values.read().map_err(|_| Self::lock_error())?;
        Ok(match values.get(&(provider, name.to_string())) {
            Some(StoredValue::List(list)) => list.clone(),
            Some(StoredValue::Single(value)) => vec![value.clone()],
            None => Vec::new(),
        })
    }

    fn set_string(
        &self,
        provider: ProviderId,
        name: &str,
        value: &str,
    ) -> Result<(), CredentialStoreError> {
        let mut values = self.values.write().map_err(|_| Self::lock_error())?;
        values.insert(
            (provider, name.to_string()),
            StoredValue::Single(value.to_string()),
        );
        Ok(())
    }

    fn set_list(
        &self,
        provider: ProviderId,
        name: &str,
        values: &[String],
    ) -> Result<(), CredentialStoreError> {
        let mut map = self.values.write().map_err(|_| Self::lock_error())?;
        map.insert(
            (provider, name.to_string()),
            StoredValue::List(values.to_vec()),
        );
        Ok(())
    }
}
