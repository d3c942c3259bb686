//! Credential chain: stores consulted in priority order.
//!
//! Reads return the first non-empty answer. Writes go to the first store
//! that accepts them, skipping read-only ones. [`CredentialStore::layers`]
//! reports every member, so a key set in the environment never hides the
//! keys stored in the file.
//!
//! Default chain order: `[EnvCredentialStore, FileCredentialStore]`

use std::path::Path;
use std::sync::Arc;

use gistgate_core::credentials::{CredentialLayer, CredentialStore};
use gistgate_types::error::CredentialStoreError;
use gistgate_types::llm::ProviderId;

use super::env::EnvCredentialStore;
use super::file::FileCredentialStore;

pub struct ChainCredentialStore {
    stores: Vec<Arc<dyn CredentialStore>>,
    name: String,
}

impl ChainCredentialStore {
    pub fn new(stores: Vec<Arc<dyn CredentialStore>>) -> Self {
        let name = stores
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(" > ");
        Self { stores, name }
    }

    fn write(
        &self,
        mut apply: impl FnMut(&dyn CredentialStore) -> Result<(), CredentialStoreError>,
    ) -> Result<(), CredentialStoreError> {
        for store in &self.stores {
            match apply(store.as_ref()) {
                Err(CredentialStoreError::ReadOnly) => continue,
                other => return other,
            }
        }
        Err(CredentialStoreError::ReadOnly)
    }
}

impl CredentialStore for ChainCredentialStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_string(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Option<String>, CredentialStoreError> {
        for store in &self.stores {
            if let Some(value) = store.get_string(provider, name)?
                && !value.trim().is_empty()
            {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn get_list(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Vec<String>, CredentialStoreError> {
        for store in &self.stores {
            let values = store.get_list(provider, name)?;
            if !values.is_empty() {
                return Ok(values);
            }
        }
        Ok(Vec::new())
    }

    fn set_string(
        &self,
        provider: ProviderId,
        name: &str,
        value: &str,
    ) -> Result<(), CredentialStoreError> {
        self.write(|store| store.set_string(provider, name, value))
    }

    fn set_list(
        &self,
        provider: ProviderId,
        name: &str,
        values: &[String],
    ) -> Result<(), CredentialStoreError> {
        self.write(|store| store.set_list(provider, name, values))
    }

    fn is_read_only(&self) -> bool {
        self.stores.iter().all(|s| s.is_read_only())
    }

    /// Layers of every member; a member that fails to read is skipped.
    fn layers(&self, provider: ProviderId) -> Result<Vec<CredentialLayer>, CredentialStoreError> {
        let mut layers = Vec::new();
        for store in &self.stores {
            match store.layers(provider) {
                Ok(found) => layers.extend(found),
                Err(e) => {
                    tracing::warn!(
                        provider = %provider,
                        store = store.name(),
                        error = %e,
                        "skipping unreadable credential store"
                    );
                }
            }
        }
        Ok(layers)
    }
}

/// Build the default credential chain.
///
/// 1. Environment variables (if `include_env` is true)
/// 2. `credentials.toml` at `credentials_path` (always included)
pub fn build_credential_chain(credentials_path: &Path, include_env: bool) -> ChainCredentialStore {
    let mut chain: Vec<Arc<dyn CredentialStore>> = Vec::new();

    if include_env {
        chain.push(Arc::new(EnvCredentialStore::new()));
    }
    chain.push(Arc::new(FileCredentialStore::new(credentials_path)));

    ChainCredentialStore::new(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gistgate_core::credentials::{
        CredentialLedger, EXTRA_KEYS, LedgerSettings, MemoryCredentialStore, PRIMARY_KEY,
        RotationStore,
    };
    use tempfile::TempDir;

    fn env(vars: &'static [(&'static str, &'static str)]) -> Arc<dyn CredentialStore> {
        Arc::new(EnvCredentialStore::with_lookup(move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }))
    }

    #[test]
    fn test_first_non_empty_read_wins() {
        let file: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::with_keys(
            ProviderId::OpenAi,
            "sk-file",
            &["sk-file-2"],
        ));
        let chain = ChainCredentialStore::new(vec![env(&[("OPENAI_API_KEY", "sk-env")]), file]);

        assert_eq!(
            chain.get_string(ProviderId::OpenAi, PRIMARY_KEY).unwrap().as_deref(),
            Some("sk-env")
        );
        // The environment has no extras for openai, so the file's list is used.
        assert_eq!(
            chain.get_list(ProviderId::OpenAi, EXTRA_KEYS).unwrap(),
            vec!["sk-file-2"]
        );
        assert_eq!(chain.name(), "environment > memory");
    }

    #[test]
    fn test_writes_skip_read_only_stores() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("credentials.toml");
        let file: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(&path));
        let chain = ChainCredentialStore::new(vec![env(&[]), file]);

        chain.set_string(ProviderId::Anthropic, PRIMARY_KEY, "sk-ant").unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("sk-ant"));
        assert_eq!(
            chain.get_string(ProviderId::Anthropic, PRIMARY_KEY).unwrap().as_deref(),
            Some("sk-ant")
        );
    }

    #[test]
    fn test_all_read_only_is_rejected() {
        let chain = ChainCredentialStore::new(vec![env(&[])]);
        assert!(matches!(
            chain.set_list(ProviderId::OpenAi, EXTRA_KEYS, &["k".to_string()]),
            Err(CredentialStoreError::ReadOnly)
        ));
    }

    #[test]
    fn test_default_chain_order() {
        let tmp = TempDir::new().unwrap();
        let chain = build_credential_chain(&tmp.path().join("credentials.toml"), true);
        assert_eq!(chain.name(), "environment > file");
        let chain = build_credential_chain(&tmp.path().join("credentials.toml"), false);
        assert_eq!(chain.name(), "file");
    }

    fn env_and_file(
        vars: &'static [(&'static str, &'static str)],
        tmp: &TempDir,
    ) -> (CredentialLedger, FileCredentialStore) {
        let path = tmp.path().join("credentials.toml");
        let chain = ChainCredentialStore::new(vec![
            env(vars),
            Arc::new(FileCredentialStore::new(&path)),
        ]);
        let ledger = CredentialLedger::new(
            Arc::new(chain),
            Arc::new(RotationStore::new()),
            LedgerSettings::default(),
        );
        (ledger, FileCredentialStore::new(&path))
    }

    fn key_list(ledger: &CredentialLedger) -> Vec<String> {
        ledger
            .get_all_keys(ProviderId::OpenAi)
            .iter()
            .map(|k| k.expose().to_string())
            .collect()
    }

    #[test]
    fn test_layers_report_every_member() {
        let tmp = TempDir::new().unwrap();
        let (ledger, file) = env_and_file(&[("OPENAI_API_KEY", "sk-env-1111")], &tmp);
        file.set_string(ProviderId::OpenAi, PRIMARY_KEY, "sk-file-0000").unwrap();

        let layers = ledger.store().layers(ProviderId::OpenAi).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].source, "environment");
        assert!(!layers[0].writable);
        assert!(layers[1].writable);
        assert!(!ledger.store().is_read_only());
        // The file's primary key is not hidden by the environment's.
        assert_eq!(key_list(&ledger), vec!["sk-env-1111", "sk-file-0000"]);
    }

    #[test]
    fn test_removing_environment_key_leaves_file_keys_alone() {
        let tmp = TempDir::new().unwrap();
        let (ledger, file) = env_and_file(&[("OPENAI_API_KEY", "sk-env-1111")], &tmp);
        file.set_list(
            ProviderId::OpenAi,
            EXTRA_KEYS,
            &["sk-a-2222".to_string(), "sk-b-3333".to_string()],
        )
        .unwrap();

        assert!(matches!(
            ledger.remove_key(ProviderId::OpenAi, "1111"),
            Err(CredentialStoreError::ReadOnly)
        ));
        assert_eq!(key_list(&ledger), vec!["sk-env-1111", "sk-a-2222", "sk-b-3333"]);
        assert_eq!(file.get_string(ProviderId::OpenAi, PRIMARY_KEY).unwrap(), None);

        assert_eq!(ledger.remove_key(ProviderId::OpenAi, "2222").unwrap(), 1);
        assert_eq!(key_list(&ledger), vec!["sk-env-1111", "sk-b-3333"]);
    }
}
