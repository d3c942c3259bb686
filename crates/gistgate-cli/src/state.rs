//! Application state wiring the gateway together.
//!
//! Pins the core ports to the concrete infra implementations: the
//! environment + file credential chain, the reqwest transport and one
//! adapter per provider.

use std::path::PathBuf;
use std::sync::Arc;

use gistgate_core::credentials::{CredentialLedger, LedgerSettings, RotationStore};
use gistgate_core::gateway::Gateway;
use gistgate_infra::config::load_gateway_config;
use gistgate_infra::credentials::build_credential_chain;
use gistgate_infra::filesystem::{credentials_path, resolve_data_dir};
use gistgate_infra::http::ReqwestTransport;
use gistgate_infra::llm::build_registry;

pub struct AppState {
    pub gateway: Gateway,
    pub ledger: Arc<CredentialLedger>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config, build the credential chain and register every provider.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_gateway_config(&data_dir).await;
        let store = build_credential_chain(&credentials_path(&data_dir), true);
        let settings = LedgerSettings {
            failed_key_cooldown: config.failed_key_cooldown(),
            max_switch_count: config.max_switch_count,
        };
        let ledger = Arc::new(CredentialLedger::new(
            Arc::new(store),
            Arc::new(RotationStore::new()),
            settings,
        ));

        let transport = Arc::new(ReqwestTransport::new()?);
        let registry = build_registry(transport, Arc::clone(&ledger));
        tracing::debug!(data_dir = %data_dir.display(), providers = registry.len(), "state initialized");

        Ok(Self {
            gateway: Gateway::new(registry, Arc::clone(&ledger), config),
            ledger,
            data_dir,
        })
    }
}
