//! Provider adapter implementations.
//!
//! Contains concrete implementations of the [`ProviderAdapter`] trait defined
//! in `gistgate-core`, plus a factory ([`create_adapter`]) and
//! [`build_registry`], which registers one adapter per known provider.
//!
//! [`ProviderAdapter`]: gistgate_core::llm::provider::ProviderAdapter

pub mod anthropic;
pub mod google;
pub mod openai_compat;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use gistgate_core::credentials::CredentialLedger;
use gistgate_core::llm::box_provider::BoxProviderAdapter;
use gistgate_core::llm::registry::ProviderRegistry;
use gistgate_core::llm::transport::HttpTransport;
use gistgate_types::llm::ProviderId;

use self::anthropic::AnthropicAdapter;
use self::google::GoogleAdapter;
use self::openai_compat::OpenAiCompatibleAdapter;
use self::openai_compat::config::{
    openai_compat_defaults, openai_defaults, openrouter_defaults,
};

/// Create a [`BoxProviderAdapter`] for `id` over a shared transport.
///
/// Adapters hold no credential of their own; every call asks `ledger` for
/// the current key.
pub fn create_adapter<T: HttpTransport + 'static>(
    id: ProviderId,
    transport: Arc<T>,
    ledger: Arc<CredentialLedger>,
) -> BoxProviderAdapter {
    match id {
        ProviderId::OpenAi => {
            BoxProviderAdapter::new(OpenAiCompatibleAdapter::new(transport, ledger, openai_defaults()))
        }
        ProviderId::OpenRouter => BoxProviderAdapter::new(OpenAiCompatibleAdapter::new(
            transport,
            ledger,
            openrouter_defaults(),
        )),
        ProviderId::OpenAiCompat => BoxProviderAdapter::new(OpenAiCompatibleAdapter::new(
            transport,
            ledger,
            openai_compat_defaults(),
        )),
        ProviderId::Anthropic => BoxProviderAdapter::new(AnthropicAdapter::new(transport, ledger)),
        ProviderId::Google => BoxProviderAdapter::new(GoogleAdapter::new(transport, ledger)),
    }
}

/// Registry with an adapter for every [`ProviderId`].
pub fn build_registry<T: HttpTransport + 'static>(
    transport: Arc<T>,
    ledger: Arc<CredentialLedger>,
) -> ProviderRegistry {
    let adapters = ProviderId::ALL
        .into_iter()
        .map(|id| create_adapter(id, Arc::clone(&transport), Arc::clone(&ledger)))
        .collect();
    let registry = ProviderRegistry::new(adapters);
    tracing::debug!(providers = ?registry.list(), "provider registry built");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{RecordingTransport, Reply, ledger};

    #[test]
    fn test_registry_has_every_provider() {
        let registry = build_registry(
            RecordingTransport::new(vec![]),
            ledger(ProviderId::OpenAi, "sk-1"),
        );
        assert_eq!(registry.len(), ProviderId::ALL.len());
        assert_eq!(
            registry.list(),
            vec!["anthropic", "google", "openai", "openai-compat", "openrouter"]
        );
        for id in ProviderId::ALL {
            let adapter = registry.get(id.as_str()).unwrap();
            assert_eq!(adapter.id(), id);
            assert!(!adapter.defaults().endpoint.is_empty());
            assert!(!adapter.defaults().model.is_empty());
        }
    }

    #[tokio::test]
    async fn test_boxed_adapter_dispatches_through_registry() {
        let transport = RecordingTransport::new(vec![Reply::Body(
            200,
            r#"{"choices":[{"message":{"content":"pong"}}]}"#.to_string(),
        )]);
        let registry = build_registry(Arc::clone(&transport), ledger(ProviderId::OpenRouter, "sk-or-1"));
        let adapter = registry.get("OpenRouter").unwrap();
        let defaults = adapter.defaults();
        let options = gistgate_types::llm::RequestOptions::new(defaults.endpoint, defaults.model);

        let result = adapter.test_connection(&options).await.unwrap();
        assert!(result.contains("pong"));
        assert_eq!(
            transport.requests()[0].url,
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }
}
