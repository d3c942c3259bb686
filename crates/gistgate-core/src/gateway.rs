//! Ledger-aware retry loop and provider fallback.
//!
//! A request goes to the requested provider first. Errors that another
//! credential could fix rotate the ledger and retry, at most
//! `max_switch_count` times. When the provider is exhausted the same loop
//! runs over each configured fallback provider. Any other error returns
//! immediately. Every success advances the provider's round robin.

use std::sync::Arc;

use gistgate_types::config::GatewayConfig;
use gistgate_types::error::GatewayError;
use gistgate_types::llm::{ConversationMessage, DocumentContent, ProviderId, RequestOptions};

use crate::credentials::CredentialLedger;
use crate::llm::box_provider::BoxProviderAdapter;
use crate::llm::registry::ProviderRegistry;
use crate::llm::sink::ProgressSink;

/// Result of a request that succeeded on some provider.
#[derive(Debug, Clone)]
pub struct GatewayResult {
    pub text: String,
    /// Provider that produced `text`.
    pub provider: ProviderId,
    /// Total HTTP attempts across credentials and providers.
    pub attempts: u32,
    /// Set when a fallback provider answered instead of the requested one.
    pub failover_warning: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Operation<'a> {
    Summary {
        content: &'a DocumentContent,
        is_multimodal: bool,
        prompt: &'a str,
    },
    Chat {
        content: &'a DocumentContent,
        is_multimodal: bool,
        history: &'a [ConversationMessage],
    },
    MultiFile {
        files: &'a [DocumentContent],
        prompt: &'a str,
    },
}

pub struct Gateway {
    registry: ProviderRegistry,
    ledger: Arc<CredentialLedger>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(registry: ProviderRegistry, ledger: Arc<CredentialLedger>, config: GatewayConfig) -> Self {
        Self {
            registry,
            ledger,
            config,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<CredentialLedger> {
        &self.ledger
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn default_provider(&self) -> &str {
        &self.config.default_provider
    }

    /// Request options for a provider: its config table over its defaults.
    pub fn options_for(&self, provider: &str) -> Result<RequestOptions, GatewayError> {
        let adapter = self.adapter(provider)?;
        Ok(self.resolve_options(adapter))
    }

    pub async fn generate_summary(
        &self,
        provider: &str,
        content: &DocumentContent,
        is_multimodal: bool,
        prompt: &str,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<GatewayResult, GatewayError> {
        let op = Operation::Summary {
            content,
            is_multimodal,
            prompt,
        };
        self.run(provider, op, progress).await
    }

    pub async fn chat(
        &self,
        provider: &str,
        content: &DocumentContent,
        is_multimodal: bool,
        history: &[ConversationMessage],
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<GatewayResult, GatewayError> {
        let op = Operation::Chat {
            content,
            is_multimodal,
            history,
        };
        self.run(provider, op, progress).await
    }

    pub async fn generate_multi_file_summary(
        &self,
        provider: &str,
        files: &[DocumentContent],
        prompt: &str,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<GatewayResult, GatewayError> {
        self.run(provider, Operation::MultiFile { files, prompt }, progress)
            .await
    }

    /// Single attempt with the current credential; no rotation, no fallback.
    pub async fn test_connection(&self, provider: &str) -> Result<String, GatewayError> {
        let adapter = self.adapter(provider)?;
        let options = self.resolve_options(adapter).with_stream(false);
        adapter.test_connection(&options).await
    }

    fn adapter(&self, provider: &str) -> Result<&BoxProviderAdapter, GatewayError> {
        self.registry
            .get(provider)
            .ok_or_else(|| GatewayError::UnknownProvider(provider.to_string()))
    }

    fn resolve_options(&self, adapter: &BoxProviderAdapter) -> RequestOptions {
        let defaults = adapter.defaults();
        self.config
            .provider_settings(adapter.id())
            .to_request_options(&defaults.endpoint, &defaults.model)
    }

    /// Requested adapter followed by registered, distinct fallbacks.
    fn chain(&self, provider: &str) -> Result<Vec<&BoxProviderAdapter>, GatewayError> {
        let mut chain = vec![self.adapter(provider)?];
        for name in &self.config.fallback_providers {
            match self.registry.get(name) {
                Some(adapter) if chain.iter().all(|a| a.id() != adapter.id()) => chain.push(adapter),
                Some(_) => {}
                None => tracing::warn!(provider = %name, "fallback provider is not registered"),
            }
        }
        Ok(chain)
    }

    async fn run(
        &self,
        provider: &str,
        op: Operation<'_>,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<GatewayResult, GatewayError> {
        let chain = self.chain(provider)?;
        let requested = chain[0].id();
        let max_switches = self.ledger.max_switch_count();
        let mut attempts = 0u32;
        let mut last_error: Option<GatewayError> = None;

        for (position, adapter) in chain.iter().enumerate() {
            let id = adapter.id();
            let options = self.resolve_options(adapter);
            let mut switches = 0u32;

            if position > 0 {
                tracing::warn!(from = %requested, to = %id, "failing over to fallback provider");
            }

            loop {
                attempts += 1;
                match dispatch(adapter, op, &options, progress.clone()).await {
                    Ok(text) => {
                        self.ledger.advance_to_next_key(id);
                        let failover_warning = (position > 0).then(|| {
                            format!("{requested} was unavailable; response generated by {id}")
                        });
                        return Ok(GatewayResult {
                            text,
                            provider: id,
                            attempts,
                            failover_warning,
                        });
                    }
                    Err(err) if err.is_key_failover() => {
                        tracing::warn!(
                            provider = %id,
                            attempt = attempts,
                            error = %err,
                            "request failed with a retryable error"
                        );
                        let rotated = self.ledger.rotate_to_next_key(id);
                        last_error = Some(err);
                        if rotated && switches < max_switches {
                            switches += 1;
                            continue;
                        }
                        break;
                    }
                    Err(err @ GatewayError::Configuration(_)) if position > 0 => {
                        tracing::warn!(provider = %id, error = %err, "skipping unconfigured fallback provider");
                        break;
                    }
                    Err(err) => {
                        tracing::error!(provider = %id, error = %err, "request failed");
                        return Err(err);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            GatewayError::Configuration(format!("no provider could serve the request for {requested}"))
        }))
    }
}

async fn dispatch(
    adapter: &BoxProviderAdapter,
    op: Operation<'_>,
    options: &RequestOptions,
    progress: Option<Arc<dyn ProgressSink>>,
) -> Result<String, GatewayError> {
    match op {
        Operation::Summary {
            content,
            is_multimodal,
            prompt,
        } => {
            adapter
                .generate_summary(content, is_multimodal, prompt, options, progress)
                .await
        }
        Operation::Chat {
            content,
            is_multimodal,
            history,
        } => {
            adapter
                .chat(content, is_multimodal, history, options, progress)
                .await
        }
        Operation::MultiFile { files, prompt } => {
            adapter
                .generate_multi_file_summary(files, prompt, options, progress)
                .await
        }
    }
}
