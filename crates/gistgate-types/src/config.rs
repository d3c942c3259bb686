//! Gateway configuration types.
//!
//! `GatewayConfig` represents the top-level `config.toml` that controls key
//! rotation bounds, provider fallback order and per-provider request options.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::llm::{ProviderId, RequestOptions};

/// Top-level configuration for the gateway.
///
/// Loaded from `~/.gistgate/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// How long a failed credential is skipped before it becomes eligible again.
    #[serde(default = "default_failed_key_cooldown_secs")]
    pub failed_key_cooldown_secs: u64,

    /// Upper bound on credential switches for one logical request.
    #[serde(default = "default_max_switch_count")]
    pub max_switch_count: u32,

    /// Provider used when a command does not name one.
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Providers tried, in order, after the requested one is exhausted.
    #[serde(default)]
    pub fallback_providers: Vec<String>,

    /// Per-provider request settings keyed by provider id.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
}

fn default_failed_key_cooldown_secs() -> u64 {
    300
}

fn default_max_switch_count() -> u32 {
    3
}

fn default_provider() -> String {
    ProviderId::OpenAi.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            failed_key_cooldown_secs: default_failed_key_cooldown_secs(),
            max_switch_count: default_max_switch_count(),
            default_provider: default_provider(),
            fallback_providers: Vec::new(),
            providers: BTreeMap::new(),
        }
    }
}

impl GatewayConfig {
    pub fn failed_key_cooldown(&self) -> Duration {
        Duration::from_secs(self.failed_key_cooldown_secs)
    }

    /// Settings for a provider; defaults when the provider has no table.
    pub fn provider_settings(&self, provider: ProviderId) -> ProviderSettings {
        self.providers
            .iter()
            .find(|(name, _)| name.parse::<ProviderId>().ok() == Some(provider))
            .map(|(_, settings)| settings.clone())
            .unwrap_or_default()
    }

    /// Check that every provider name refers to a known provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = std::iter::once(&self.default_provider)
            .chain(self.fallback_providers.iter())
            .chain(self.providers.keys());
        for name in names {
            if name.parse::<ProviderId>().is_err() {
                return Err(ConfigError::UnknownProvider(name.clone()));
            }
        }
        for (name, settings) in &self.providers {
            if settings.timeout_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("providers.{name}.timeout_secs"),
                    reason: "must be greater than zero".to_string(),
                });
            }
            if let Some(t) = settings.temperature
                && !(0.0..=2.0).contains(&t)
            {
                return Err(ConfigError::InvalidValue {
                    field: format!("providers.{name}.temperature"),
                    reason: format!("{t} is outside 0.0..=2.0"),
                });
            }
        }
        Ok(())
    }
}

/// Request settings for a single provider.
///
/// Unset sampling parameters stay unset all the way to the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_stream() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stream: default_stream(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderSettings {
    /// Resolve into concrete request options, filling endpoint/model from
    /// the provider's defaults when the operator left them unset.
    pub fn to_request_options(&self, default_endpoint: &str, default_model: &str) -> RequestOptions {
        RequestOptions {
            endpoint: self
                .endpoint
                .clone()
                .unwrap_or_else(|| default_endpoint.to_string()),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stream: self.stream,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}
