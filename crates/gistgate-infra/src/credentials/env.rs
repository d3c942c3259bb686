//! Environment variable credential store.
//!
//! Read-only. Checks the provider's conventional key variable for the
//! primary credential and `GISTGATE_<PROVIDER>_EXTRA_KEYS` (comma-separated)
//! for additional ones:
//!
//! | Provider        | Primary                                  |
//! |-----------------|------------------------------------------|
//! | `openai`        | `OPENAI_API_KEY`                         |
//! | `anthropic`     | `ANTHROPIC_API_KEY`                      |
//! | `google`        | `GEMINI_API_KEY`, then `GOOGLE_API_KEY`  |
//! | `openrouter`    | `OPENROUTER_API_KEY`                     |
//! | `openai-compat` | `OPENAI_COMPAT_API_KEY`                  |

use gistgate_core::credentials::{CredentialStore, EXTRA_KEYS, PRIMARY_KEY};
use gistgate_types::error::CredentialStoreError;
use gistgate_types::llm::ProviderId;

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable credential store.
///
/// `set_string()` and `set_list()` return [`CredentialStoreError::ReadOnly`]
/// because environment variables cannot be persistently modified.
pub struct EnvCredentialStore {
    lookup: Lookup,
}

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve variables through `lookup` instead of the process environment.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    /// Variables holding the primary key, in priority order.
    pub fn primary_vars(provider: ProviderId) -> &'static [&'static str] {
        match provider {
            ProviderId::OpenAi => &["OPENAI_API_KEY"],
            ProviderId::Anthropic => &["ANTHROPIC_API_KEY"],
            ProviderId::Google => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderId::OpenRouter => &["OPENROUTER_API_KEY"],
            ProviderId::OpenAiCompat => &["OPENAI_COMPAT_API_KEY"],
        }
    }

    pub fn extra_keys_var(provider: ProviderId) -> String {
        format!(
            "GISTGATE_{}_EXTRA_KEYS",
            provider.as_str().replace('-', "_").to_uppercase()
        )
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for EnvCredentialStore {
    fn name(&self) -> &str {
        "environment"
    }

    fn get_string(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Option<String>, CredentialStoreError> {
        if name != PRIMARY_KEY {
            return Ok(None);
        }
        Ok(Self::primary_vars(provider)
            .iter()
            .find_map(|var| self.var(var)))
    }

    fn get_list(
        &self,
        provider: ProviderId,
        name: &str,
    ) -> Result<Vec<String>, CredentialStoreError> {
        if name != EXTRA_KEYS {
            return Ok(Vec::new());
        }
        Ok(self
            .var(&Self::extra_keys_var(provider))
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn set_string(
        &self,
        _provider: ProviderId,
        _name: &str,
        _value: &str,
    ) -> Result<(), CredentialStoreError> {
        Err(CredentialStoreError::ReadOnly)
    }

    fn set_list(
        &self,
        _provider: ProviderId,
        _name: &str,
        _values: &[String],
    ) -> Result<(), CredentialStoreError> {
        Err(CredentialStoreError::ReadOnly)
    }
}
