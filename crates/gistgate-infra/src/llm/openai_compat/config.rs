//! Per-provider defaults for backends speaking the OpenAI chat completions
//! protocol.
//!
//! Each factory returns an [`OpenAiCompatConfig`] with the provider's id,
//! default endpoint and model, and any extra headers it expects.

use gistgate_core::llm::provider::ProviderDefaults;
use gistgate_types::llm::ProviderId;

/// Configuration for an OpenAI-compatible provider.
///
/// Used to construct an [`super::OpenAiCompatibleAdapter`].
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub id: ProviderId,
    pub defaults: ProviderDefaults,
    /// Sent on every request in addition to `Authorization`.
    pub extra_headers: Vec<(String, String)>,
}

/// OpenAI.
///
/// Endpoint: `https://api.openai.com/v1/chat/completions`
pub fn openai_defaults() -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        id: ProviderId::OpenAi,
        defaults: ProviderDefaults {
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-4o-mini".into(),
        },
        extra_headers: Vec::new(),
    }
}

/// OpenRouter, identifying the calling application.
///
/// Endpoint: `https://openrouter.ai/api/v1/chat/completions`
pub fn openrouter_defaults() -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        id: ProviderId::OpenRouter,
        defaults: ProviderDefaults {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".into(),
            model: "openai/gpt-4o-mini".into(),
        },
        extra_headers: vec![("X-Title".into(), "gistgate".into())],
    }
}

/// Any self-hosted server exposing `/v1/chat/completions` (Ollama, vLLM,
/// LM Studio, ...). File parts are sent only for multimodal requests.
pub fn openai_compat_defaults() -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        id: ProviderId::OpenAiCompat,
        defaults: ProviderDefaults {
            endpoint: "http://localhost:11434/v1/chat/completions".into(),
            model: "llama3.1".into(),
        },
        extra_headers: Vec::new(),
    }
}
