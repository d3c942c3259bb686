//! LLM request types for gistgate.
//!
//! These types model the provider-agnostic side of a gateway call: which
//! backend to talk to, the document being summarized, the conversation so far,
//! and the per-request generation options.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Identifier of a supported AI backend.
///
/// Immutable and used as the lookup key for adapters, credentials and
/// rotation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "openai-compat")]
    OpenAiCompat,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl ProviderId {
    /// Every provider, in display order.
    pub const ALL: [ProviderId; 5] = [
        ProviderId::OpenAi,
        ProviderId::OpenAiCompat,
        ProviderId::Google,
        ProviderId::Anthropic,
        ProviderId::OpenRouter,
    ];

    /// Wire/lookup form of the id (always lower-case).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::OpenAiCompat => "openai-compat",
            ProviderId::Google => "google",
            ProviderId::Anthropic => "anthropic",
            ProviderId::OpenRouter => "openrouter",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderId::OpenAi),
            "openai-compat" | "openai_compat" => Ok(ProviderId::OpenAiCompat),
            "google" | "gemini" => Ok(ProviderId::Google),
            "anthropic" => Ok(ProviderId::Anthropic),
            "openrouter" => Ok(ProviderId::OpenRouter),
            other => Err(format!("invalid provider id: '{other}'")),
        }
    }
}

/// Role of a message in an LLM conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Map a stored role string onto a recognized role.
    ///
    /// Anything that is not `system`, `user` or `assistant` becomes `User`.
    pub fn normalize(raw: &str) -> Self {
        raw.parse().unwrap_or(MessageRole::User)
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A stored conversation turn.
///
/// `role` is kept as the raw stored string; adapters normalize it with
/// [`MessageRole::normalize`] when building a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// The normalized role of this turn.
    pub fn role(&self) -> MessageRole {
        MessageRole::normalize(&self.role)
    }
}

/// The document being summarized or discussed.
///
/// Produced by whatever extracted it (PDF reader, clipboard, file on disk);
/// the gateway never looks inside a binary payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentContent {
    /// Base64-encoded binary document (e.g. a PDF).
    Binary {
        filename: String,
        mime_type: String,
        data: String,
    },
    /// Already-extracted plain text.
    Text { filename: String, text: String },
}

impl DocumentContent {
    pub fn binary(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        DocumentContent::Binary {
            filename: filename.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn text(filename: impl Into<String>, text: impl Into<String>) -> Self {
        DocumentContent::Text {
            filename: filename.into(),
            text: text.into(),
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            DocumentContent::Binary { filename, .. } | DocumentContent::Text { filename, .. } => {
                filename
            }
        }
    }

    /// `data:<mime>;base64,<payload>` form for backends that take data URLs.
    pub fn data_url(&self) -> Option<String> {
        match self {
            DocumentContent::Binary {
                mime_type, data, ..
            } => Some(format!("data:{mime_type};base64,{data}")),
            DocumentContent::Text { .. } => None,
        }
    }
}

// Payloads can be megabytes of base64; keep them out of Debug output.
impl fmt::Debug for DocumentContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentContent::Binary {
                filename,
                mime_type,
                data,
            } => f
                .debug_struct("Binary")
                .field("filename", filename)
                .field("mime_type", mime_type)
                .field("data_len", &data.len())
                .finish(),
            DocumentContent::Text { filename, text } => f
                .debug_struct("Text")
                .field("filename", filename)
                .field("text_len", &text.len())
                .finish(),
        }
    }
}

/// Per-request generation options.
///
/// Sampling parameters are `None` unless the caller explicitly enabled them;
/// a `None` parameter is omitted from the payload entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub endpoint: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
    pub timeout: Duration,
}

impl RequestOptions {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            temperature: None,
            top_p: None,
            max_tokens: None,
            stream: false,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
