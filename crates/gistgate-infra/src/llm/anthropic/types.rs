//! Anthropic Messages API request types.
//!
//! Response and stream payloads are read through
//! [`DeltaFormat::Anthropic`](gistgate_core::llm::streaming::DeltaFormat),
//! which only needs the text blocks.

use serde::Serialize;

/// Request body for the Anthropic Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// A single message in an Anthropic conversation.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicMessage {
    pub role: &'static str,
    pub content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text { text: String },
    Document { source: Base64Source },
    Image { source: Base64Source },
}

/// Inline base64 payload for document and image blocks.
#[derive(Debug, Clone, Serialize)]
pub struct Base64Source {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub media_type: String,
    pub data: String,
}

impl Base64Source {
    pub fn new(media_type: &str, data: &str) -> Self {
        Self {
            kind: "base64",
            media_type: media_type.to_string(),
            data: data.to_string(),
        }
    }
}
