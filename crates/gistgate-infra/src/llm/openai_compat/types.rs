//! Wire types for the OpenAI chat completions API.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: ChatContent,
}

/// Plain string for text-only turns, part list when a file is attached.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    File { file: FilePart },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct FilePart {
    pub filename: String,
    /// `data:<mime>;base64,<payload>`
    pub file_data: String,
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}
