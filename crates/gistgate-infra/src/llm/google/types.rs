//! Gemini `generateContent` request types.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub system_instruction: GeminiContent,
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiContent {
    /// `user` or `model`; absent on the system instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    /// `None` when no sampling parameter is enabled.
    pub fn from_options(
        temperature: Option<f64>,
        top_p: Option<f64>,
        max_output_tokens: Option<u32>,
    ) -> Option<Self> {
        let config = Self {
            temperature,
            top_p,
            max_output_tokens,
        };
        (config != Self::default()).then_some(config)
    }
}
