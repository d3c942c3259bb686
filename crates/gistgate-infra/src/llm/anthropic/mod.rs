//! Anthropic Claude provider adapter.
//!
//! Sends requests to the Messages API with `x-api-key` authentication. The
//! system instruction is a top-level field, documents travel as base64
//! `document` blocks, and `max_tokens` is always present because the API
//! requires it.

pub mod types;

use std::sync::Arc;

use gistgate_core::credentials::CredentialLedger;
use gistgate_core::llm::conversation::{PreparedConversation, TurnPart};
use gistgate_core::llm::exchange::{
    self, PROBE_PROMPT, configuration_diagnostic, should_stream, validate_request,
};
use gistgate_core::llm::provider::{ProviderAdapter, ProviderDefaults};
use gistgate_core::llm::sink::ProgressSink;
use gistgate_core::llm::streaming::DeltaFormat;
use gistgate_core::llm::transport::{HttpRequest, HttpTransport};
use gistgate_types::credential::Credential;
use gistgate_types::error::GatewayError;
use gistgate_types::llm::{
    ConversationMessage, DocumentContent, MessageRole, ProviderId, RequestOptions,
};

use self::types::{AnthropicContentBlock, AnthropicMessage, AnthropicRequest, Base64Source};

/// Adapter for the Anthropic Messages API.
pub struct AnthropicAdapter<T> {
    transport: T,
    ledger: Arc<CredentialLedger>,
}

impl<T: HttpTransport> AnthropicAdapter<T> {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    /// Sent when the caller did not enable `max_tokens`.
    pub const DEFAULT_MAX_TOKENS: u32 = 4096;

    pub fn new(transport: T, ledger: Arc<CredentialLedger>) -> Self {
        Self { transport, ledger }
    }

    fn current_key(&self, options: &RequestOptions) -> Result<Credential, GatewayError> {
        let key = self.ledger.get_current_key(ProviderId::Anthropic);
        validate_request(ProviderId::Anthropic, options, &key)?;
        Ok(key)
    }

    /// Convert a prepared conversation into an [`AnthropicRequest`].
    fn to_anthropic_request(
        conversation: &PreparedConversation<'_>,
        options: &RequestOptions,
        stream: bool,
    ) -> AnthropicRequest {
        // No in-line system role: system turns join the top-level prompt.
        let messages = conversation
            .dialogue()
            .map(|turn| AnthropicMessage {
                role: match turn.role {
                    MessageRole::Assistant => "assistant",
                    MessageRole::User | MessageRole::System => "user",
                },
                content: turn.parts.iter().filter_map(content_block).collect(),
            })
            .collect();

        AnthropicRequest {
            model: options.model.clone(),
            max_tokens: options.max_tokens.unwrap_or(Self::DEFAULT_MAX_TOKENS),
            messages,
            system: Some(conversation.folded_system()),
            stream,
            temperature: options.temperature,
            top_p: options.top_p,
        }
    }

    fn request(
        &self,
        conversation: &PreparedConversation<'_>,
        key: &Credential,
        options: &RequestOptions,
        stream: bool,
    ) -> Result<HttpRequest, GatewayError> {
        let body = Self::to_anthropic_request(conversation, options, stream);
        let request = HttpRequest::json(&options.endpoint, &body, options.timeout)
            .map_err(|e| GatewayError::Configuration(format!("failed to encode request: {e}")))?
            .header("x-api-key", key.expose())
            .header("anthropic-version", Self::API_VERSION);
        Ok(request)
    }

    async fn dispatch(
        &self,
        conversation: &PreparedConversation<'_>,
        key: &Credential,
        options: &RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        let stream = should_stream(options, progress.as_ref());
        let request = self.request(conversation, key, options, stream)?;
        exchange::execute(
            &self.transport,
            request,
            DeltaFormat::Anthropic,
            progress,
            stream,
        )
        .await
    }
}

impl<T: HttpTransport> ProviderAdapter for AnthropicAdapter<T> {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn defaults(&self) -> ProviderDefaults {
        ProviderDefaults {
            endpoint: "https://api.anthropic.com/v1/messages".into(),
            model: "claude-sonnet-4-20250514".into(),
        }
    }

    async fn generate_summary(
        &self,
        content: &DocumentContent,
        is_multimodal: bool,
        prompt: &str,
        options: &RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        let key = self.current_key(options)?;
        let conversation = PreparedConversation::summary(content, is_multimodal, prompt)?;
        self.dispatch(&conversation, &key, options, progress).await
    }

    async fn chat(
        &self,
        content: &DocumentContent,
        is_multimodal: bool,
        history: &[ConversationMessage],
        options: &RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        let key = self.current_key(options)?;
        let conversation = PreparedConversation::chat(content, is_multimodal, history)?;
        self.dispatch(&conversation, &key, options, progress).await
    }

    async fn test_connection(&self, options: &RequestOptions) -> Result<String, GatewayError> {
        let key = self
            .current_key(options)
            .map_err(|e| configuration_diagnostic(e, options))?;
        let conversation = PreparedConversation::probe(PROBE_PROMPT);
        let request = self
            .request(&conversation, &key, options, false)
            .map_err(|e| configuration_diagnostic(e, options))?;
        exchange::probe(
            &self.transport,
            ProviderId::Anthropic,
            request,
            DeltaFormat::Anthropic,
        )
        .await
    }

    async fn generate_multi_file_summary(
        &self,
        files: &[DocumentContent],
        prompt: &str,
        options: &RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        let key = self.current_key(options)?;
        let conversation = PreparedConversation::multi_file(files, true, prompt)?;
        self.dispatch(&conversation, &key, options, progress).await
    }
}

fn content_block(part: &TurnPart<'_>) -> Option<AnthropicContentBlock> {
    match part {
        TurnPart::Text(text) => Some(AnthropicContentBlock::Text { text: text.clone() }),
        TurnPart::Document(DocumentContent::Binary {
            mime_type, data, ..
        }) => {
            let source = Base64Source::new(mime_type, data);
            if mime_type.starts_with("image/") {
                Some(AnthropicContentBlock::Image { source })
            } else {
                Some(AnthropicContentBlock::Document { source })
            }
        }
        TurnPart::Document(DocumentContent::Text { .. }) => None,
    }
}
