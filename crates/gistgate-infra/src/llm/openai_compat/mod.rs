//! OpenAI-compatible provider adapter.
//!
//! A single [`OpenAiCompatibleAdapter`] serves OpenAI, OpenRouter and any
//! self-hosted server speaking the chat completions protocol, selected by
//! the [`OpenAiCompatConfig`] it is built from.

pub mod config;
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

use self::config::OpenAiCompatConfig;
use self::types::{ChatContent, ChatMessage, ChatRequest, ContentPart, FilePart, ImageUrl};

/// Adapter for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiCompatibleAdapter<T> {
    transport: T,
    ledger: Arc<CredentialLedger>,
    config: OpenAiCompatConfig,
}

impl<T: HttpTransport> OpenAiCompatibleAdapter<T> {
    pub fn new(transport: T, ledger: Arc<CredentialLedger>, config: OpenAiCompatConfig) -> Self {
        Self {
            transport,
            ledger,
            config,
        }
    }

    fn current_key(&self, options: &RequestOptions) -> Result<Credential, GatewayError> {
        let key = self.ledger.get_current_key(self.config.id);
        validate_request(self.config.id, options, &key)?;
        Ok(key)
    }

    /// Render the conversation into a chat completions request.
    fn request(
        &self,
        conversation: &PreparedConversation<'_>,
        key: &Credential,
        options: &RequestOptions,
        stream: bool,
    ) -> Result<HttpRequest, GatewayError> {
        let mut messages = Vec::with_capacity(conversation.turns.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: ChatContent::Text(conversation.system.clone()),
        });
        for turn in &conversation.turns {
            let content = if turn.has_attachment() {
                ChatContent::Parts(turn.parts.iter().filter_map(content_part).collect())
            } else {
                ChatContent::Text(turn.text())
            };
            messages.push(ChatMessage {
                role: role_name(turn.role),
                content,
            });
        }

        let body = ChatRequest {
            model: options.model.clone(),
            messages,
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            stream,
        };

        let mut request = HttpRequest::json(&options.endpoint, &body, options.timeout)
            .map_err(|e| GatewayError::Configuration(format!("failed to encode request: {e}")))?
            .header("authorization", format!("Bearer {}", key.expose()));
        for (name, value) in &self.config.extra_headers {
            request = request.header(name.clone(), value.clone());
        }
        if stream {
            request = request.header("accept", "text/event-stream");
        }
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
        exchange::execute(&self.transport, request, DeltaFormat::OpenAi, progress, stream).await
    }
}

impl<T: HttpTransport> ProviderAdapter for OpenAiCompatibleAdapter<T> {
    fn id(&self) -> ProviderId {
        self.config.id
    }

    fn defaults(&self) -> ProviderDefaults {
        self.config.defaults.clone()
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
        let conversation =
            PreparedConversation::summary(content, is_multimodal, prompt)?;
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
        let conversation =
            PreparedConversation::chat(content, is_multimodal, history)?;
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
        exchange::probe(&self.transport, self.config.id, request, DeltaFormat::OpenAi).await
    }

    async fn generate_multi_file_summary(
        &self,
        files: &[DocumentContent],
        prompt: &str,
        options: &RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        let key = self.current_key(options)?;
        let conversation =
            PreparedConversation::multi_file(files, true, prompt)?;
        self.dispatch(&conversation, &key, options, progress).await
    }
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

fn content_part(part: &TurnPart<'_>) -> Option<ContentPart> {
    match part {
        TurnPart::Text(text) => Some(ContentPart::Text { text: text.clone() }),
        TurnPart::Document(document) => {
            let DocumentContent::Binary { filename, mime_type, .. } = document else {
                return None;
            };
            let data_url = document.data_url()?;
            if mime_type.starts_with("image/") {
                Some(ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_url },
                })
            } else {
                Some(ContentPart::File {
                    file: FilePart {
                        filename: filename.clone(),
                        file_data: data_url,
                    },
                })
            }
        }
    }
}
