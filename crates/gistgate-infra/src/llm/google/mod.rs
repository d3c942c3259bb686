//! Google Gemini provider adapter.
//!
//! Talks to the native `generateContent` API. The model is part of the URL
//! and streaming uses a separate method (`streamGenerateContent?alt=sse`).

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

use self::types::{GeminiContent, GeminiPart, GenerateContentRequest, GenerationConfig, InlineData};

/// Adapter for the Gemini API.
pub struct GoogleAdapter<T> {
    transport: T,
    ledger: Arc<CredentialLedger>,
}

impl<T: HttpTransport> GoogleAdapter<T> {
    pub fn new(transport: T, ledger: Arc<CredentialLedger>) -> Self {
        Self { transport, ledger }
    }

    fn current_key(&self, options: &RequestOptions) -> Result<Credential, GatewayError> {
        let key = self.ledger.get_current_key(ProviderId::Google);
        validate_request(ProviderId::Google, options, &key)?;
        Ok(key)
    }

    fn request(
        &self,
        conversation: &PreparedConversation<'_>,
        key: &Credential,
        options: &RequestOptions,
        stream: bool,
    ) -> Result<HttpRequest, GatewayError> {
        let contents = conversation
            .dialogue()
            .map(|turn| GeminiContent {
                role: Some(match turn.role {
                    MessageRole::Assistant => "model",
                    MessageRole::User | MessageRole::System => "user",
                }),
                parts: turn.parts.iter().filter_map(gemini_part).collect(),
            })
            .collect();

        let body = GenerateContentRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    text: conversation.folded_system(),
                }],
            },
            contents,
            generation_config: GenerationConfig::from_options(
                options.temperature,
                options.top_p,
                options.max_tokens,
            ),
        };

        let url = method_url(&options.endpoint, &options.model, stream);
        let request = HttpRequest::json(&url, &body, options.timeout)
            .map_err(|e| GatewayError::Configuration(format!("failed to encode request: {e}")))?
            .header("x-goog-api-key", key.expose());
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
        exchange::execute(&self.transport, request, DeltaFormat::Gemini, progress, stream).await
    }
}

impl<T: HttpTransport> ProviderAdapter for GoogleAdapter<T> {
    fn id(&self) -> ProviderId {
        ProviderId::Google
    }

    fn defaults(&self) -> ProviderDefaults {
        ProviderDefaults {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models".into(),
            model: "gemini-2.5-flash".into(),
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
        exchange::probe(&self.transport, ProviderId::Google, request, DeltaFormat::Gemini).await
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

/// `{endpoint}/{model}:generateContent`, or the SSE streaming method.
fn method_url(endpoint: &str, model: &str, stream: bool) -> String {
    let base = endpoint.trim_end_matches('/');
    let model = model.trim_start_matches("models/");
    if stream {
        format!("{base}/{model}:streamGenerateContent?alt=sse")
    } else {
        format!("{base}/{model}:generateContent")
    }
}

fn gemini_part(part: &TurnPart<'_>) -> Option<GeminiPart> {
    match part {
        TurnPart::Text(text) => Some(GeminiPart::Text { text: text.clone() }),
        TurnPart::Document(DocumentContent::Binary {
            mime_type, data, ..
        }) => Some(GeminiPart::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            },
        }),
        TurnPart::Document(DocumentContent::Text { .. }) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{RecordingTransport, Reply, ledger};

    const ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

    fn options() -> RequestOptions {
        RequestOptions::new(ENDPOINT, "gemini-2.5-flash")
    }

    fn adapter(transport: &Arc<RecordingTransport>) -> GoogleAdapter<Arc<RecordingTransport>> {
        GoogleAdapter::new(Arc::clone(transport), ledger(ProviderId::Google, "AIza-key-9876"))
    }

    fn candidate(text: &str) -> Reply {
        Reply::Body(
            200,
            serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
            })
            .to_string(),
        )
    }

    #[test]
    fn test_method_url() {
        assert_eq!(
            method_url(&format!("{ENDPOINT}/"), "models/gemini-2.5-pro", false),
            format!("{ENDPOINT}/gemini-2.5-pro:generateContent")
        );
        assert_eq!(
            method_url(ENDPOINT, "gemini-2.5-flash", true),
            format!("{ENDPOINT}/gemini-2.5-flash:streamGenerateContent?alt=sse")
        );
    }

    #[tokio::test]
    async fn test_summary_request_shape() {
        let transport = RecordingTransport::new(vec![candidate("Résumé.")]);
        let doc = DocumentContent::binary("report.pdf", "application/pdf", "JVBERi0=");

        let text = adapter(&transport)
            .generate_summary(&doc, true, "Summarize", &options(), None)
            .await
            .unwrap();
        assert_eq!(text, "Résumé.");

        let requests = transport.requests();
        assert_eq!(
            requests[0].url,
            format!("{ENDPOINT}/gemini-2.5-flash:generateContent")
        );
        assert_eq!(
            transport.header("x-goog-api-key").as_deref(),
            Some("AIza-key-9876")
        );

        let body = transport.sent_json();
        assert!(body["system_instruction"]["parts"][0]["text"].is_string());
        assert!(body["system_instruction"].get("role").is_none());
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Summarize");
        assert_eq!(
            body["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "application/pdf"
        );
        assert!(body.get("generation_config").is_none());
    }

    #[tokio::test]
    async fn test_generation_config_only_enabled_fields() {
        let transport = RecordingTransport::new(vec![candidate("ok")]);
        let doc = DocumentContent::text("a.txt", "x");

        adapter(&transport)
            .generate_summary(&doc, false, "Summarize", &options().with_max_tokens(256), None)
            .await
            .unwrap();

        let config = transport.sent_json()["generation_config"].clone();
        assert_eq!(config["max_output_tokens"], 256);
        assert!(config.get("temperature").is_none());
        assert!(config.get("top_p").is_none());
    }

    #[tokio::test]
    async fn test_chat_uses_model_role() {
        let transport = RecordingTransport::new(vec![candidate("Sure.")]);
        let doc = DocumentContent::text("a.txt", "x");
        let history = vec![
            ConversationMessage::user("Hi"),
            ConversationMessage::assistant("Hello"),
            ConversationMessage::user("More?"),
        ];

        adapter(&transport)
            .chat(&doc, false, &history, &options(), None)
            .await
            .unwrap();

        let contents = transport.sent_json()["contents"].clone();
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["text"], "Hello");
    }

    #[tokio::test]
    async fn test_streaming_joins_parts() {
        let transport = RecordingTransport::new(vec![Reply::Stream(
            200,
            vec![
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"One \"},{\"text\":\"two\"}]}}]}\r\n\r\n",
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" three\"}]}}]}\r\n\r\n",
            ],
        )]);
        let sink: Arc<dyn ProgressSink> = Arc::new(|_: &str| {});
        let doc = DocumentContent::text("a.txt", "x");

        let text = adapter(&transport)
            .generate_summary(&doc, false, "Summarize", &options().with_stream(true), Some(sink))
            .await
            .unwrap();

        assert_eq!(text, "One two three");
        assert!(
            transport.requests()[0]
                .url
                .ends_with(":streamGenerateContent?alt=sse")
        );
    }

    #[tokio::test]
    async fn test_stream_http_error_without_output_fails() {
        let transport = RecordingTransport::new(vec![Reply::Stream(
            403,
            vec![r#"{"error":{"code":403,"message":"API key not valid","status":"PERMISSION_DENIED"}}"#],
        )]);
        let sink: Arc<dyn ProgressSink> = Arc::new(|_: &str| {});
        let doc = DocumentContent::text("a.txt", "x");

        let err = adapter(&transport)
            .generate_summary(&doc, false, "Summarize", &options().with_stream(true), Some(sink))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Http { status: 403, code: Some(ref c), .. } if c == "PERMISSION_DENIED"
        ));
        assert!(err.is_key_failover());
    }

    #[tokio::test]
    async fn test_connection_success() {
        let transport = RecordingTransport::new(vec![candidate("pong")]);
        let result = adapter(&transport).test_connection(&options()).await.unwrap();
        assert!(result.starts_with("Connection to google succeeded (HTTP 200)"));
        assert!(result.contains("pong"));
    }
}
