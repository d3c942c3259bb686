//! Test doubles shared by the core test suites.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use gistgate_types::error::{GatewayError, TransportError};
use gistgate_types::llm::{ConversationMessage, DocumentContent, ProviderId, RequestOptions};

use crate::credentials::CredentialLedger;

use super::provider::{ProviderAdapter, ProviderDefaults};
use super::sink::ProgressSink;
use super::transport::{HttpRequest, HttpResponse, HttpTransport, TransportEvent, TransportStream};

pub enum Scripted {
    Response(Result<HttpResponse, TransportError>),
    Stream(Vec<TransportEvent>),
}

/// Replays scripted outcomes in order and records every request.
#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<Scripted>>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(status: u16, body: &str) -> Scripted {
        Scripted::Response(Ok(HttpResponse {
            status,
            headers: vec![("x-request-id".to_string(), "req-1".to_string())],
            body: body.to_string(),
        }))
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }

    fn next(&self, request: HttpRequest) -> Option<Scripted> {
        self.requests.lock().unwrap().push(request);
        self.script.lock().unwrap().pop_front()
    }
}

impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        match self.next(request) {
            Some(Scripted::Response(result)) => result,
            Some(Scripted::Stream(_)) => panic!("expected send, script has a stream"),
            None => Err(TransportError::Network("script exhausted".to_string())),
        }
    }

    fn stream(&self, request: HttpRequest) -> TransportStream {
        let events = match self.next(request) {
            Some(Scripted::Stream(events)) => events,
            Some(Scripted::Response(_)) => panic!("expected stream, script has a response"),
            None => vec![TransportEvent::Failed(TransportError::Network(
                "script exhausted".to_string(),
            ))],
        };
        Box::pin(futures_util::stream::iter(events))
    }
}

/// Adapter that answers every call with the same text.
pub struct StaticAdapter {
    id: ProviderId,
    text: String,
}

impl StaticAdapter {
    pub fn new(id: ProviderId, text: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
        }
    }
}

impl ProviderAdapter for StaticAdapter {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn defaults(&self) -> ProviderDefaults {
        ProviderDefaults {
            endpoint: format!("https://{}.example.com/v1", self.id),
            model: "static-model".to_string(),
        }
    }

    async fn generate_summary(
        &self,
        _content: &DocumentContent,
        _is_multimodal: bool,
        _prompt: &str,
        _options: &RequestOptions,
        _progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        Ok(self.text.clone())
    }

    async fn chat(
        &self,
        _content: &DocumentContent,
        _is_multimodal: bool,
        _history: &[ConversationMessage],
        _options: &RequestOptions,
        _progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        Ok(self.text.clone())
    }

    async fn test_connection(&self, _options: &RequestOptions) -> Result<String, GatewayError> {
        Ok(self.text.clone())
    }

    async fn generate_multi_file_summary(
        &self,
        _files: &[DocumentContent],
        _prompt: &str,
        _options: &RequestOptions,
        _progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        Ok(self.text.clone())
    }
}

/// Adapter that replays scripted results and records the credential and
/// options each call was made with.
pub struct ScriptedAdapter {
    id: ProviderId,
    ledger: Arc<CredentialLedger>,
    script: Mutex<VecDeque<Result<String, GatewayError>>>,
    pub keys_seen: Arc<Mutex<Vec<String>>>,
    pub options_seen: Arc<Mutex<Vec<RequestOptions>>>,
}

impl ScriptedAdapter {
    pub fn new(
        id: ProviderId,
        ledger: Arc<CredentialLedger>,
        script: Vec<Result<String, GatewayError>>,
    ) -> Self {
        Self {
            id,
            ledger,
            script: Mutex::new(script.into()),
            keys_seen: Arc::new(Mutex::new(Vec::new())),
            options_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn next(&self, options: &RequestOptions) -> Result<String, GatewayError> {
        let key = self.ledger.get_current_key(self.id);
        self.keys_seen.lock().unwrap().push(key.expose().to_string());
        self.options_seen.lock().unwrap().push(options.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Network("script exhausted".to_string())))
    }
}

impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn defaults(&self) -> ProviderDefaults {
        ProviderDefaults {
            endpoint: format!("https://{}.example.com/v1", self.id),
            model: "scripted-model".to_string(),
        }
    }

    async fn generate_summary(
        &self,
        _content: &DocumentContent,
        _is_multimodal: bool,
        _prompt: &str,
        options: &RequestOptions,
        _progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        self.next(options)
    }

    async fn chat(
        &self,
        _content: &DocumentContent,
        _is_multimodal: bool,
        _history: &[ConversationMessage],
        options: &RequestOptions,
        _progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        self.next(options)
    }

    async fn test_connection(&self, options: &RequestOptions) -> Result<String, GatewayError> {
        self.next(options)
    }

    async fn generate_multi_file_summary(
        &self,
        _files: &[DocumentContent],
        _prompt: &str,
        options: &RequestOptions,
        _progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        self.next(options)
    }
}
