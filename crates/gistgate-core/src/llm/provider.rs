//! ProviderAdapter trait definition.
//!
//! One implementation per backend. Uses RPITIT (Rust 2024 edition); the
//! object-safe wrapper lives in `box_provider`.

use std::future::Future;
use std::sync::Arc;

use gistgate_types::error::GatewayError;
use gistgate_types::llm::{ConversationMessage, DocumentContent, ProviderId, RequestOptions};

use super::sink::ProgressSink;

/// Endpoint and model used when the operator configured none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDefaults {
    pub endpoint: String,
    pub model: String,
}

/// Trait for AI backends (OpenAI, Anthropic, Google, ...).
///
/// Each call picks its credential from the ledger, validates that an
/// endpoint and credential are present, renders the provider payload and
/// dispatches it. Errors propagate unchanged except where the streaming
/// decoder returns partial output instead.
///
/// Implementations live in gistgate-infra.
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    fn defaults(&self) -> ProviderDefaults;

    /// Summarize one document.
    fn generate_summary(
        &self,
        content: &DocumentContent,
        is_multimodal: bool,
        prompt: &str,
        options: &RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> impl Future<Output = Result<String, GatewayError>> + Send;

    /// Continue a conversation about one document.
    fn chat(
        &self,
        content: &DocumentContent,
        is_multimodal: bool,
        history: &[ConversationMessage],
        options: &RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> impl Future<Output = Result<String, GatewayError>> + Send;

    /// Send a minimal fixed prompt, non-streaming.
    ///
    /// Failures are always [`GatewayError::ConnectionTest`] with full
    /// diagnostics.
    fn test_connection(
        &self,
        options: &RequestOptions,
    ) -> impl Future<Output = Result<String, GatewayError>> + Send;

    /// Summarize several documents in one request.
    fn generate_multi_file_summary(
        &self,
        files: &[DocumentContent],
        prompt: &str,
        options: &RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> impl Future<Output = Result<String, GatewayError>> + Send;
}
