//! BoxProviderAdapter -- object-safe dynamic dispatch wrapper for ProviderAdapter.
//!
//! 1. Define an object-safe `ProviderAdapterDyn` trait with boxed futures
//! 2. Blanket-impl `ProviderAdapterDyn` for all `T: ProviderAdapter`
//! 3. `BoxProviderAdapter` wraps `Box<dyn ProviderAdapterDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use gistgate_types::error::GatewayError;
use gistgate_types::llm::{ConversationMessage, DocumentContent, ProviderId, RequestOptions};

use super::provider::{ProviderAdapter, ProviderDefaults};
use super::sink::ProgressSink;

type BoxFuture<'a> = Pin<Box<dyn Future<Output = Result<String, GatewayError>> + Send + 'a>>;

/// Object-safe version of [`ProviderAdapter`] with boxed futures.
pub trait ProviderAdapterDyn: Send + Sync {
    fn id(&self) -> ProviderId;

    fn defaults(&self) -> ProviderDefaults;

    fn generate_summary_boxed<'a>(
        &'a self,
        content: &'a DocumentContent,
        is_multimodal: bool,
        prompt: &'a str,
        options: &'a RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> BoxFuture<'a>;

    fn chat_boxed<'a>(
        &'a self,
        content: &'a DocumentContent,
        is_multimodal: bool,
        history: &'a [ConversationMessage],
        options: &'a RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> BoxFuture<'a>;

    fn test_connection_boxed<'a>(&'a self, options: &'a RequestOptions) -> BoxFuture<'a>;

    fn generate_multi_file_summary_boxed<'a>(
        &'a self,
        files: &'a [DocumentContent],
        prompt: &'a str,
        options: &'a RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> BoxFuture<'a>;
}

impl<T: ProviderAdapter> ProviderAdapterDyn for T {
    fn id(&self) -> ProviderId {
        ProviderAdapter::id(self)
    }

    fn defaults(&self) -> ProviderDefaults {
        ProviderAdapter::defaults(self)
    }

    fn generate_summary_boxed<'a>(
        &'a self,
        content: &'a DocumentContent,
        is_multimodal: bool,
        prompt: &'a str,
        options: &'a RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> BoxFuture<'a> {
        Box::pin(self.generate_summary(content, is_multimodal, prompt, options, progress))
    }

    fn chat_boxed<'a>(
        &'a self,
        content: &'a DocumentContent,
        is_multimodal: bool,
        history: &'a [ConversationMessage],
        options: &'a RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> BoxFuture<'a> {
        Box::pin(self.chat(content, is_multimodal, history, options, progress))
    }

    fn test_connection_boxed<'a>(&'a self, options: &'a RequestOptions) -> BoxFuture<'a> {
        Box::pin(self.test_connection(options))
    }

    fn generate_multi_file_summary_boxed<'a>(
        &'a self,
        files: &'a [DocumentContent],
        prompt: &'a str,
        options: &'a RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> BoxFuture<'a> {
        Box::pin(self.generate_multi_file_summary(files, prompt, options, progress))
    }
}

/// Type-erased adapter for runtime provider selection.
///
/// `ProviderAdapter` uses RPITIT and cannot be a trait object; this wrapper
/// offers the same methods over a `ProviderAdapterDyn` object.
pub struct BoxProviderAdapter {
    inner: Box<dyn ProviderAdapterDyn>,
}

impl BoxProviderAdapter {
    pub fn new<T: ProviderAdapter + 'static>(adapter: T) -> Self {
        Self {
            inner: Box::new(adapter),
        }
    }

    pub fn id(&self) -> ProviderId {
        self.inner.id()
    }

    pub fn defaults(&self) -> ProviderDefaults {
        self.inner.defaults()
    }

    pub async fn generate_summary(
        &self,
        content: &DocumentContent,
        is_multimodal: bool,
        prompt: &str,
        options: &RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        self.inner
            .generate_summary_boxed(content, is_multimodal, prompt, options, progress)
            .await
    }

    pub async fn chat(
        &self,
        content: &DocumentContent,
        is_multimodal: bool,
        history: &[ConversationMessage],
        options: &RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        self.inner
            .chat_boxed(content, is_multimodal, history, options, progress)
            .await
    }

    pub async fn test_connection(&self, options: &RequestOptions) -> Result<String, GatewayError> {
        self.inner.test_connection_boxed(options).await
    }

    pub async fn generate_multi_file_summary(
        &self,
        files: &[DocumentContent],
        prompt: &str,
        options: &RequestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<String, GatewayError> {
        self.inner
            .generate_multi_file_summary_boxed(files, prompt, options, progress)
            .await
    }
}

impl std::fmt::Debug for BoxProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxProviderAdapter")
            .field("id", &self.id())
            .finish()
    }
}
