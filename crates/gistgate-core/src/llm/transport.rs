//! HTTP transport port.
//!
//! Adapters never talk to an HTTP client directly. They hand an
//! [`HttpRequest`] to an [`HttpTransport`], which either returns the whole
//! response or a stream of [`TransportEvent`]s for incremental decoding.
//! `gistgate-infra` provides the reqwest-backed implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use serde::Serialize;

use gistgate_types::error::TransportError;

/// A POST request ready to send.
#[derive(Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body.
    pub body: String,
    pub timeout: Duration,
}

impl HttpRequest {
    /// POST with a JSON body.
    pub fn json<B: Serialize + ?Sized>(
        url: impl Into<String>,
        body: &B,
        timeout: Duration,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            url: url.into(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: serde_json::to_string(body)?,
            timeout,
        })
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

// Header values carry credentials; print names only.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("HttpRequest")
            .field("url", &self.url)
            .field("headers", &names)
            .field("body_len", &self.body.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A fully-read response. Non-2xx statuses are returned here, not as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One notification from an in-flight streaming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// More response text arrived. `text` is only the new part; `status`
    /// is the HTTP status of the in-flight response.
    Progress { status: u16, text: String },
    /// The request failed below HTTP. No further events follow.
    Failed(TransportError),
}

/// Events of one streaming request. Ends when the response body ends.
/// Dropping the stream aborts the request.
pub type TransportStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send + 'static>>;

/// Issues POST requests on behalf of provider adapters.
pub trait HttpTransport: Send + Sync {
    /// Send and read the whole response body.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;

    /// Send and observe the body as it arrives.
    fn stream(&self, request: HttpRequest) -> TransportStream;
}

impl<T: HttpTransport> HttpTransport for Arc<T> {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        (**self).send(request)
    }

    fn stream(&self, request: HttpRequest) -> TransportStream {
        (**self).stream(request)
    }
}
