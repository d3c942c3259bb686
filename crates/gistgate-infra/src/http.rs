//! reqwest-backed [`HttpTransport`].
//!
//! `send` buffers the whole body. `stream` yields the cumulative-delta form
//! the stream decoder expects: each event carries only the text received
//! since the previous one, split on UTF-8 character boundaries. Dropping the
//! stream drops the in-flight response and aborts the request.

use std::time::Duration;

use futures_util::StreamExt;

use gistgate_core::llm::transport::{
    HttpRequest, HttpResponse, HttpTransport, TransportEvent, TransportStream,
};
use gistgate_types::error::TransportError;

const USER_AGENT: &str = concat!("gistgate/", env!("CARGO_PKG_VERSION"));

/// HTTP transport over a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shared connection pool, proxies, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let timeout = request.timeout;
        let response = self
            .build(&request)
            .send()
            .await
            .map_err(|e| map_error(e, timeout))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.text().await.map_err(|e| map_error(e, timeout))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn stream(&self, request: HttpRequest) -> TransportStream {
        let timeout = request.timeout;
        let pending = self.build(&request).send();

        Box::pin(async_stream::stream! {
            let response = match pending.await {
                Ok(response) => response,
                Err(e) => {
                    yield TransportEvent::Failed(map_error(e, timeout));
                    return;
                }
            };

            let status = response.status().as_u16();
            let mut bytes = response.bytes_stream();
            let mut carry: Vec<u8> = Vec::new();
            let mut emitted = false;

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        carry.extend_from_slice(&chunk);
                        let text = take_utf8_prefix(&mut carry);
                        if !text.is_empty() {
                            emitted = true;
                            yield TransportEvent::Progress { status, text };
                        }
                    }
                    Err(e) => {
                        yield TransportEvent::Failed(map_error(e, timeout));
                        return;
                    }
                }
            }

            if !carry.is_empty() {
                emitted = true;
                yield TransportEvent::Progress {
                    status,
                    text: String::from_utf8_lossy(&carry).into_owned(),
                };
            }

            // An error status with an empty body still has to reach the decoder.
            if !emitted && status >= 400 {
                yield TransportEvent::Progress { status, text: String::new() };
            }
        })
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn map_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout(timeout);
    }

    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    TransportError::Network(message)
}

/// Drain `buf` as UTF-8, keeping an incomplete trailing sequence for the
/// next chunk. Invalid sequences are replaced with U+FFFD.
fn take_utf8_prefix(buf: &mut Vec<u8>) -> String {
    let mut text = String::with_capacity(buf.len());
    let mut start = 0;
    while start < buf.len() {
        match std::str::from_utf8(&buf[start..]) {
            Ok(valid) => {
                text.push_str(valid);
                start = buf.len();
            }
            Err(e) => {
                let valid_end = start + e.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&buf[start..valid_end]));
                match e.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        start = valid_end + len;
                    }
                    None => {
                        start = valid_end;
                        break;
                    }
                }
            }
        }
    }
    *buf = buf.split_off(start);
    text
}
