//! Request dispatch shared by every provider adapter.
//!
//! Adapters build an [`HttpRequest`] and hand it to [`execute`], which picks
//! streaming or non-streaming mode, maps transport failures and HTTP error
//! bodies onto [`GatewayError`], and extracts the response text.
//! [`probe`] is the connection-test variant that keeps everything an operator
//! needs for diagnosis.

use std::sync::Arc;

use serde_json::Value;

use gistgate_types::credential::Credential;
use gistgate_types::error::{ConnectionDiagnostic, DiagnosticKind, GatewayError, TransportError};
use gistgate_types::llm::{ProviderId, RequestOptions};

use super::sink::ProgressSink;
use super::streaming::{DeltaFormat, decode_stream};
use super::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Prompt sent by connection tests.
pub const PROBE_PROMPT: &str = "Reply with the single word: pong";

/// Stream only when asked to and when there is somewhere to put increments.
pub fn should_stream(options: &RequestOptions, sink: Option<&Arc<dyn ProgressSink>>) -> bool {
    options.stream && sink.is_some()
}

/// Fail fast on a missing endpoint or credential.
pub fn validate_request(
    provider: ProviderId,
    options: &RequestOptions,
    key: &Credential,
) -> Result<(), GatewayError> {
    if options.endpoint.trim().is_empty() {
        return Err(GatewayError::Configuration(format!(
            "no endpoint configured for {provider}"
        )));
    }
    if options.model.trim().is_empty() {
        return Err(GatewayError::Configuration(format!(
            "no model configured for {provider}"
        )));
    }
    if key.is_empty() {
        return Err(GatewayError::Configuration(format!(
            "no API key configured for {provider}"
        )));
    }
    Ok(())
}

/// Send `request` and return the response text.
///
/// Streams through the decoder when `stream` is set. Without streaming, a
/// supplied sink receives the whole text once.
pub async fn execute<T: HttpTransport>(
    transport: &T,
    request: HttpRequest,
    format: DeltaFormat,
    sink: Option<Arc<dyn ProgressSink>>,
    stream: bool,
) -> Result<String, GatewayError> {
    tracing::debug!(url = %request.url, stream, "dispatching request");
    if stream {
        return decode_stream(transport.stream(request), format, sink).await;
    }

    let body = send_json(transport, request).await?;
    let text = format.completion_text(&body).ok_or_else(|| {
        GatewayError::InvalidResponse(format!(
            "no text in response: {}",
            truncate(&body.to_string(), 200)
        ))
    })?;
    if let Some(sink) = sink
        && !text.is_empty()
        && let Err(e) = sink.deliver(&text)
    {
        tracing::warn!(error = %e, "progress sink rejected text");
    }
    Ok(text)
}

/// Non-streaming POST returning the parsed JSON body.
pub async fn send_json<T: HttpTransport>(
    transport: &T,
    request: HttpRequest,
) -> Result<Value, GatewayError> {
    let response = transport.send(request).await?;
    if !response.is_success() {
        return Err(parse_http_error(response.status, &response.body));
    }
    serde_json::from_str(&response.body)
        .map_err(|e| GatewayError::InvalidResponse(format!("response is not JSON: {e}")))
}

/// Map an error status and body onto [`GatewayError::Http`].
///
/// Understands the `{"error": {...}}` shapes used by OpenAI, Anthropic and
/// Google. Falls back to the status line when the body is not JSON.
pub fn parse_http_error(status: u16, body: &str) -> GatewayError {
    match serde_json::from_str::<Value>(body) {
        Ok(json) if json.get("error").is_some() => error_from_body(status, &json),
        _ => GatewayError::Http {
            status,
            code: None,
            message: status_line(status, body),
        },
    }
}

/// Build an HTTP error from a parsed `{"error": ...}` body.
///
/// A numeric `error.code` in the 4xx/5xx range replaces `status`; in-stream
/// error payloads carry their real status this way.
pub fn error_from_body(status: u16, json: &Value) -> GatewayError {
    let error = &json["error"];
    if let Some(message) = error.as_str() {
        return GatewayError::Http {
            status,
            code: None,
            message: message.to_string(),
        };
    }

    let numeric_code = error["code"]
        .as_u64()
        .and_then(|c| u16::try_from(c).ok())
        .filter(|c| (400..600).contains(c));
    let code = error["code"]
        .as_str()
        .or_else(|| error["type"].as_str())
        .or_else(|| error["status"].as_str())
        .map(str::to_string);
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());

    GatewayError::Http {
        status: numeric_code.unwrap_or(status),
        code,
        message,
    }
}

fn status_line(status: u16, body: &str) -> String {
    let body = body.trim();
    let reason = reason_phrase(status);
    if body.is_empty() {
        reason.to_string()
    } else {
        format!("{reason}: {}", truncate(body, 200))
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        529 => "Overloaded",
        _ => "HTTP error",
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

/// Non-streaming connection test.
///
/// On success returns a human-readable line with the raw response body. Every
/// failure becomes [`GatewayError::ConnectionTest`] carrying the URL, the
/// request body, and the response headers and body.
pub async fn probe<T: HttpTransport>(
    transport: &T,
    provider: ProviderId,
    request: HttpRequest,
    format: DeltaFormat,
) -> Result<String, GatewayError> {
    let url = request.url.clone();
    let request_body = request.body.clone();
    let diagnostic = |kind, message: String, response: Option<&HttpResponse>| {
        GatewayError::ConnectionTest(Box::new(ConnectionDiagnostic {
            kind,
            message,
            status: response.map(|r| r.status),
            url: url.clone(),
            request_body: request_body.clone(),
            response_headers: response.map(|r| r.headers.clone()).unwrap_or_default(),
            response_body: response.map(|r| r.body.clone()).unwrap_or_default(),
        }))
    };

    let response = match transport.send(request).await {
        Ok(response) => response,
        Err(TransportError::Timeout(after)) => {
            return Err(diagnostic(
                DiagnosticKind::Timeout,
                GatewayError::Timeout(after).to_string(),
                None,
            ));
        }
        Err(TransportError::Network(message)) => {
            return Err(diagnostic(DiagnosticKind::Network, message, None));
        }
    };

    if !response.is_success() {
        let message = parse_http_error(response.status, &response.body).to_string();
        return Err(diagnostic(DiagnosticKind::Http, message, Some(&response)));
    }

    let parsed = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|body| format.completion_text(&body));
    if parsed.is_none() {
        return Err(diagnostic(
            DiagnosticKind::InvalidResponse,
            "response did not contain generated text".to_string(),
            Some(&response),
        ));
    }

    Ok(format!(
        "Connection to {provider} succeeded (HTTP {}). Response: {}",
        response.status, response.body
    ))
}

/// Configuration failure reported in connection-test form.
pub fn configuration_diagnostic(err: GatewayError, options: &RequestOptions) -> GatewayError {
    match err {
        GatewayError::Configuration(message) => {
            GatewayError::ConnectionTest(Box::new(ConnectionDiagnostic {
                kind: DiagnosticKind::Configuration,
                message,
                status: None,
                url: options.endpoint.clone(),
                request_body: String::new(),
                response_headers: Vec::new(),
                response_body: String::new(),
            }))
        }
        other => other,
    }
}
