use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by gateway operations.
///
/// Malformed stream lines are not represented here: they are logged and
/// dropped by the decoder and never interrupt a request.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Missing endpoint or credential. Never attempted over the wire.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// HTTP status >= 400, with the provider error code/message when the body parsed.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// A 2xx response whose body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("unknown provider: '{0}'")]
    UnknownProvider(String),

    #[error("connection test failed: {0}")]
    ConnectionTest(Box<ConnectionDiagnostic>),
}

impl GatewayError {
    /// Whether trying the same request with another credential could help.
    ///
    /// Auth, quota, rate-limit and server-side failures rotate; configuration
    /// errors and other client errors do not. A 400 that rejects the key
    /// itself (Gemini reports invalid keys this way) also rotates.
    pub fn is_key_failover(&self) -> bool {
        match self {
            GatewayError::Network(_) | GatewayError::Timeout(_) => true,
            GatewayError::Http {
                status,
                code,
                message,
            } => {
                matches!(status, 401 | 402 | 403 | 408 | 429)
                    || *status >= 500
                    || (*status == 400 && rejects_api_key(code.as_deref(), message))
            }
            GatewayError::Configuration(_)
            | GatewayError::InvalidResponse(_)
            | GatewayError::UnknownProvider(_)
            | GatewayError::ConnectionTest(_) => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            GatewayError::ConnectionTest(diag) => diag.status,
            _ => None,
        }
    }
}

fn rejects_api_key(code: Option<&str>, message: &str) -> bool {
    if code.is_some_and(|c| c.eq_ignore_ascii_case("API_KEY_INVALID")) {
        return true;
    }
    let message = message.to_ascii_lowercase();
    message.contains("api key") || message.contains("api_key")
}

/// Failures of the HTTP transport itself (no HTTP status available).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// DNS, TLS, connection reset, body read failure.
    #[error("{0}")]
    Network(String),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(message) => GatewayError::Network(message),
            TransportError::Timeout(after) => GatewayError::Timeout(after),
        }
    }
}

/// Classification of a failed connection test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Configuration,
    Network,
    Timeout,
    Http,
    InvalidResponse,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Configuration => write!(f, "configuration"),
            DiagnosticKind::Network => write!(f, "network"),
            DiagnosticKind::Timeout => write!(f, "timeout"),
            DiagnosticKind::Http => write!(f, "http"),
            DiagnosticKind::InvalidResponse => write!(f, "invalid_response"),
        }
    }
}

/// Everything an operator needs to fix a misconfigured endpoint without logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDiagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub status: Option<u16>,
    pub url: String,
    /// Serialized request body as sent (credentials live in headers, not here).
    pub request_body: String,
    pub response_headers: Vec<(String, String)>,
    pub response_body: String,
}

impl fmt::Display for ConnectionDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(status) = self.status {
            write!(f, "\n  status: {status}")?;
        }
        write!(f, "\n  url: {}", self.url)?;
        write!(f, "\n  request body: {}", self.request_body)?;
        if !self.response_headers.is_empty() {
            write!(f, "\n  response headers:")?;
            for (name, value) in &self.response_headers {
                write!(f, "\n    {name}: {value}")?;
            }
        }
        if !self.response_body.is_empty() {
            write!(f, "\n  response body: {}", self.response_body)?;
        }
        Ok(())
    }
}

/// Errors from credential storage backends.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("credential store is read-only")]
    ReadOnly,

    #[error("credential store I/O error: {0}")]
    Io(String),

    #[error("credential store is corrupt: {0}")]
    Parse(String),
}

/// Errors found when validating a loaded configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown provider '{0}' in configuration")]
    UnknownProvider(String),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
