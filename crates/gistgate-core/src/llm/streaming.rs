//! Incremental SSE decoding.
//!
//! The transport reports a growing response buffer. [`StreamDecoder`] turns
//! each growth event into zero or more text deltas, pushes undelivered text
//! to a [`ProgressSink`], and at the end applies the partial-output rule:
//! an error after at least one delta yields the text so far instead of the
//! error.
//!
//! The decoder is plain synchronous state. [`decode_stream`] is the async
//! driver that feeds it from a [`TransportStream`] and drops the stream
//! (aborting the request) as soon as the decoder asks to stop.

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;

use gistgate_types::error::{GatewayError, TransportError};

use super::exchange::{error_from_body, parse_http_error};
use super::sink::ProgressSink;
use super::transport::{TransportEvent, TransportStream};

/// Where the text delta lives in each provider's stream payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaFormat {
    /// `choices[0].delta.content` (OpenAI, compatible servers, OpenRouter).
    OpenAi,
    /// `content_block_delta` events with `delta.text`.
    Anthropic,
    /// `candidates[0].content.parts[*].text`.
    Gemini,
}

impl DeltaFormat {
    /// Text delta carried by one stream payload, if any.
    pub fn delta_text(&self, payload: &Value) -> Option<String> {
        match self {
            DeltaFormat::OpenAi => payload["choices"][0]["delta"]["content"]
                .as_str()
                .map(str::to_string),
            DeltaFormat::Anthropic => {
                if payload["type"] != "content_block_delta" {
                    return None;
                }
                payload["delta"]["text"].as_str().map(str::to_string)
            }
            DeltaFormat::Gemini => gemini_parts_text(payload),
        }
    }

    /// Text of a complete (non-streaming) response body.
    pub fn completion_text(&self, body: &Value) -> Option<String> {
        match self {
            DeltaFormat::OpenAi => body["choices"][0]["message"]["content"]
                .as_str()
                .map(str::to_string),
            DeltaFormat::Anthropic => {
                let blocks = body["content"].as_array()?;
                let text: String = blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect();
                Some(text)
            }
            DeltaFormat::Gemini => gemini_parts_text(body),
        }
    }
}

fn gemini_parts_text(payload: &Value) -> Option<String> {
    let parts = payload["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    Some(text)
}

/// A stream line that could not be used. Logged and counted, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    InvalidJson { excerpt: String, error: String },
    BufferRegressed { processed: usize, seen: usize },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::InvalidJson { excerpt, error } => {
                write!(f, "discarding malformed stream line ({error}): {excerpt}")
            }
            DecodeWarning::BufferRegressed { processed, seen } => {
                write!(f, "response buffer shrank from {processed} to {seen} bytes")
            }
        }
    }
}

/// Lifecycle of one decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Streaming,
    Completed,
    CompletedWithPartial,
    Failed,
}

/// What the driver should do after a growth event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStep {
    Continue,
    Abort,
}

/// Per-request decode state.
#[derive(Debug, Default)]
pub struct StreamDecodeState {
    /// Bytes of the raw buffer already consumed.
    pub processed_length: usize,
    /// Incomplete trailing line carried to the next event.
    pub partial_line: String,
    pub chunks: Vec<String>,
    /// Bytes of decoded text already pushed to the sink.
    pub delivered_length: usize,
    pub abort_error: Option<GatewayError>,
    pub warnings: usize,
}

pub struct StreamDecoder {
    format: DeltaFormat,
    sink: Option<Arc<dyn ProgressSink>>,
    state: StreamDecodeState,
    decoded_length: usize,
    phase: StreamPhase,
}

impl StreamDecoder {
    pub fn new(format: DeltaFormat, sink: Option<Arc<dyn ProgressSink>>) -> Self {
        Self {
            format,
            sink,
            state: StreamDecodeState::default(),
            decoded_length: 0,
            phase: StreamPhase::Idle,
        }
    }

    pub fn state(&self) -> &StreamDecodeState {
        &self.state
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Consume the part of `buffer` not seen yet.
    ///
    /// `buffer` is the whole response text received so far; `status` is the
    /// in-flight HTTP status.
    pub fn on_progress(&mut self, buffer: &str, status: u16) -> DecodeStep {
        self.phase = StreamPhase::Streaming;

        let Some(fresh) = buffer.get(self.state.processed_length..) else {
            self.warn(DecodeWarning::BufferRegressed {
                processed: self.state.processed_length,
                seen: buffer.len(),
            });
            return DecodeStep::Continue;
        };
        self.state.processed_length = buffer.len();

        if status >= 400 {
            tracing::debug!(status, "error status on stream, aborting");
            self.record_error(parse_http_error(status, buffer));
            self.state.partial_line.clear();
            return DecodeStep::Abort;
        }

        let mut combined = std::mem::take(&mut self.state.partial_line);
        combined.push_str(fresh);

        let mut lines: Vec<&str> = combined.split('\n').collect();
        // Empty when the slice ends exactly on a line boundary.
        let remainder = lines.pop().unwrap_or_default().to_string();
        for line in lines {
            self.process_line(line);
        }
        self.state.partial_line = remainder;

        if self.state.abort_error.is_some() {
            DecodeStep::Abort
        } else {
            DecodeStep::Continue
        }
    }

    /// Transport failure or timeout. The first recorded error wins.
    pub fn on_transport_error(&mut self, err: TransportError) {
        tracing::debug!(error = %err, "transport error on stream");
        self.record_error(err.into());
    }

    /// Settle the decode.
    ///
    /// Any recorded error is returned only when no delta was ever received;
    /// otherwise the accumulated text is returned.
    pub fn finish(&mut self) -> Result<String, GatewayError> {
        if self.state.abort_error.is_none() && !self.state.partial_line.trim().is_empty() {
            let last = std::mem::take(&mut self.state.partial_line);
            self.process_line(&last);
        }

        let text = self.state.chunks.concat();
        match self.state.abort_error.take() {
            Some(err) if self.state.chunks.is_empty() => {
                self.phase = StreamPhase::Failed;
                Err(err)
            }
            Some(err) => {
                tracing::warn!(
                    error = %err,
                    received = text.len(),
                    "stream failed after partial output, returning partial text"
                );
                self.phase = StreamPhase::CompletedWithPartial;
                Ok(text)
            }
            None => {
                self.phase = StreamPhase::Completed;
                Ok(text)
            }
        }
    }

    fn process_line(&mut self, raw: &str) {
        let line = raw.trim_end_matches('\r');
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if is_sentinel(data) {
            return;
        }

        let payload: Value = match serde_json::from_str(data) {
            Ok(payload) => payload,
            Err(e) => {
                self.warn(DecodeWarning::InvalidJson {
                    excerpt: data.chars().take(120).collect(),
                    error: e.to_string(),
                });
                return;
            }
        };

        if payload.get("error").is_some_and(Value::is_object) {
            self.record_error(error_from_body(500, &payload));
            return;
        }

        if let Some(delta) = self.format.delta_text(&payload) {
            self.push_delta(&delta);
        }
    }

    fn push_delta(&mut self, delta: &str) {
        let delta = collapse_newlines(delta);
        if delta.is_empty() {
            return;
        }
        self.decoded_length += delta.len();
        self.state.chunks.push(delta);
        self.deliver();
    }

    fn deliver(&mut self) {
        let Some(sink) = &self.sink else {
            return;
        };
        if self.decoded_length <= self.state.delivered_length {
            return;
        }
        let pending = self.undelivered();
        if let Err(e) = sink.deliver(&pending) {
            tracing::warn!(error = %e, "progress sink rejected text");
        }
        self.state.delivered_length = self.decoded_length;
    }

    // Deliveries always end on a chunk boundary.
    fn undelivered(&self) -> String {
        let mut pending = self.decoded_length - self.state.delivered_length;
        let mut tail: Vec<&str> = Vec::new();
        for chunk in self.state.chunks.iter().rev() {
            if pending == 0 {
                break;
            }
            tail.push(chunk);
            pending = pending.saturating_sub(chunk.len());
        }
        tail.reverse();
        tail.concat()
    }

    fn record_error(&mut self, err: GatewayError) {
        if self.state.abort_error.is_none() {
            self.state.abort_error = Some(err);
        }
    }

    fn warn(&mut self, warning: DecodeWarning) {
        self.state.warnings += 1;
        tracing::warn!("{warning}");
    }
}

/// `[DONE]` plus keep-alive payloads some providers send as data lines.
fn is_sentinel(data: &str) -> bool {
    data.is_empty()
        || data == "[DONE]"
        || data.starts_with(':')
        || data.eq_ignore_ascii_case("ping")
}

/// Collapse each run of newlines to a single newline.
pub fn collapse_newlines(delta: &str) -> String {
    let mut out = String::with_capacity(delta.len());
    let mut previous_newline = false;
    for ch in delta.chars() {
        if ch == '\n' {
            if !previous_newline {
                out.push('\n');
            }
            previous_newline = true;
        } else {
            out.push(ch);
            previous_newline = false;
        }
    }
    out
}

/// Feed a transport stream through a decoder until it ends or must stop.
///
/// Returning early drops `events`, which aborts the underlying request.
pub async fn decode_stream(
    mut events: TransportStream,
    format: DeltaFormat,
    sink: Option<Arc<dyn ProgressSink>>,
) -> Result<String, GatewayError> {
    let mut decoder = StreamDecoder::new(format, sink);
    let mut buffer = String::new();

    while let Some(event) = events.next().await {
        match event {
            TransportEvent::Progress { status, text } => {
                buffer.push_str(&text);
                if decoder.on_progress(&buffer, status) == DecodeStep::Abort {
                    break;
                }
            }
            TransportEvent::Failed(err) => {
                decoder.on_transport_error(err);
                break;
            }
        }
    }
    drop(events);

    decoder.finish()
}
