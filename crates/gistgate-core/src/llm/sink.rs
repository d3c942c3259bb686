//! Progress sink port: where streamed text increments go.

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("progress receiver has been dropped")]
    Closed,

    #[error("{0}")]
    Failed(String),
}

/// Receives incremental text while a response is being generated.
///
/// Delivery is fire-and-forget: the decoder logs a returned error and keeps
/// decoding. A sink must not block; hand the text off and return.
pub trait ProgressSink: Send + Sync {
    fn deliver(&self, text: &str) -> Result<(), SinkError>;
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn deliver(&self, text: &str) -> Result<(), SinkError> {
        self(text);
        Ok(())
    }
}

/// Forwards increments into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn deliver(&self, text: &str) -> Result<(), SinkError> {
        self.tx
            .send(text.to_string())
            .map_err(|_| SinkError::Closed)
    }
}
