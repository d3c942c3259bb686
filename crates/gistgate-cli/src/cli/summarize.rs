//! `gist summarize`: one or more documents in, summary out.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::Instrument;

use gistgate_core::gateway::GatewayResult;
use gistgate_core::llm::sink::{ProgressSink, SinkError};
use gistgate_types::llm::{DocumentContent, ProviderId};

use crate::state::AppState;

use super::document::load_document;

/// Instruction used when `--prompt` is omitted.
pub const DEFAULT_PROMPT: &str = "Summarize this document. Start with a one-sentence overview, \
then list the key points.";

pub struct SummarizeOptions {
    pub provider: Option<ProviderId>,
    pub prompt: Option<String>,
    pub stream: bool,
    pub multimodal: bool,
}

/// Writes increments straight to stdout and remembers whether it did.
#[derive(Default)]
pub struct StdoutSink {
    printed: AtomicBool,
}

impl StdoutSink {
    pub fn printed(&self) -> bool {
        self.printed.load(Ordering::Relaxed)
    }
}

impl ProgressSink for StdoutSink {
    fn deliver(&self, text: &str) -> Result<(), SinkError> {
        let mut out = std::io::stdout().lock();
        out.write_all(text.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| SinkError::Failed(e.to_string()))?;
        self.printed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Spinner shown while waiting for a non-streamed response.
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

pub async fn summarize(
    state: &AppState,
    files: &[PathBuf],
    options: SummarizeOptions,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        documents.push(load_document(path).await?);
    }
    if !options.multimodal
        && documents.len() > 1
        && let Some(binary) = documents
            .iter()
            .find(|d| matches!(d, DocumentContent::Binary { .. }))
    {
        anyhow::bail!(
            "'{}' is a binary document but --text was given",
            binary.filename()
        );
    }

    let provider = options
        .provider
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| state.gateway.default_provider().to_string());
    let prompt = options.prompt.as_deref().unwrap_or(DEFAULT_PROMPT);

    let streaming = options.stream && !json;
    let sink = streaming.then(|| Arc::new(StdoutSink::default()));
    let progress = sink
        .clone()
        .map(|s| s as Arc<dyn ProgressSink>);
    let waiting = (!streaming && !json && !quiet).then(|| spinner("summarizing..."));

    let span = tracing::info_span!("summarize", provider = %provider, files = documents.len());
    let request = async {
        match documents.as_slice() {
            [document] => {
                state
                    .gateway
                    .generate_summary(&provider, document, options.multimodal, prompt, progress)
                    .await
            }
            _ => {
                state
                    .gateway
                    .generate_multi_file_summary(&provider, &documents, prompt, progress)
                    .await
            }
        }
    };
    let result = request.instrument(span).await;
    if let Some(waiting) = waiting {
        waiting.finish_and_clear();
    }
    let result = result?;

    let printed = sink.as_ref().is_some_and(|s| s.printed());
    print_result(&result, printed, json, quiet)
}

/// Print the final text (unless it was already streamed) and any warning.
pub fn print_result(result: &GatewayResult, printed: bool, json: bool, quiet: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({
            "provider": result.provider,
            "attempts": result.attempts,
            "failover_warning": result.failover_warning,
            "text": result.text,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if printed {
        println!();
    } else {
        println!("{}", result.text);
    }

    if !quiet && let Some(warning) = &result.failover_warning {
        eprintln!("  {} {}", style("!").yellow().bold(), warning);
    }
    Ok(())
}
