//! `gist chat`: line-oriented conversation about one document.
//!
//! Reads questions from stdin, streams answers to stdout and keeps the
//! history in memory for the length of the session. Slash commands:
//! `/exit`, `/clear` (forget history), `/keys` (rotation snapshot) and
//! `/reset-keys`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use gistgate_core::llm::sink::ProgressSink;
use gistgate_types::llm::{ConversationMessage, ProviderId};

use crate::state::AppState;

use super::document::load_document;
use super::summarize::StdoutSink;

/// What a line of input asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput {
    Message(String),
    Exit,
    Clear,
    Keys,
    ResetKeys,
    Empty,
    Unknown(String),
}

pub fn parse_input(line: &str) -> ChatInput {
    let line = line.trim();
    match line {
        "" => ChatInput::Empty,
        "/exit" | "/quit" => ChatInput::Exit,
        "/clear" => ChatInput::Clear,
        "/keys" => ChatInput::Keys,
        "/reset-keys" => ChatInput::ResetKeys,
        cmd if cmd.starts_with('/') => ChatInput::Unknown(cmd.to_string()),
        message => ChatInput::Message(message.to_string()),
    }
}

pub async fn run_chat(
    state: &AppState,
    file: &Path,
    provider: Option<ProviderId>,
    multimodal: bool,
) -> Result<()> {
    let document = load_document(file).await?;
    let provider = provider
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| state.gateway.default_provider().to_string());
    let provider_id: Option<ProviderId> = provider.parse().ok();

    println!();
    println!(
        "  {} Chatting about {} via {}",
        style("💬").bold(),
        style(document.filename()).cyan(),
        style(&provider).bold()
    );
    println!("  {}", style("/exit to quit, /clear to start over").dim());
    println!();

    let mut history: Vec<ConversationMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", style("you>").green().bold());
        std::io::Write::flush(&mut std::io::stdout())?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Exit => break,
            ChatInput::Clear => {
                history.clear();
                println!("  {}", style("history cleared").dim());
                continue;
            }
            ChatInput::Keys => {
                if let Some(id) = provider_id {
                    super::keys::list_keys(state, id, false)?;
                }
                continue;
            }
            ChatInput::ResetKeys => {
                if let Some(id) = provider_id {
                    super::keys::reset_keys(state, id, false)?;
                }
                continue;
            }
            ChatInput::Unknown(cmd) => {
                println!("  {} unknown command {cmd}", style("?").yellow().bold());
                continue;
            }
            ChatInput::Message(message) => history.push(ConversationMessage::user(message)),
        }

        let sink = Arc::new(StdoutSink::default());
        let progress: Arc<dyn ProgressSink> = sink.clone();
        print!("{} ", style("gist>").cyan().bold());

        let result = state
            .gateway
            .chat(&provider, &document, multimodal, &history, Some(progress))
            .await;

        match result {
            Ok(result) => {
                if sink.printed() {
                    println!();
                } else {
                    println!("{}", result.text);
                }
                if let Some(warning) = &result.failover_warning {
                    eprintln!("  {} {}", style("!").yellow().bold(), warning);
                }
                history.push(ConversationMessage::assistant(result.text));
            }
            Err(e) => {
                println!();
                eprintln!("  {} {e}", style("✗").red().bold());
                // Unanswered; keep history alternating.
                history.pop();
            }
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("  "), ChatInput::Empty);
        assert_eq!(parse_input("/exit"), ChatInput::Exit);
        assert_eq!(parse_input("/quit"), ChatInput::Exit);
        assert_eq!(parse_input("/clear"), ChatInput::Clear);
        assert_eq!(parse_input("/keys"), ChatInput::Keys);
        assert_eq!(parse_input("/reset-keys"), ChatInput::ResetKeys);
        assert_eq!(parse_input("/nope"), ChatInput::Unknown("/nope".to_string()));
        assert_eq!(
            parse_input(" Who wrote it? "),
            ChatInput::Message("Who wrote it?".to_string())
        );
    }
}
