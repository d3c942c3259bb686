//! CLI command definitions and dispatch for the `gist` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod document;
pub mod keys;
pub mod provider;
pub mod summarize;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use gistgate_types::llm::ProviderId;

/// Summarize and chat with documents through any configured AI provider.
#[derive(Parser)]
#[command(name = "gist", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered providers with their resolved endpoint and model.
    Providers,

    /// Manage provider API keys.
    Keys {
        #[command(subcommand)]
        action: KeysCommand,
    },

    /// Send a minimal request to check a provider's configuration.
    Test {
        /// Provider id (openai, openai-compat, google, anthropic, openrouter).
        provider: ProviderId,
    },

    /// Summarize one or more documents.
    Summarize {
        /// Files to summarize. Several files are sent in one request.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Provider to use (defaults to `default_provider` from config.toml).
        #[arg(long, short)]
        provider: Option<ProviderId>,

        /// Instruction sent with the document.
        #[arg(long)]
        prompt: Option<String>,

        /// Wait for the full response instead of streaming it.
        #[arg(long)]
        no_stream: bool,

        /// Text-only request: binary documents are rejected.
        #[arg(long)]
        text: bool,
    },

    /// Chat about a document (reads questions from stdin).
    Chat {
        /// Document to discuss.
        file: PathBuf,

        /// Provider to use (defaults to `default_provider` from config.toml).
        #[arg(long, short)]
        provider: Option<ProviderId>,

        /// Text-only request: binary documents are rejected.
        #[arg(long)]
        text: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Show masked keys, the current rotation index and cooling keys.
    #[command(alias = "ls")]
    List { provider: ProviderId },

    /// Add a key (prompts with hidden input when --value is omitted).
    Add {
        provider: ProviderId,

        /// Key value, for scripts. Prefer the interactive prompt.
        #[arg(long)]
        value: Option<String>,
    },

    /// Remove every stored key ending in SUFFIX.
    #[command(alias = "rm")]
    Remove { provider: ProviderId, suffix: String },

    /// Clear the rotation state (index, failed keys, success count).
    Reset { provider: ProviderId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_parse_summarize() {
        let cli = Cli::try_parse_from([
            "gist",
            "summarize",
            "a.pdf",
            "b.txt",
            "--provider",
            "Gemini",
            "--no-stream",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        let Commands::Summarize {
            files,
            provider,
            no_stream,
            text,
            ..
        } = cli.command
        else {
            panic!("expected summarize");
        };
        assert_eq!(files.len(), 2);
        assert_eq!(provider, Some(ProviderId::Google));
        assert!(no_stream);
        assert!(!text);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(Cli::try_parse_from(["gist", "test", "bedrock"]).is_err());
    }

    #[test]
    fn test_parse_keys_remove() {
        let cli = Cli::try_parse_from(["gist", "keys", "rm", "anthropic", "abcd"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Keys {
                action: KeysCommand::Remove { provider: ProviderId::Anthropic, ref suffix }
            } if suffix == "abcd"
        ));
    }
}
