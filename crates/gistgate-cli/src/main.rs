//! gistgate CLI entry point.
//!
//! Binary name: `gist`
//!
//! Parses CLI arguments, sets up tracing, wires the credential chain,
//! provider registry and gateway, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use gistgate_observe::tracing_setup::{LogFormat, default_filter, init_tracing, shutdown_tracing};

use cli::{Cli, Commands, KeysCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(default_filter(cli.verbose, cli.quiet), format, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "gist", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Providers => {
            cli::provider::list_providers(&state, cli.json)?;
        }

        Commands::Keys { action } => match action {
            KeysCommand::List { provider } => {
                cli::keys::list_keys(&state, provider, cli.json)?;
            }
            KeysCommand::Add { provider, value } => {
                cli::keys::add_key(&state, provider, value, cli.json)?;
            }
            KeysCommand::Remove { provider, suffix } => {
                cli::keys::remove_key(&state, provider, &suffix, cli.json)?;
            }
            KeysCommand::Reset { provider } => {
                cli::keys::reset_keys(&state, provider, cli.json)?;
            }
        },

        Commands::Test { provider } => {
            cli::provider::test_provider(&state, provider, cli.json).await?;
        }

        Commands::Summarize {
            files,
            provider,
            prompt,
            no_stream,
            text,
        } => {
            let options = cli::summarize::SummarizeOptions {
                provider,
                prompt,
                stream: !no_stream,
                multimodal: !text,
            };
            cli::summarize::summarize(&state, &files, options, cli.json, cli.quiet).await?;
        }

        Commands::Chat {
            file,
            provider,
            text,
        } => {
            cli::chat::run_chat(&state, &file, provider, !text).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
