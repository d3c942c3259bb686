//! Provider commands: list registered providers, test a connection.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use gistgate_types::error::GatewayError;
use gistgate_types::llm::ProviderId;

use crate::state::AppState;

use super::summarize::spinner;

pub fn list_providers(state: &AppState, json: bool) -> Result<()> {
    let gateway = &state.gateway;
    let default = gateway.default_provider().to_lowercase();

    let mut rows = Vec::new();
    for name in gateway.registry().list() {
        let options = gateway.options_for(name)?;
        let keys = name
            .parse::<ProviderId>()
            .map(|id| state.ledger.get_all_keys(id).len())
            .unwrap_or_default();
        rows.push((name.to_string(), options, keys));
    }

    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|(name, options, keys)| {
                serde_json::json!({
                    "id": name,
                    "default": *name == default,
                    "endpoint": options.endpoint,
                    "model": options.model,
                    "stream": options.stream,
                    "keys": keys,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Provider").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Endpoint").fg(Color::White),
        Cell::new("Keys").fg(Color::White),
    ]);

    for (name, options, keys) in &rows {
        let label = if *name == default {
            format!("{name} (default)")
        } else {
            name.clone()
        };
        table.add_row(vec![
            Cell::new(label).fg(Color::Cyan),
            Cell::new(&options.model),
            Cell::new(&options.endpoint).fg(Color::DarkGrey),
            if *keys == 0 {
                Cell::new("none").fg(Color::Red)
            } else {
                Cell::new(keys).fg(Color::Green)
            },
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} {}",
        style("config:").dim(),
        state.data_dir.join("config.toml").display()
    );
    println!();
    Ok(())
}

/// Run a connection test and print the outcome.
///
/// On failure the full diagnostic (URL, request body, response headers and
/// body) is printed and the command exits non-zero.
pub async fn test_provider(state: &AppState, provider: ProviderId, json: bool) -> Result<()> {
    let waiting = (!json).then(|| spinner(&format!("testing {provider}...")));
    let result = state.gateway.test_connection(provider.as_str()).await;
    if let Some(waiting) = waiting {
        waiting.finish_and_clear();
    }

    match result {
        Ok(message) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({"provider": provider, "ok": true, "message": message})
                );
            } else {
                println!("  {} {}", style("✓").green().bold(), message);
            }
            Ok(())
        }
        Err(GatewayError::ConnectionTest(diagnostic)) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({"provider": provider, "ok": false, "diagnostic": diagnostic})
                );
            } else {
                println!("  {} {}", style("✗").red().bold(), diagnostic);
            }
            anyhow::bail!("connection test for {provider} failed")
        }
        Err(e) => Err(e.into()),
    }
}
