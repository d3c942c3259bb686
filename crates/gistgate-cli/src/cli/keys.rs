//! Key management commands: list, add, remove, reset.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Password;
use secrecy::{ExposeSecret, SecretString};

use gistgate_types::credential::Credential;
use gistgate_types::error::CredentialStoreError;
use gistgate_types::llm::ProviderId;

use crate::state::AppState;

/// Masked keys in rotation order with their cooldown status.
pub fn list_keys(state: &AppState, provider: ProviderId, json: bool) -> Result<()> {
    let snapshot = state.ledger.snapshot(provider);

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if snapshot.keys.is_empty() {
        println!();
        println!(
            "  {} No keys for {}. Add one with: {}",
            style("i").blue().bold(),
            style(provider).bold(),
            style(format!("gist keys add {provider}")).yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Key").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for (index, masked) in snapshot.keys.iter().enumerate() {
        let cooling = snapshot.cooling_down.iter().find(|c| &c.masked == masked);
        let status = match cooling {
            Some(c) => Cell::new(format!("cooling down ({}s)", c.remaining_secs)).fg(Color::Red),
            None if snapshot.current_index == Some(index) => Cell::new("current").fg(Color::Green),
            None => Cell::new("ready"),
        };
        table.add_row(vec![
            Cell::new(index),
            Cell::new(masked).fg(Color::Cyan),
            status,
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} key{} from {}, {} successful request{} this session",
        style(snapshot.keys.len()).bold(),
        if snapshot.keys.len() == 1 { "" } else { "s" },
        state.ledger.store().name(),
        snapshot.success_count,
        if snapshot.success_count == 1 { "" } else { "s" },
    );
    println!();
    Ok(())
}

/// Add a key with a hidden input prompt.
///
/// ```bash
/// # Secure prompt (recommended)
/// gist keys add anthropic
///
/// # Script/automation mode
/// gist keys add anthropic --value sk-ant-...
/// ```
pub fn add_key(
    state: &AppState,
    provider: ProviderId,
    value: Option<String>,
    json: bool,
) -> Result<()> {
    let secret: SecretString = match value {
        Some(v) => v.into(),
        None => Password::new()
            .with_prompt(format!("API key for {}", style(provider).bold()))
            .interact()?
            .into(),
    };

    let added = state.ledger.add_key(provider, secret.expose_secret())?;
    let masked = Credential::new(secret.expose_secret().trim()).masked();

    if json {
        println!(
            "{}",
            serde_json::json!({"provider": provider, "added": added, "masked": masked})
        );
    } else if added {
        println!(
            "  {} Key {} added for {}",
            style("✓").green().bold(),
            masked,
            style(provider).bold()
        );
    } else {
        println!(
            "  {} Key {} is empty or already configured for {}",
            style("i").blue().bold(),
            masked,
            style(provider).bold()
        );
    }
    Ok(())
}

pub fn remove_key(state: &AppState, provider: ProviderId, suffix: &str, json: bool) -> Result<()> {
    let removed = match state.ledger.remove_key(provider, suffix) {
        Err(CredentialStoreError::ReadOnly) => anyhow::bail!(
            "the {provider} key ending in '{suffix}' comes from an environment variable; \
             unset it there to remove it"
        ),
        other => other?,
    };

    if json {
        println!(
            "{}",
            serde_json::json!({"provider": provider, "removed": removed})
        );
    } else if removed == 0 {
        println!(
            "  {} No {} key ends with '{}'",
            style("i").blue().bold(),
            provider,
            suffix
        );
    } else {
        println!(
            "  {} Removed {} key{} from {}",
            style("✓").green().bold(),
            removed,
            if removed == 1 { "" } else { "s" },
            style(provider).bold()
        );
    }
    Ok(())
}

/// Clear rotation state. Rotation state lives in memory, so this only
/// matters within a running process (see `/reset-keys` in `gist chat`).
pub fn reset_keys(state: &AppState, provider: ProviderId, json: bool) -> Result<()> {
    state.ledger.reset(provider);
    if json {
        println!("{}", serde_json::json!({"provider": provider, "reset": true}));
    } else {
        println!(
            "  {} Rotation state for {} cleared",
            style("✓").green().bold(),
            style(provider).bold()
        );
    }
    Ok(())
}
