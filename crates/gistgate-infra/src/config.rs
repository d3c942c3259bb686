//! Gateway configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.gistgate/` in production)
//! and deserializes it into [`GatewayConfig`]. Falls back to defaults when
//! the file is missing, malformed or fails validation.

use std::path::Path;

use gistgate_types::config::GatewayConfig;

use crate::filesystem::config_path;

/// Load configuration from `{data_dir}/config.toml`.
pub async fn load_gateway_config(data_dir: &Path) -> GatewayConfig {
    let path = config_path(data_dir);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", path.display());
            return GatewayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return GatewayConfig::default();
        }
    };

    let config = match toml::from_str::<GatewayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            return GatewayConfig::default();
        }
    };

    match config.validate() {
        Ok(()) => config,
        Err(err) => {
            tracing::warn!("Invalid {}: {err}, using defaults", path.display());
            GatewayConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gistgate_types::llm::ProviderId;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_gateway_config(tmp.path()).await;
        assert_eq!(config.max_switch_count, 3);
        assert!(config.providers.is_empty());
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
failed_key_cooldown_secs = 120
default_provider = "google"

[providers.google]
model = "gemini-2.5-pro"
temperature = 0.2
"#,
        )
        .await
        .unwrap();

        let config = load_gateway_config(tmp.path()).await;
        assert_eq!(config.failed_key_cooldown_secs, 120);
        assert_eq!(config.default_provider, "google");
        let google = config.provider_settings(ProviderId::Google);
        assert_eq!(google.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(google.temperature, Some(0.2));
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();
        let config = load_gateway_config(tmp.path()).await;
        assert_eq!(config.failed_key_cooldown_secs, 300);
    }

    #[tokio::test]
    async fn load_config_unknown_provider_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "default_provider = \"bedrock\"\n")
            .await
            .unwrap();
        let config = load_gateway_config(tmp.path()).await;
        assert_eq!(config.default_provider, "openai");
    }
}
