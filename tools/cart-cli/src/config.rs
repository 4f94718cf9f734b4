//! CLI configuration.

use anyhow::{Context, Result};
use cart_client::ClientConfig;
use cart_sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// Names searched for, in order, from the working directory upward.
pub const CONFIG_NAMES: [&str; 3] = ["cart.toml", ".cart.toml", "cart.json"];

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Storefront connection.
    #[serde(default)]
    pub client: ClientConfig,

    /// Controller tunables.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Self = if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))?
        };

        config
            .sync
            .validate()
            .with_context(|| format!("Invalid [sync] section in {}", path))?;
        Ok(config)
    }

    /// Save config to a file.
    pub fn save(&self, path: &str) -> Result<()> {
        let content = if path.ends_with(".json") {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path))
    }
}

/// Generate a commented default cart.toml.
pub fn generate_default_config(base_url: &str) -> String {
    format!(
        r#"# Storefront cart configuration

[client]
base_url = "{base_url}"
# cart_token = "c1-0123456789abcdef"

[client.timeouts]
connect_ms = 2000
# 0 uses the per-endpoint default.
read_ms = 0
mutation_ms = 0

[sync]
currency = "USD"
# Minor units; 0 hides the free shipping bar.
free_shipping_threshold = 5000
undo_window_ms = 5000
undo_capacity = 1
note_debounce_ms = 1000
search_debounce_ms = 300
max_waiting_per_key = 1
open_drawer_on_add = true

[sync.retry]
max_attempts = 1
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_parses() {
        let config: CliConfig =
            toml::from_str(&generate_default_config("https://shop.example.com")).unwrap();
        assert_eq!(config.client.base_url, "https://shop.example.com");
        assert_eq!(config.client.cart_token, None);
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: CliConfig = toml::from_str("[sync]\nundo_capacity = 3\n").unwrap();
        assert_eq!(config.sync.undo_capacity, 3);
        assert_eq!(config.sync.undo_window_ms, 5000);
        assert_eq!(config.client, ClientConfig::default());
    }
}
