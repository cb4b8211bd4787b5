use crate::config::{ClientConfig, ConfigManager};
use anyhow::Result;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8787/trpc";
pub const SERVER_URL_ENV: &str = "PICFEED_SERVER_URL";

/// Pick the server URL by priority: CLI flag, environment, saved config, default
pub fn resolve_server_url(
    cli_override: Option<String>,
    env_value: Option<String>,
    saved: Option<&ClientConfig>,
) -> String {
    cli_override
        .or(env_value)
        .or_else(|| saved.map(|c| c.server_url.clone()))
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
}

/// Server configuration utility for managing server URL settings
pub struct ServerConfigManager {
    config_manager: ConfigManager,
}

impl ServerConfigManager {
    pub fn new(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Determine the server URL to use, reading the environment and saved config
    pub fn determine_server_url(&self, cli_override: Option<String>) -> Result<String> {
        let saved = self.config_manager.load_config()?;
        Ok(resolve_server_url(
            cli_override,
            std::env::var(SERVER_URL_ENV).ok(),
            saved.as_ref(),
        ))
    }

    /// Save server URL to the configuration file, keeping the rest of the config
    pub fn save_server_url(&self, server_url: String) -> Result<()> {
        let mut config = self.config_manager.load_or_default()?;
        config.server_url = server_url;
        config.last_updated = chrono::Utc::now();
        self.config_manager.save_config(&config)
    }

    /// Get a display-friendly description of the current server configuration
    pub fn get_server_description(&self, current_url: &str) -> String {
        if current_url == DEFAULT_SERVER_URL {
            "Local Development Server (default)".to_string()
        } else if current_url.contains("localhost") || current_url.contains("127.0.0.1") {
            "Local Development Server (custom)".to_string()
        } else {
            "Custom Server".to_string()
        }
    }
}
