use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Identity used as the author of new posts, comments and replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub avatar_url: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            username: "john_doe".to_string(),
            avatar_url: "https://images.unsplash.com/photo-1535713875002-d1d0cf377fde?w=150"
                .to_string(),
        }
    }
}

/// Client configuration stored locally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_url: String,
    #[serde(default)]
    pub profile: Profile,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: crate::server_config::DEFAULT_SERVER_URL.to_string(),
            profile: Profile::default(),
            last_updated: chrono::Utc::now(),
        }
    }
}

/// Configuration manager for the .picfeed directory
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a config manager rooted at `~/.picfeed`
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Could not determine home directory")?;
        Self::with_dir(home_dir.join(".picfeed"))
    }

    /// Create a config manager rooted at `config_dir`, creating it if needed
    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        }
        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// Save client configuration
    pub fn save_config(&self, config: &ClientConfig) -> Result<()> {
        let json =
            serde_json::to_string_pretty(config).context("Failed to serialize client config")?;
        fs::write(self.config_file(), json).context("Failed to write config file")?;
        Ok(())
    }

    /// Load client configuration, `None` if nothing was saved yet
    pub fn load_config(&self) -> Result<Option<ClientConfig>> {
        let config_file = self.config_file();
        if !config_file.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&config_file).context("Failed to read config file")?;
        let config: ClientConfig =
            serde_json::from_str(&json).context("Failed to parse config file")?;
        Ok(Some(config))
    }

    /// Load the saved configuration or fall back to defaults
    pub fn load_or_default(&self) -> Result<ClientConfig> {
        Ok(self.load_config()?.unwrap_or_default())
    }
}
