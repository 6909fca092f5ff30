use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Last.fm rejects page sizes above this
pub const MAX_LASTFM_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lastfm: LastFmConfig,
    #[serde(default)]
    pub youtube: YouTubeConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastFmConfig {
    #[serde(default)]
    pub username: String,
    /// Spreadsheet to reuse when no state file names one
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_lastfm_title")]
    pub spreadsheet_title: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_youtube_title")]
    pub spreadsheet_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    /// Pause after every successful remote call
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_lastfm_title() -> String {
    "last.fm scrobbles".to_string()
}

fn default_youtube_title() -> String {
    "YouTube Playlists".to_string()
}

fn default_page_size() -> u32 {
    MAX_LASTFM_PAGE_SIZE
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_delay_secs() -> u64 {
    3
}

fn default_throttle_ms() -> u64 {
    2000
}

fn default_http_timeout_secs() -> u64 {
    60
}

impl Default for LastFmConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            spreadsheet_id: String::new(),
            spreadsheet_title: default_lastfm_title(),
            page_size: default_page_size(),
        }
    }
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            spreadsheet_title: default_youtube_title(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            throttle_ms: default_throttle_ms(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl LastFmConfig {
    pub fn default_spreadsheet_id(&self) -> Option<&str> {
        non_empty(&self.spreadsheet_id)
    }
}

impl YouTubeConfig {
    pub fn default_spreadsheet_id(&self) -> Option<&str> {
        non_empty(&self.spreadsheet_id)
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Missing file yields the defaults
    pub fn load_or_default(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self, lastfm_requested: bool) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(anyhow::anyhow!("retry.max_attempts must be at least 1"));
        }

        if self.lastfm.page_size == 0 || self.lastfm.page_size > MAX_LASTFM_PAGE_SIZE {
            return Err(anyhow::anyhow!(
                "lastfm.page_size must be between 1 and {} (got {})",
                MAX_LASTFM_PAGE_SIZE,
                self.lastfm.page_size
            ));
        }

        if lastfm_requested && self.lastfm.username.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "lastfm.username is not set. Run 'sheetsync config init' and edit config.toml"
            ));
        }

        Ok(())
    }
}
