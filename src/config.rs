use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{domain::station::NewStation, reconcile::DEFAULT_TRIM_COUNT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub database: Database,
    #[serde(default)]
    pub youtube: Option<YoutubeConfig>,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// stations created at startup if missing
    #[serde(default)]
    pub stations: Vec<NewStation>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Config, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.database.in_memory && self.database.path.is_none() {
            return Err(ConfigError::Invalid(
                "database.path is required unless database.in_memory is set".into(),
            ));
        }
        if self.poll.min_sleep_secs > self.poll.max_sleep_secs {
            return Err(ConfigError::Invalid(format!(
                "poll.min_sleep_secs ({}) is greater than poll.max_sleep_secs ({})",
                self.poll.min_sleep_secs, self.poll.max_sleep_secs
            )));
        }
        if self.poll.trim_count == 0 {
            return Err(ConfigError::Invalid("poll.trim_count must be positive".into()));
        }
        if let Some(station) = self.stations.iter().find(|s| s.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "station with address '{}' has no name",
                station.web_address
            )));
        }
        Ok(())
    }

    /// YouTube settings, with a write token when the caller mirrors playlists
    pub fn youtube(&self, needs_token: bool) -> Result<&YoutubeConfig, ConfigError> {
        let youtube = self
            .youtube
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("[youtube] section is missing".into()))?;
        if needs_token && youtube.access_token.is_none() {
            return Err(ConfigError::Invalid(
                "youtube.access_token is required to update playlists".into(),
            ));
        }
        Ok(youtube)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub in_memory: bool,
    pub path: Option<PathBuf>,
}

impl Database {
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            path: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            in_memory: false,
            path: Some(path.into()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct YoutubeConfig {
    pub api_key: String,
    /// OAuth bearer token, only playlist writes use it
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_search_max_results")]
    pub search_max_results: u32,
}

fn default_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_search_max_results() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollConfig {
    pub min_sleep_secs: u64,
    pub max_sleep_secs: u64,
    pub trim_count: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            min_sleep_secs: 100,
            max_sleep_secs: 140,
            trim_count: DEFAULT_TRIM_COUNT,
        }
    }
}
