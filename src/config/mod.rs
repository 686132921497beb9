//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::calculate::best_rating::DEFAULT_MIN_HISTORY_FACTOR;
use crate::calculate::popularity::{reference_edges, DEFAULT_BAND_OVERLAP, OPEN_EDGE};
use crate::fetch::FetcherConfig;
use crate::storage::StorageConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Best-rating and popularity banding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSettings {
    /// Window size for best-rating estimation
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// History must be at least this many windows long
    #[serde(default = "default_min_history_factor")]
    pub min_history_factor: f64,

    /// Overlap between consecutive rating bands
    #[serde(default = "default_band_overlap")]
    pub band_overlap: u32,

    /// Band edges; the open-ended top band is appended automatically
    #[serde(default = "default_band_edges")]
    pub band_edges: Vec<u32>,
}

fn default_window_size() -> usize {
    5
}

fn default_min_history_factor() -> f64 {
    DEFAULT_MIN_HISTORY_FACTOR
}

fn default_band_overlap() -> u32 {
    DEFAULT_BAND_OVERLAP
}

fn default_band_edges() -> Vec<u32> {
    reference_edges()
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            min_history_factor: default_min_history_factor(),
            band_overlap: default_band_overlap(),
            band_edges: default_band_edges(),
        }
    }
}

impl RatingSettings {
    /// Band edges with the open-edge sentinel guaranteed at the end.
    pub fn edges(&self) -> Vec<u32> {
        let mut edges = self.band_edges.clone();
        if edges.last() != Some(&OPEN_EDGE) {
            edges.push(OPEN_EDGE);
        }
        edges
    }
}

/// Ladder feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Feed base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Ladder to pull (4 = 1v1 random map)
    #[serde(default = "default_leaderboard_id")]
    pub leaderboard_id: u32,

    /// Rows requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Pause between consecutive requests in milliseconds
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,
}

fn default_base_url() -> String {
    "https://aoe2.net/api".to_string()
}

fn default_leaderboard_id() -> u32 {
    4
}

fn default_page_size() -> usize {
    10_000
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "ladder-meta/0.1".to_string()
}

fn default_request_delay() -> u64 {
    500
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            leaderboard_id: default_leaderboard_id(),
            page_size: default_page_size(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            request_delay_ms: default_request_delay(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Strings JSON file with civilization and map names
    #[serde(default = "default_strings_path")]
    pub strings_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub rating: RatingSettings,

    #[serde(default)]
    pub fetch: FetchSettings,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_strings_path() -> PathBuf {
    PathBuf::from("./data/strings.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            strings_path: default_strings_path(),
            log_level: default_log_level(),
            rating: RatingSettings::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rating.window_size == 0 {
            return Err(ConfigError::ValidationError(
                "Rating window size must be greater than 0".to_string(),
            ));
        }

        if self.rating.min_history_factor < 1.0 {
            return Err(ConfigError::ValidationError(
                "Minimum history factor must be at least 1".to_string(),
            ));
        }

        if !self.rating.band_edges.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(ConfigError::ValidationError(
                "Band edges must be strictly increasing".to_string(),
            ));
        }

        if self.fetch.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "Fetch page size must be greater than 0".to_string(),
            ));
        }

        if self.fetch.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Fetch timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Storage layout rooted at the configured data directory.
    pub fn storage(&self) -> StorageConfig {
        StorageConfig::new(&self.data_dir)
    }

    /// Fetcher settings in the form the fetch module consumes.
    pub fn fetcher(&self) -> FetcherConfig {
        FetcherConfig {
            base_url: self.fetch.base_url.clone(),
            leaderboard_id: self.fetch.leaderboard_id,
            page_size: self.fetch.page_size,
            timeout: Duration::from_secs(self.fetch.timeout_seconds),
            user_agent: self.fetch.user_agent.clone(),
            request_delay: Duration::from_millis(self.fetch.request_delay_ms),
        }
    }
}
