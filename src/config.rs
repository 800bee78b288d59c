//! Configuration module for the riff marketplace server.
//!
//! This module handles loading and validating configuration from TOML files.
//! Configuration can be loaded from a file path or from default locations.
//!
//! # Configuration Sources (in order of priority)
//! 1. `$RIFF_CONFIG` - Explicit path
//! 2. `config.local.toml` - Local overrides (gitignored)
//! 3. `config.toml` - Main configuration file
//!
//! # Example
//! ```rust,ignore
//! let config = Config::load("config.toml")?;
//! println!("Server will listen on {}:{}", config.server.host, config.server.port);
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding an explicit config path
pub const CONFIG_PATH_ENV: &str = "RIFF_CONFIG";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    #[serde(default)]
    pub staking: StakingConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind the API to
    pub host: String,
    /// Port for the API
    pub port: u16,
    /// Base URL for generating media URLs
    pub base_url: String,
    /// Cache-Control max-age in seconds for served media
    pub cache_max_age: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for all data
    pub data_dir: PathBuf,
    /// Directory for audio files (relative to data_dir)
    pub audio_dir: String,
    /// Directory for cover images (relative to data_dir)
    pub covers_dir: String,
    /// Number of directory nesting levels for file storage (0-4).
    /// Each level uses 2 hex characters from the media UUID.
    #[serde(default = "default_directory_levels")]
    pub directory_levels: u8,
}

fn default_directory_levels() -> u8 {
    2
}

impl StorageConfig {
    /// Get the full path to the audio directory
    pub fn audio_path(&self) -> PathBuf {
        self.data_dir.join(&self.audio_dir)
    }

    /// Get the full path to the covers directory
    pub fn covers_path(&self) -> PathBuf {
        self.data_dir.join(&self.covers_dir)
    }

    /// Get the full path to the RocksDB directory
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("rocksdb")
    }
}

/// Upload configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum size of the `audio` file (bytes)
    pub max_audio_size: u64,
    /// Maximum size of the `cover` file (bytes)
    pub max_cover_size: u64,
    /// Allowed MIME types for audio, as detected from magic bytes
    pub allowed_audio_types: Vec<String>,
    /// Allowed MIME types for cover images
    pub allowed_image_types: Vec<String>,
}

impl UploadConfig {
    /// Check if a MIME type is allowed for audio
    pub fn is_allowed_audio_type(&self, mime_type: &str) -> bool {
        self.allowed_audio_types.iter().any(|t| t == mime_type)
    }

    /// Check if a MIME type is allowed for cover images
    pub fn is_allowed_image_type(&self, mime_type: &str) -> bool {
        self.allowed_image_types.iter().any(|t| t == mime_type)
    }

    /// Largest request body an upload may produce, multipart overhead included
    pub fn max_request_size(&self) -> usize {
        (self.max_audio_size + self.max_cover_size) as usize + 64 * 1024
    }
}

/// Cover image processing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Output format for cover images (webp, jpeg, png)
    pub output_format: String,
    /// Quality for lossy formats (0-100)
    pub output_quality: u8,
    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,
}

/// Marketplace defaults applied to uploads and listings
#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
    /// Currency used when an upload does not name one
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Royalty percentage used when an upload does not set one
    #[serde(default = "default_royalty_percentage")]
    pub default_royalty_percentage: u8,
    /// Share of royalties paid to stakers when an upload does not set one
    #[serde(default = "default_staking_royalty_share")]
    pub default_staking_royalty_share: u8,
    /// Page size for listings without `limit`
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

fn default_currency() -> String {
    "ETH".to_string()
}

fn default_royalty_percentage() -> u8 {
    10
}

fn default_staking_royalty_share() -> u8 {
    50
}

fn default_page_size() -> u32 {
    20
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            default_royalty_percentage: default_royalty_percentage(),
            default_staking_royalty_share: default_staking_royalty_share(),
            default_page_size: default_page_size(),
        }
    }
}

/// Staking reward configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StakingConfig {
    /// Yearly reward rate applied to staked amounts (0.12 = 12%)
    #[serde(default = "default_annual_reward_rate")]
    pub annual_reward_rate: f64,
}

fn default_annual_reward_rate() -> f64 {
    0.12
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            annual_reward_rate: default_annual_reward_rate(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Maximum requests per window
    pub requests_per_window: u32,
    /// Window duration in seconds
    pub window_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Config {
    /// Load configuration from a file path
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed or validated
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Tries, in order: `$RIFF_CONFIG`, `config.local.toml`, `config.toml`.
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load(path);
        }

        if Path::new("config.local.toml").exists() {
            return Self::load("config.local.toml");
        }

        if Path::new("config.toml").exists() {
            return Self::load("config.toml");
        }

        Err(ConfigError::ValidationError(
            "No configuration file found. Expected config.toml or config.local.toml".to_string(),
        ))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.output_quality > 100 {
            return Err(ConfigError::ValidationError(
                "output_quality must be between 0 and 100".to_string(),
            ));
        }

        let valid_formats = ["webp", "jpeg", "jpg", "png"];
        if !valid_formats.contains(&self.processing.output_format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "output_format must be one of: {:?}",
                valid_formats
            )));
        }

        if self.server.base_url.ends_with('/') {
            return Err(ConfigError::ValidationError(
                "base_url should not have a trailing slash".to_string(),
            ));
        }

        if self.storage.directory_levels > 4 {
            return Err(ConfigError::ValidationError(
                "directory_levels must be between 0 and 4".to_string(),
            ));
        }

        if self.upload.allowed_audio_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "allowed_audio_types must not be empty".to_string(),
            ));
        }

        let page_size = self.marketplace.default_page_size;
        if !(1..=100).contains(&page_size) {
            return Err(ConfigError::ValidationError(
                "default_page_size must be between 1 and 100".to_string(),
            ));
        }

        if self.marketplace.default_royalty_percentage > 100
            || self.marketplace.default_staking_royalty_share > 100
        {
            return Err(ConfigError::ValidationError(
                "default royalty percentages must be between 0 and 100".to_string(),
            ));
        }

        if !self.staking.annual_reward_rate.is_finite() || self.staking.annual_reward_rate < 0.0 {
            return Err(ConfigError::ValidationError(
                "annual_reward_rate must be a non-negative number".to_string(),
            ));
        }

        if self.rate_limit.enabled
            && (self.rate_limit.requests_per_window == 0 || self.rate_limit.window_seconds == 0)
        {
            return Err(ConfigError::ValidationError(
                "rate_limit requires requests_per_window and window_seconds > 0".to_string(),
            ));
        }

        Ok(())
    }
}
