//! Configuration management for spades-icp
//!
//! Configuration is loaded from `./config/spades.toml`. The same file is embedded in the
//! binary as [`DEFAULT_CONFIG`], so a missing file falls back to the shipped defaults.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/spades.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/spades.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub result: ResultConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// Remote endpoints used by the pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// CSV export of the persona reference dataset
    pub dataset_url: String,
    /// Metadata extraction service (target passed as `url` query parameter)
    pub metadata_endpoint: String,
    /// Base URL of the generative classification API
    pub classifier_endpoint: String,
    pub classifier_model: String,
}

/// Classifier credential lookup and retry behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Name of the environment variable that holds the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_delays_ms")]
    pub backoff_delays_ms: Vec<u64>,
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_delays_ms() -> Vec<u64> {
    vec![600, 1500]
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            backoff_delays_ms: default_backoff_delays_ms(),
        }
    }
}

impl ClassifierConfig {
    /// Read the credential from the configured environment variable.
    /// Unset and blank values both count as "no credential".
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    pub fn backoff_delays(&self) -> Vec<Duration> {
        self.backoff_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }
}

/// Result cache location and expiry
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_key_prefix() -> String {
    "spades_analysis_".to_string()
}

fn default_ttl_days() -> u64 {
    7
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            key_prefix: default_key_prefix(),
            ttl_days: default_ttl_days(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days * 24 * 60 * 60)
    }
}

/// Fixed values stamped onto every analysis result
#[derive(Debug, Clone, Deserialize)]
pub struct ResultConfig {
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    #[serde(default = "default_total_leads")]
    pub total_leads: u32,
    #[serde(default = "default_confidence_score")]
    pub confidence_score: u32,
}

fn default_primary_color() -> String {
    "#ea580c".to_string()
}

fn default_total_leads() -> u32 {
    5000
}

fn default_confidence_score() -> u32 {
    98
}

impl Default for ResultConfig {
    fn default() -> Self {
        Self {
            primary_color: default_primary_color(),
            total_leads: default_total_leads(),
            confidence_score: default_confidence_score(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to the embedded defaults when the file is missing.
    /// Parse and validation errors in an existing file are still reported.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_from_path(path) {
            Err(ConfigError::FileNotFound(missing)) => {
                warn!(
                    "Configuration file not found at {}, using built-in defaults",
                    missing.display()
                );
                Self::embedded()
            }
            other => other,
        }
    }

    /// Parse the embedded default configuration
    pub fn embedded() -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }

        self.validate_url("sources.dataset_url", &self.sources.dataset_url)?;
        self.validate_url("sources.metadata_endpoint", &self.sources.metadata_endpoint)?;
        self.validate_url("sources.classifier_endpoint", &self.sources.classifier_endpoint)?;

        if self.sources.classifier_model.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "sources.classifier_model".to_string(),
            });
        }
        if self.classifier.api_key_env.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "classifier.api_key_env".to_string(),
            });
        }
        if self.classifier.max_retries > 0 && self.classifier.backoff_delays_ms.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "classifier.backoff_delays_ms".to_string(),
                reason: "at least one delay is required when max_retries > 0".to_string(),
            });
        }

        if self.cache.key_prefix.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "cache.key_prefix".to_string(),
            });
        }
        if self.cache.ttl_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_days".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_url(&self, field: &str, value: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: field.to_string(),
            });
        }
        let valid = url::Url::parse(value)
            .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            return Err(ConfigError::InvalidUrl {
                field: field.to_string(),
                url: value.to_string(),
            });
        }
        Ok(())
    }

    /// Write the default configuration file to `path`
    pub fn create_default_config(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}
