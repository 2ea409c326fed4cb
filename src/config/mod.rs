//! Configuration module for the KS2 decoder
//!
//! Supports loading decoder settings from a TOML file. Every field has a
//! default, so an empty file (or no `[decoder]` table) is valid.
//!
//! # Example
//! ```ignore
//! let config = Config::load("config.toml")?;
//! let decoder = Ks2Decoder::new(config.decoder_config()?);
//! ```
//!
//! ```toml
//! [decoder]
//! streaming_threshold_mib = 512
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::ks2::DecoderConfig;

const MIB: u64 = 1024 * 1024;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Decoder configuration
    #[serde(default)]
    pub decoder: DecoderFileConfig,
}

/// Decoder section of the config file
#[derive(Debug, Clone, Deserialize)]
pub struct DecoderFileConfig {
    /// Bulk payloads above this size (MiB) are read in chunks
    #[serde(default = "default_streaming_threshold_mib")]
    pub streaming_threshold_mib: u64,
}

impl Default for DecoderFileConfig {
    fn default() -> Self {
        Self {
            streaming_threshold_mib: default_streaming_threshold_mib(),
        }
    }
}

fn default_streaming_threshold_mib() -> u64 {
    512
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Override the streaming threshold (e.g. from a command-line flag)
    pub fn with_threshold_mib(mut self, mib: Option<u64>) -> Self {
        if let Some(mib) = mib {
            self.decoder.streaming_threshold_mib = mib;
        }
        self
    }

    /// Validate and convert to the runtime decoder configuration
    pub fn decoder_config(&self) -> Result<DecoderConfig, ConfigError> {
        let mib = self.decoder.streaming_threshold_mib;
        if mib == 0 {
            return Err(ConfigError::invalid(
                "decoder.streaming_threshold_mib",
                "must be greater than zero",
            ));
        }
        let bytes = mib
            .checked_mul(MIB)
            .ok_or_else(|| ConfigError::invalid("decoder.streaming_threshold_mib", "too large"))?;
        Ok(DecoderConfig {
            streaming_threshold_bytes: bytes,
        })
    }
}
