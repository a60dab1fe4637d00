//! Configuration System
//!
//! Layered configuration for the engine and its logging: built-in defaults, then an
//! optional TOML file, then `SETTLE__*` environment variables.

mod loader;

pub use loader::ConfigLoader;

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettleConfig {
    /// Stabilization settings
    #[serde(default)]
    pub digest: DigestConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Stabilization settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Dirty passes allowed after the first before a cycle gives up
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

pub(crate) fn default_ttl() -> u32 {
    10
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self { ttl: default_ttl() }
    }
}

impl DigestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl == 0 {
            return Err(ConfigError::Invalid(
                "digest.ttl must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl SettleConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.digest.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Render as TOML, in the shape [`ConfigLoader`] reads back.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("Failed to serialize configuration: {}", e)))
    }
}
