//! Config sources and merge order.

use super::SettleConfig;
use crate::error::ConfigError;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::Path;
use tracing::{debug, warn};

/// Environment prefix; `SETTLE__DIGEST__TTL=20` sets `digest.ttl`.
const ENV_PREFIX: &str = "SETTLE";
const ENV_SEPARATOR: &str = "__";

/// Loads [`SettleConfig`] from defaults, an optional file and the environment
pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence (highest last): defaults, `path` if it exists, environment.
    pub fn load(path: Option<&Path>) -> Result<SettleConfig, ConfigError> {
        let mut builder = builder_with_defaults()?;
        if let Some(path) = path {
            if path.exists() {
                debug!(config_path = %path.display(), "Loading configuration file");
                builder = builder.add_source(File::from(path).required(false));
            } else {
                warn!(
                    config_path = %path.display(),
                    "Configuration file not found; using defaults and environment"
                );
            }
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );
        finish(builder)
    }

    /// Defaults overlaid with inline TOML; the environment is not consulted.
    pub fn from_toml_str(source: &str) -> Result<SettleConfig, ConfigError> {
        let builder = builder_with_defaults()?.add_source(File::from_str(source, FileFormat::Toml));
        finish(builder)
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(Config::builder()
        .set_default("digest.ttl", i64::from(super::default_ttl()))?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<SettleConfig, ConfigError> {
    let config: SettleConfig = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
