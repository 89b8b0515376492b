//! Converter configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `config/epi_convert.toml` (or an explicit path)
//! 3. Environment variables prefixed with `EPI_CONVERT_`; nested keys use a double
//!    underscore, e.g. `EPI_CONVERT_ROW_FLIP__MODE=negate`
//!
//! # Example
//! ```no_run
//! use epi_convert::config::ConverterConfig;
//!
//! let config = ConverterConfig::load()?;
//! config.validate()?;
//! println!("strict mode: {}", config.strict);
//! # Ok::<(), epi_convert::error::ConvertError>(())
//! ```

use crate::correction::RowFlipConfig;
use crate::error::{ConvertError, ConvertResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/epi_convert.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "EPI_CONVERT_";

/// Top-level converter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Abort on malformed packets instead of skipping them
    #[serde(default)]
    pub strict: bool,
    /// Row-flip correction settings
    #[serde(default)]
    pub row_flip: RowFlipConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            strict: false,
            row_flip: RowFlipConfig::default(),
        }
    }
}

impl ConverterConfig {
    /// Load configuration from the default file and environment variables
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> ConvertResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConvertError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }
}
