//! Merge configuration file support
//!
//! Handles parsing of `scd-merge.toml` files, which bundle a column policy
//! with merge options, and environment variable overrides.

use crate::error::MergeResult;
use crate::merge::{MergeOptions, Merger};
use crate::models::ColumnPolicy;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "scd-merge.toml";

/// Environment variable for the type 3 alternate behaviour
pub const ENV_TYPE3_MODE: &str = "SCD_MERGE_TYPE3_MODE";

/// Environment variable for the surrogate key strategy
pub const ENV_SURROGATE_KEYS: &str = "SCD_MERGE_SURROGATE_KEYS";

/// Environment variable for the open-ended `effective_to` date
pub const ENV_SENTINEL: &str = "SCD_MERGE_SENTINEL";

/// Environment variable for the interval convention
pub const ENV_INTERVAL_END: &str = "SCD_MERGE_INTERVAL_END";

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main configuration structure
///
/// Represents the `scd-merge.toml` configuration file format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Merge-wide options
    #[serde(default)]
    pub options: MergeOptions,

    /// Column policy
    #[serde(default)]
    pub policy: ColumnPolicy,
}

impl MergeConfig {
    pub fn new(policy: ColumnPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Load configuration from a directory
    ///
    /// Looks for `scd-merge.toml` in the directory. Falls back to defaults if
    /// not found.
    pub fn load(dir: &Path) -> ConfigResult<Self> {
        let config_path = dir.join(CONFIG_FILENAME);
        let mut config = if config_path.exists() {
            Self::read(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit file path, then apply overrides
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a directory
    pub fn save(&self, dir: &Path) -> ConfigResult<()> {
        let config_path = dir.join(CONFIG_FILENAME);
        let content = self.to_toml()?;
        std::fs::write(&config_path, content)
            .map_err(|e| ConfigError::IoError(format!("Failed to write config: {}", e)))?;
        Ok(())
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to serialize config: {}", e))
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TYPE3_MODE) {
            match raw.parse() {
                Ok(mode) => self.options.type3_mode = mode,
                Err(e) => warn!("Ignoring {}: {}", ENV_TYPE3_MODE, e),
            }
        }

        if let Some(raw) = lookup(ENV_SURROGATE_KEYS) {
            match raw.parse() {
                Ok(strategy) => self.options.surrogate_keys = strategy,
                Err(e) => warn!("Ignoring {}: {}", ENV_SURROGATE_KEYS, e),
            }
        }

        if let Some(raw) = lookup(ENV_SENTINEL) {
            match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(date) => self.policy.versioning.sentinel = date,
                Err(e) => warn!("Ignoring {}: {}", ENV_SENTINEL, e),
            }
        }

        if let Some(raw) = lookup(ENV_INTERVAL_END) {
            match raw.parse() {
                Ok(end) => self.policy.versioning.interval_end = end,
                Err(e) => warn!("Ignoring {}: {}", ENV_INTERVAL_END, e),
            }
        }
    }

    /// Validate the policy and build a merger with these options
    pub fn merger(&self) -> MergeResult<Merger> {
        Ok(Merger::new(&self.policy)?.with_options(self.options))
    }

    /// Check if configuration exists in a directory
    pub fn exists(dir: &Path) -> bool {
        dir.join(CONFIG_FILENAME).exists()
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# SCD merge configuration
# Declares how each source column is historized and how the merge behaves.

[options]
# Type 3 alternate column behaviour: "freeze" (default) or "cascade"
type3_mode = "freeze"

# Surrogate key generator: "uuid" (default, deterministic) or "sequence"
surrogate_keys = "uuid"

# Process durable keys in parallel (requires the "parallel" feature)
parallel = false

[policy]
# Natural key columns identifying a dimension member
durable_key = ["customer"]

# Columns copied onto the current row without historization
pass_through = ["load_batch"]

[policy.columns]
# A single rule per column...
credit_score = { type = 2 }
segment = { type = 6 }
email = { type = 3, alternate_column = "previous_{name}" }

# ...or several compatible rules
signup_channel = [{ type = 0 }, { type = 1 }]

[policy.versioning]
surrogate_key = "surrogate_key"
effective_from = "effective_from"
effective_to = "effective_to"
current_flag = "is_current"
# Dates are quoted strings (YYYY-MM-DD)
sentinel = "9999-12-31"
# "inclusive" (closed row ends the day before the change) or "exclusive"
interval_end = "inclusive"

[policy.naming]
type0 = "original_{name}"
type1 = "current_{name}"
"#
}
