//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$CALIBDB_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/calibdb/config.toml`
//! 3. `~/.calibdb/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the default variation must be a valid name).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::RecordName;

/// On-disk configuration.
///
/// # Example
///
/// ```toml
/// default_variation = "default"
///
/// [perf]
/// enabled = true
/// time_units = "us"
///
/// [catalog]
/// strict_names = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Variation used when a query names none
    pub default_variation: Option<String>,

    /// Performance log settings
    pub perf: Option<PerfConfig>,

    /// Catalog construction settings
    pub catalog: Option<CatalogConfig>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(variation) = &self.default_variation {
            RecordName::validate(variation).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid default variation: {}", e))
            })?;
        }

        if let Some(perf) = &self.perf {
            perf.validate()?;
        }

        Ok(())
    }
}

/// Performance log settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PerfConfig {
    /// Emit one `CCDB_PERF_LOG:` line per resolution
    pub enabled: Option<bool>,

    /// Unit for the `elapsed` field ("us", "ms" or "s")
    pub time_units: Option<String>,
}

impl PerfConfig {
    /// Valid time units.
    pub const VALID_UNITS: &'static [&'static str] = &["us", "ms", "s"];

    /// Validate the perf configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(units) = &self.time_units {
            if !Self::VALID_UNITS.contains(&units.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid time units '{}', must be one of: {}",
                    units,
                    Self::VALID_UNITS.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Catalog construction settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Reject directory/table/column/variation names outside `[A-Za-z0-9_-]`
    pub strict_names: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FileConfig::default();
        assert!(config.default_variation.is_none());
        assert!(config.perf.is_none());
        assert!(config.catalog.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn valid_default_variation() {
        let config = FileConfig {
            default_variation: Some("mc".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_default_variation() {
        let config = FileConfig {
            default_variation: Some("not a name".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_time_units() {
        let config = FileConfig {
            perf: Some(PerfConfig {
                enabled: Some(true),
                time_units: Some("fortnights".to_string()),
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn roundtrip() {
        let config = FileConfig {
            default_variation: Some("default".to_string()),
            perf: Some(PerfConfig {
                enabled: Some(true),
                time_units: Some("ms".to_string()),
            }),
            catalog: Some(CatalogConfig {
                strict_names: Some(false),
            }),
        };

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: FileConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn reject_unknown_fields() {
        let toml = r#"
            default_variation = "default"
            unknown_field = true
        "#;

        let result: Result<FileConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
