//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Programmatic overrides on the loaded [`Config`]
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$CALIBDB_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/calibdb/config.toml`
//! 3. `~/.calibdb/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use calibdb::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("Default variation: {}", config.default_variation());
//! println!("Perf log: {}", config.perf_enabled());
//! ```

pub mod schema;

pub use schema::{CatalogConfig, FileConfig, PerfConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CALIBDB_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Effective configuration.
///
/// Accessor methods apply defaults for anything the file leaves unset.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: FileConfig,
    /// Path the file was loaded from, if any
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or fails
    /// validation. A missing file is not an error (defaults are used).
    pub fn load() -> Result<Config, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let file = Self::read_config(path)?;
        file.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(Config {
            file,
            loaded_from: Some(path.to_path_buf()),
        })
    }

    /// Build a config from already-parsed values.
    pub fn from_file_config(file: FileConfig) -> Result<Config, ConfigError> {
        file.validate()?;
        Ok(Config {
            file,
            loaded_from: None,
        })
    }

    /// Find the first existing config file in the search order.
    fn locate() -> Option<PathBuf> {
        // 1. Check $CALIBDB_CONFIG
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/calibdb/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("calibdb/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.calibdb/config.toml
        dirs::home_dir()
            .map(|home| home.join(".calibdb/config.toml"))
            .filter(|path| path.exists())
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write a config file atomically.
    ///
    /// Creates parent directories if needed. Writes to a temp file in the
    /// same directory, then renames over the target.
    pub fn write_to(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Variation used when a query names none.
    ///
    /// Defaults to "default" if not configured.
    pub fn default_variation(&self) -> &str {
        self.file.default_variation.as_deref().unwrap_or("default")
    }

    /// Check if the performance log is enabled.
    ///
    /// Defaults to `false` if not configured.
    pub fn perf_enabled(&self) -> bool {
        self.file
            .perf
            .as_ref()
            .and_then(|p| p.enabled)
            .unwrap_or(false)
    }

    /// Unit for perf-log `elapsed` values.
    ///
    /// Defaults to "us" if not configured.
    pub fn perf_time_units(&self) -> &str {
        self.file
            .perf
            .as_ref()
            .and_then(|p| p.time_units.as_deref())
            .unwrap_or("us")
    }

    /// Check if record names are validated during catalog construction.
    ///
    /// Defaults to `true` if not configured.
    pub fn strict_names(&self) -> bool {
        self.file
            .catalog
            .as_ref()
            .and_then(|c| c.strict_names)
            .unwrap_or(true)
    }

    /// Get the path the config was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}
