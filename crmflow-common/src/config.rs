//! Configuration loading and secret resolution
//!
//! Config file priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`~/.config/crmflow/<file>` on Linux)
//!
//! A missing file is not an error: callers get built-in defaults and a
//! `ConfigSource` to report once logging is up.
//! Secrets resolve ENV → TOML.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the per-user config directory
pub const CONFIG_DIR_NAME: &str = "crmflow";

/// Logging configuration shared by all crmflow binaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve which config file to read
///
/// Returns `None` only when no CLI/ENV path is given and the platform has no
/// config directory.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path(file_name)
}

/// Platform default config file location
pub fn default_config_path(file_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(file_name))
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// No file at the resolved location (if any); built-in defaults in use
    Defaults(Option<PathBuf>),
}

impl ConfigSource {
    /// Report the source; call once the subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => {
                info!("Loaded configuration from {}", path.display());
            }
            ConfigSource::Defaults(Some(path)) => {
                warn!(
                    "Config file not found at {}, using built-in defaults",
                    path.display()
                );
            }
            ConfigSource::Defaults(None) => {
                warn!("No config file location available, using built-in defaults");
            }
        }
    }
}

/// Load a TOML config file into `T`
///
/// A missing file (or no path at all) yields `T::default()` with
/// `ConfigSource::Defaults`. A file that exists but cannot be read or parsed
/// is an error.
///
/// Nothing is logged here: config is loaded before the subscriber that it
/// configures exists. Call `ConfigSource::log` after `logging::init`.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<(T, ConfigSource)>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok((T::default(), ConfigSource::Defaults(None)));
    };

    if !path.exists() {
        return Ok((T::default(), ConfigSource::Defaults(Some(path.to_path_buf()))));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    Ok((config, ConfigSource::File(path.to_path_buf())))
}

/// Resolve a secret from environment variable or TOML value
///
/// **Priority:** ENV → TOML. Blank values count as absent.
pub fn resolve_secret(
    name: &str,
    env_var_name: &str,
    toml_value: Option<&str>,
) -> Option<String> {
    let env_value = std::env::var(env_var_name).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both environment ({}) and TOML config. Using environment.",
            name, env_var_name
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable", name);
        return Some(value);
    }

    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", name);
        return Some(value.to_string());
    }

    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
