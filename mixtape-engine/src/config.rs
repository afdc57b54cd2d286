//! Settings loading
//!
//! Engine settings live in an optional TOML file:
//!
//! ```toml
//! [mixer]
//! fallback_average_duration_ms = 210000   # 0 disables the fallback
//! default_seed = 7523094288207667809
//!
//! [logging]
//! level = "info"
//! ```
//!
//! # Resolution priority
//!
//! 1. Explicit path (command-line argument)
//! 2. `MIXTAPE_CONFIG` environment variable
//! 3. `<user config dir>/mixtape/config.toml`
//! 4. Built-in defaults
//!
//! A missing file is not an error: the caller gets the defaults and a
//! [`SettingsOrigin::Missing`] to warn about.
//! A file that exists but does not parse is an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::weights::DEFAULT_FALLBACK_AVERAGE_DURATION_MS;

/// Environment variable naming the settings file
pub const CONFIG_ENV_VAR: &str = "MIXTAPE_CONFIG";

/// Seed used when the caller does not supply one ("mixtape!" in ASCII)
pub const DEFAULT_SEED: u64 = 0x6d69_7874_6170_6521;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerSettings {
    /// Average item duration assumed for pools with no known durations; 0 disables it
    pub fallback_average_duration_ms: u64,

    /// Seed used when a mix call does not pass one
    pub default_seed: u64,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            fallback_average_duration_ms: DEFAULT_FALLBACK_AVERAGE_DURATION_MS,
            default_seed: DEFAULT_SEED,
        }
    }
}

impl MixerSettings {
    /// Fallback average duration, if enabled
    pub fn fallback(&self) -> Option<u64> {
        (self.fallback_average_duration_ms > 0).then_some(self.fallback_average_duration_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Settings file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub mixer: MixerSettings,
    pub logging: LoggingConfig,
}

/// Where loaded settings came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsOrigin {
    /// Parsed from this file
    File(PathBuf),
    /// This file was named but does not exist; defaults in use
    Missing(PathBuf),
    /// No file named and no per-user file; defaults in use
    BuiltIn,
}

impl SettingsOrigin {
    /// Report the origin; call once a subscriber is installed
    pub fn log(&self) {
        match self {
            SettingsOrigin::File(path) => info!("Loaded settings from {}", path.display()),
            SettingsOrigin::Missing(path) => warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            ),
            SettingsOrigin::BuiltIn => info!("No config file found, using built-in defaults"),
        }
    }
}

impl TomlConfig {
    /// Resolve and load settings, falling back to defaults when no file exists
    ///
    /// Nothing is logged here: settings usually decide the log level, so the caller
    /// reports the returned origin after setting up logging.
    pub fn load(cli_path: Option<&Path>) -> Result<(Self, SettingsOrigin)> {
        match resolve_config_path(cli_path) {
            Some(path) if path.exists() => {
                let config = load_toml_config(&path)?;
                Ok((config, SettingsOrigin::File(path)))
            }
            Some(path) => Ok((Self::default(), SettingsOrigin::Missing(path))),
            None => Ok((Self::default(), SettingsOrigin::BuiltIn)),
        }
    }
}

/// Settings file path following the resolution priority
///
/// Explicit and environment paths are returned even when the file does not exist,
/// so the caller can report them. The per-user default is only returned if present.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("mixtape").join("config.toml"))
        .filter(|p| p.exists())
}

/// Parse a settings file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Settings(format!("Parse {} failed: {}", path.display(), e)))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = MixerSettings::default();
        assert_eq!(settings.fallback(), Some(DEFAULT_FALLBACK_AVERAGE_DURATION_MS));
        assert_eq!(settings.default_seed, DEFAULT_SEED);
        assert_eq!(TomlConfig::default().logging.level, "info");
    }

    #[test]
    fn test_zero_disables_fallback() {
        let settings = MixerSettings {
            fallback_average_duration_ms: 0,
            ..MixerSettings::default()
        };
        assert_eq!(settings.fallback(), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TomlConfig = toml::from_str("[mixer]\ndefault_seed = 5\n").unwrap();
        assert_eq!(config.mixer.default_seed, 5);
        assert_eq!(
            config.mixer.fallback_average_duration_ms,
            DEFAULT_FALLBACK_AVERAGE_DURATION_MS
        );
        assert_eq!(config.logging, LoggingConfig::default());
    }
}
