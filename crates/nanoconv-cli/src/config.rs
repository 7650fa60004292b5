//! Configuration file support for nanoconv
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/nanoconv/config.toml`
//! - macOS: `~/Library/Application Support/nanoconv/config.toml`
//! - Windows: `%APPDATA%\nanoconv\config.toml`

use crate::error::{Error, Result};
use crate::store::OverwritePolicy;
use directories::ProjectDirs;
use nanoconv_sfz::SessionOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Content written by `nanoconv init`
pub const DEFAULT_CONFIG: &str = r#"# nanoconv configuration file

[conversion]
# Prefix for sample paths of instruments that set no default_path
# default_path = "samples/"

# Velocity layers kept per instrument (the target sampler supports 3)
max_velocity_zones = 3

# Sample zones kept per velocity layer (the target sampler supports 32)
max_regions_per_zone = 32

[output]
# What to do when a destination file already exists: "ask", "always" or "never"
overwrite = "ask"
"#;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Resolution settings handed to the conversion session
    pub conversion: SessionOptions,
    /// Output file handling
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub overwrite: OverwritePolicy,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "nanoconv") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG)?;
        Ok(path)
    }
}
