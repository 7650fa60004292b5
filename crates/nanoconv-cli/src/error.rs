//! Error types for the nanoconv command

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for nanoconv-cli operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in nanoconv-cli
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The destination would overwrite the source instrument
    #[error("Destination {0:?} must differ from the source directory")]
    SameDirectory(PathBuf),

    /// A sample path that cannot be placed inside the destination
    #[error("Sample path {0:?} leaves the instrument directory")]
    SamplePath(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
