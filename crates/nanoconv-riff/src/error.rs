//! Error types for the nanoconv-riff crate.

use thiserror::Error;

/// Errors raised while decoding or encoding a RIFF container.
///
/// Every variant that concerns a specific chunk carries its four-character
/// id so the caller can report which part of the file is broken.
#[derive(Error, Debug)]
pub enum ChunkError {
    /// The buffer does not start with the expected magic or form type.
    #[error("Not a RIFF {expected} container (found {found:?})")]
    BadMagic { expected: String, found: String },

    /// The buffer ended inside a header or a fixed-size field.
    #[error("Truncated {context}: needed {needed} bytes, {available} available")]
    Truncated {
        context: String,
        needed: usize,
        available: usize,
    },

    /// A chunk declares more payload than the container holds.
    #[error("Chunk '{id}' declares {declared} bytes but only {available} remain")]
    LengthMismatch {
        id: String,
        declared: usize,
        available: usize,
    },

    /// A chunk required for loop editing is absent.
    #[error("Missing required '{0}' chunk")]
    MissingChunk(String),

    /// A chunk payload does not match its fixed layout.
    #[error("Malformed '{id}' chunk: {message}")]
    Malformed { id: String, message: String },

    /// Loop points are out of order.
    #[error("Invalid loop: start {start} is after end {end}")]
    InvalidLoop { start: u32, end: u32 },

    /// Writing into the output buffer failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using ChunkError.
pub type Result<T> = std::result::Result<T, ChunkError>;

/// Render a four-character code for diagnostics.
pub(crate) fn fourcc_name(id: &[u8; 4]) -> String {
    String::from_utf8_lossy(id).into_owned()
}
