use std::io;
use std::path::PathBuf;
use thiserror::Error;

use nanoconv_riff::ChunkError;

/// Errors that can occur while converting an SFZ instrument
///
/// Only conditions that make the result meaningless are errors. Opcodes the
/// target cannot represent are not: the resolver drops them and reports a
/// [`SchemaViolation`](crate::SchemaViolation) instead.
///
/// - `Parse` / `InvalidValue`: the source text is malformed. The whole file
///   is rejected and no partial tree is produced.
/// - `Chunk`: a referenced sample is not a usable RIFF/WAVE file. This only
///   affects that sample.
/// - `Sample`: the collaborator that supplies sample bytes failed.
#[derive(Error, Debug)]
pub enum Error {
    /// Input/Output error when reading files
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// Malformed SFZ text, with the 1-based position of the offending token
    #[error("Failed to parse SFZ at line {line}, column {column}: {message}")]
    Parse {
        /// Line number where the error occurred (1-based)
        line: usize,
        /// Column position where the error occurred (1-based)
        column: usize,
        /// Error message describing the problem
        message: String,
    },

    /// Invalid value for a specific opcode
    ///
    /// For example a key that is neither a number nor a note name
    /// (`lokey=h9`), or a transposition that is not an integer.
    #[error("Invalid value for opcode {opcode}: {value}")]
    InvalidValue {
        /// The opcode name
        opcode: String,
        /// The invalid value
        value: String,
    },

    /// A sample file could not be edited
    #[error("Invalid sample data: {0}")]
    Chunk(#[from] ChunkError),

    /// The sample store could not read or write a sample
    #[error("Sample '{path}': {source}")]
    Sample {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_value(opcode: impl ToString, value: impl ToString) -> Self {
        Error::InvalidValue {
            opcode: opcode.to_string(),
            value: value.to_string(),
        }
    }
}
