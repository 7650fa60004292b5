//! nanoconv-cli - SFZ instrument conversion for the nanoconv sampler format
//!
//! The `nanoconv` binary wraps [`nanoconv_sfz`] and [`nanoconv_riff`] with
//! the parts that touch the filesystem:
//!
//! - TOML configuration (`[conversion]` session options, `[output]` policy)
//! - a [`FileSampleStore`] that copies samples into the destination and
//!   applies the overwrite policy
//! - the [`convert`](convert::convert) command that ties both together
//!
//! # Usage as a Library
//!
//! ```no_run
//! use nanoconv_cli::{convert::convert, Config};
//! use nanoconv_sfz::{ConversionSession, Schema};
//! use std::path::Path;
//!
//! let config = Config::load_or_default();
//! let session = ConversionSession::new(Schema::standard(), config.conversion);
//! let report = convert(
//!     Path::new("piano/piano.sfz"),
//!     Path::new("converted"),
//!     &session,
//!     config.output.overwrite,
//!     None,
//! )?;
//! println!("{} samples written", report.samples_written);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod store;

// Re-export main types
pub use config::{Config, OutputSettings};
pub use convert::ConversionReport;
pub use error::{Error, Result};
pub use store::{ConfirmOverwrite, FileSampleStore, OverwritePolicy};
