//! RIFF/WAVE chunk codec for nanoconv.
//!
//! Decodes a RIFF container into keyed sub-chunks, re-encodes it in the
//! canonical order (`fmt `, `data`, `smpl`, extensions) and synthesizes the
//! sampler (`smpl`) chunk that carries loop points, so loop metadata survives
//! when samples are handed to a sampler that reads it from the file.
//!
//! # Example
//!
//! ```ignore
//! let bytes = std::fs::read("tone.wav")?;
//! let looped = nanoconv_riff::add_loop_to_wave(&bytes, 10_000, 20_000)?;
//! std::fs::write("tone_looped.wav", looped)?;
//! ```

pub mod chunk;
pub mod container;
pub mod error;
pub mod wave;

pub use chunk::{
    ChunkKey, DataChunk, FormatChunk, FourCC, RiffChunk, SampleChunk, SampleLoop,
};
pub use container::RiffContainer;
pub use error::{ChunkError, Result};
pub use wave::{add_loop_to_wave, read_loop, strip_loop};
