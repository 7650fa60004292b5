//! SFZ to hierarchical instrument conversion for nanoconv.
//!
//! SFZ is a flat sequence of `<header> opcode=value` blocks. The target
//! sampler expects a strict control > global > group > region tree in which
//! every level only carries the opcodes it understands. This crate gets
//! from one to the other:
//!
//! - [`lexer`] splits the text into header blocks
//! - [`hierarchy`] nests them and fills in omitted levels
//! - [`resolver`] moves opcodes to a level that may carry them
//! - [`normalizer`] rewrites keys, transpositions and sample paths
//! - [`velocity`] trims groups to the velocity layers the sampler supports
//! - [`session`] runs the pipeline and writes loop points into samples
//!
//! # Example
//!
//! ```
//! use nanoconv_sfz::{ConversionSession, HeaderKind, Opcode, Schema, SessionOptions};
//!
//! let session = ConversionSession::new(Schema::standard(), SessionOptions::default());
//! let resolution = session
//!     .resolve_str("<control> default_path=samples/\n<region> sample=c4.wav key=c4")
//!     .unwrap();
//!
//! let tree = &resolution.tree;
//! let region = tree.node(tree.nodes_of_kind(HeaderKind::Region)[0]);
//! assert_eq!(region.get(&Opcode::Sample), Some("samples/c4.wav"));
//! assert_eq!(region.get(&Opcode::PitchKeycenter), Some("60"));
//! ```

pub mod error;
pub mod hierarchy;
pub mod lexer;
pub mod normalizer;
pub mod path_utils;
pub mod resolver;
pub mod schema;
pub mod session;
pub mod tree;
pub mod velocity;

pub use error::{Error, Result};
pub use lexer::{lex, lex_bytes, AttributeBlock};
pub use normalizer::Normalizer;
pub use resolver::{Resolver, SchemaViolation};
pub use schema::{HeaderKind, Opcode, Schema, SchemaEntry};
pub use session::{
    ConversionSession, LoopEdit, LoopOutcome, Resolution, SampleStore, SessionOptions,
};
pub use tree::{DocumentNode, DocumentTree, NodeId};
pub use velocity::{VelocityLayers, VelocityZone};
