//! Intermediate module emission for tessera.
//!
//! Turns dependency-graph nodes into evaluable chunks whose cross-definition
//! references go through a shared `all` table, reads chunks back, and tracks
//! which chunks changed between builds.

pub mod chunk;
pub mod error;
pub mod incremental;
pub mod render;

pub use chunk::{order_chunks, parse_chunk, ParsedChunk};
pub use error::CodegenError;
pub use incremental::{ChunkCache, ChunkPlan};
pub use render::{
    render_chunks, render_definition, render_file_chunk, render_single_chunk, IntermediateChunk,
    ALL_BINDING, SINGLE_CHUNK_ID,
};
