//! Chunky: tiled raster storage for a pixel-art editor.
//!
//! A [`ChunkyImage`] keeps a committed image split into square chunks at four
//! resolution tiers, plus a queue of pending edits that are rendered lazily
//! per chunk.  Edits become permanent on [`ChunkyImage::commit_changes`] or
//! are thrown away on [`ChunkyImage::cancel_changes`].

// Must come first so the log macros are visible to every other module.
#[macro_use]
pub mod logger;

pub mod chunky;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod surface;

pub use chunky::{
    AffectedArea, Chunk, ChunkPool, ChunkResolution, ChunkyImage, CommittedChunkStorage, RectangleData,
};
pub use color::{BlendMode, ColorSpace};
pub use config::EngineConfig;
pub use error::{ChunkyError, Result};
pub use geometry::{RectI, VecI};
pub use surface::Surface;
