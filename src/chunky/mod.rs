// ============================================================================
// CHUNKY MODULE — tiled, multi-resolution raster storage with deferred edits
// ============================================================================
//
// Architecture:
//   resolution.rs — the four resolution tiers and a per-tier slot container
//   pool.rs       — recycling pool of fixed-size tile surfaces
//   chunk.rs      — one pooled tile, returned to its pool on drop
//   operations.rs — queued edit operations and their affected-area math
//   image.rs      — ChunkyImage: committed/latest layers, queue, commit/cancel
//   storage.rs    — snapshot of committed tiles for undo
// ============================================================================

pub mod chunk;
pub mod image;
pub mod operations;
pub mod pool;
pub mod resolution;
pub mod storage;

pub use chunk::Chunk;
pub use image::ChunkyImage;
pub use operations::{AffectedArea, RectangleData};
pub use pool::ChunkPool;
pub use resolution::{ChunkResolution, MultiResStore};
pub use storage::CommittedChunkStorage;
