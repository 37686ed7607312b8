use std::collections::HashSet;

use rayon::prelude::*;

use super::chunk::Chunk;
use super::image::ChunkyImage;
use super::resolution::ChunkResolution;
use crate::color::BlendMode;
use crate::error::{ChunkyError, Result};
use crate::geometry::VecI;

/// Copies of a subset of committed Full chunks, taken before a batch of
/// edits so the batch can be undone later.
///
/// `None` entries record chunks that were absent at capture time; restoring
/// them deletes whatever chunk appeared there since.  Every saved buffer
/// comes from the store's pool and goes back to it on
/// [`dispose`](Self::dispose) or drop.
pub struct CommittedChunkStorage {
    chunk_size: u32,
    saved: Option<Vec<(VecI, Option<Chunk>)>>,
}

impl CommittedChunkStorage {
    /// Snapshot the committed Full chunks of `image` at `chunks`.
    pub fn new(image: &ChunkyImage, chunks: &HashSet<VecI>) -> Self {
        let mut positions: Vec<VecI> = chunks.iter().copied().collect();
        positions.sort_unstable_by_key(|p| (p.y, p.x));

        let mut saved: Vec<(VecI, Option<Chunk>)> = Vec::with_capacity(positions.len());
        for pos in positions {
            let copy = image.with_committed_chunk(pos, ChunkResolution::Full, Chunk::duplicate);
            saved.push((pos, copy));
        }
        Self {
            chunk_size: image.chunk_size(),
            saved: Some(saved),
        }
    }

    fn saved(&self) -> Result<&Vec<(VecI, Option<Chunk>)>> {
        self.saved
            .as_ref()
            .ok_or(ChunkyError::Disposed("CommittedChunkStorage"))
    }

    /// Enqueue operations on `image` that put the saved chunks back.  Nothing
    /// is committed; the caller decides when.
    pub fn apply_chunks_to_image(&self, image: &ChunkyImage) -> Result<()> {
        let saved = self.saved()?;
        if image.chunk_size() != self.chunk_size {
            return Err(ChunkyError::InvalidArgument(format!(
                "snapshot chunk size {} does not match image chunk size {}",
                self.chunk_size,
                image.chunk_size()
            )));
        }
        let cs = self.chunk_size as i32;
        for (pos, chunk) in saved {
            match chunk {
                None => image.enqueue_delete_chunk(*pos),
                Some(chunk) => image.enqueue_draw_image(*pos * cs, chunk.surface(), BlendMode::Src)?,
            }
        }
        Ok(())
    }

    /// Saved chunk positions, in restore order.
    pub fn positions(&self) -> Result<Vec<VecI>> {
        Ok(self.saved()?.iter().map(|(pos, _)| *pos).collect())
    }

    pub fn len(&self) -> usize {
        self.saved.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.saved.is_none()
    }

    /// Pixel memory held by saved chunks (bytes).
    pub fn memory_bytes(&self) -> usize {
        self.saved.as_ref().map_or(0, |saved| {
            saved
                .par_iter()
                .filter_map(|(_, chunk)| chunk.as_ref())
                .map(|c| {
                    let side = c.pixel_size() as usize;
                    side * side * 4
                })
                .sum()
        })
    }

    /// Release every saved buffer.  Later use fails with
    /// [`ChunkyError::Disposed`].
    pub fn dispose(&mut self) {
        self.saved = None;
    }
}
