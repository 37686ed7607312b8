// ============================================================================
// CHUNKY IMAGE — sparse multi-resolution tiled store with deferred operations
// ============================================================================
//
// Mutations only enqueue an operation together with the chunks it can
// affect.  Reads materialize the requested chunk by replaying the queued
// operations that touch it, and `commit_changes` folds every materialized
// chunk into the committed store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::Rgba;
use rayon::prelude::*;
use uuid::Uuid;

use super::chunk::Chunk;
use super::operations::{
    AffectedArea, ClearRegionOperation, ClipSource, DrawOperation, ImageOperation, Operation,
    RectangleData, RectangleOperation, is_outside_bounds,
};
use super::pool::ChunkPool;
use super::resolution::{ChunkResolution, MultiResStore};
use crate::color::{self, BlendMode, ColorSpace, TRANSPARENT};
use crate::config::EngineConfig;
use crate::error::{ChunkyError, Result};
use crate::geometry::{RectI, VecI};
use crate::surface::Surface;
use crate::{log_debug, log_err, log_info};

struct QueuedOperation {
    operation: Operation,
    affected: AffectedArea,
}

impl QueuedOperation {
    /// Whether replaying this operation can change the chunk at `pos`.
    fn touches(&self, pos: VecI, chunk_size: u32) -> bool {
        match &self.operation {
            Operation::Clear => true,
            Operation::Resize { size } => is_outside_bounds(pos, *size, chunk_size),
            Operation::RasterClip(_) => false,
            _ => self.affected.chunks.contains(&pos),
        }
    }
}

/// Speculative content of a chunk with part of the queue applied.
enum LatestContent {
    /// Logically cleared; no buffer is held.
    Deleted,
    Drawn(Chunk),
}

struct LatestChunk {
    /// Number of queued operations already applied.
    progress: usize,
    content: LatestContent,
}

impl LatestChunk {
    fn is_deleted(&self) -> bool {
        matches!(self.content, LatestContent::Deleted)
    }

    fn chunk(&self) -> Option<&Chunk> {
        match &self.content {
            LatestContent::Drawn(chunk) => Some(chunk),
            LatestContent::Deleted => None,
        }
    }
}

/// Combined alpha of every raster clip in the queue, for one chunk.
enum ClipMask {
    Unclipped,
    /// Some mask has no committed chunk here: nothing may be drawn.
    FullyClipped,
    Mask(Chunk),
}

struct ImageState {
    pool: Arc<ChunkPool>,
    chunk_size: u32,
    color_space: ColorSpace,
    committed_size: VecI,
    latest_size: VecI,
    committed: MultiResStore<HashMap<VecI, Chunk>>,
    latest: MultiResStore<HashMap<VecI, LatestChunk>>,
    queue: Vec<QueuedOperation>,
    commit_counter: u32,
}

impl ImageState {
    // ---- committed reads ------------------------------------------------------

    fn committed_chunk_exists(&self, pos: VecI, res: ChunkResolution) -> bool {
        self.committed[res].contains_key(&pos) || self.committed[ChunkResolution::Full].contains_key(&pos)
    }

    /// Committed chunk at `res`, deriving (and caching) a lower tier from the
    /// Full chunk on first request.
    fn committed_chunk(&mut self, pos: VecI, res: ChunkResolution) -> Option<&Chunk> {
        if res != ChunkResolution::Full && !self.committed[res].contains_key(&pos) {
            let derived = self.committed[ChunkResolution::Full]
                .get(&pos)
                .map(|full| full.downsample(res));
            if let Some(chunk) = derived {
                self.committed[res].insert(pos, chunk);
            }
        }
        self.committed[res].get(&pos)
    }

    fn find_committed_chunks(&self) -> HashSet<VecI> {
        self.committed[ChunkResolution::Full].keys().copied().collect()
    }

    fn find_affected_area(&self) -> AffectedArea {
        let mut area = AffectedArea::default();
        for queued in &self.queue {
            area.union_with(&queued.affected);
        }
        area
    }

    fn find_all_chunks(&self) -> HashSet<VecI> {
        let mut all = self.find_committed_chunks();
        for queued in &self.queue {
            all.extend(queued.affected.chunks.iter().copied());
        }
        all
    }

    // ---- queue ----------------------------------------------------------------

    fn enqueue(&mut self, operation: Operation) {
        let needs_known = match &operation {
            Operation::Clear | Operation::Resize { .. } | Operation::DeleteChunk(_) => true,
            op => op.as_draw().is_some_and(|d| d.ignore_empty_chunks()),
        };
        let known = if needs_known { self.find_all_chunks() } else { HashSet::new() };
        let affected = operation.find_affected_area(self.latest_size, self.chunk_size, &known);
        match &operation {
            Operation::Resize { size } => self.latest_size = *size,
            // A clip changes how every queued draw lands, including ones
            // already replayed.
            Operation::RasterClip(_) => {
                for (_, latest) in self.latest.iter_mut() {
                    latest.clear();
                }
            }
            _ => {}
        }
        log_debug!("enqueued {} ({} chunks)", operation.name(), affected.chunks.len());
        self.queue.push(QueuedOperation { operation, affected });
    }

    // ---- materialization --------------------------------------------------------

    /// Replay every not-yet-applied queued operation touching `pos` at `res`.
    fn materialize(&mut self, pos: VecI, res: ChunkResolution) {
        let queue_len = self.queue.len();
        let existing = self.latest[res].remove(&pos);
        let start = existing.as_ref().map_or(0, |e| e.progress);

        let first = (start..queue_len).find(|&i| self.queue[i].touches(pos, self.chunk_size));
        let Some(first) = first else {
            if let Some(mut entry) = existing {
                entry.progress = queue_len;
                self.latest[res].insert(pos, entry);
            }
            return;
        };

        let mut entry = match existing {
            Some(entry) => entry,
            None => {
                let content = match self.committed_chunk(pos, res) {
                    Some(chunk) => LatestContent::Drawn(chunk.duplicate()),
                    None => LatestContent::Deleted,
                };
                LatestChunk { progress: 0, content }
            }
        };

        let clip = self.combine_raster_clips(pos, res);
        for index in first..queue_len {
            let content = std::mem::replace(&mut entry.content, LatestContent::Deleted);
            entry.content = self.apply_operation(index, content, &clip, pos, res);
        }
        entry.progress = queue_len;
        self.latest[res].insert(pos, entry);
    }

    fn apply_operation(
        &self,
        index: usize,
        content: LatestContent,
        clip: &ClipMask,
        pos: VecI,
        res: ChunkResolution,
    ) -> LatestContent {
        let queued = &self.queue[index];
        match &queued.operation {
            Operation::Clear => LatestContent::Deleted,
            Operation::Resize { size } => {
                if is_outside_bounds(pos, *size, self.chunk_size) {
                    LatestContent::Deleted
                } else {
                    content
                }
            }
            Operation::RasterClip(_) => content,
            Operation::DeleteChunk(target) if *target == pos => LatestContent::Deleted,
            Operation::DeleteChunk(_) => content,
            operation => {
                let Some(draw) = operation.as_draw() else {
                    return content;
                };
                if !queued.affected.chunks.contains(&pos) {
                    return content;
                }
                if draw.ignore_empty_chunks() && matches!(content, LatestContent::Deleted) {
                    return content;
                }
                if matches!(clip, ClipMask::FullyClipped) {
                    return content;
                }
                let mut target = match content {
                    LatestContent::Drawn(chunk) => chunk,
                    LatestContent::Deleted => self.pool.acquire(res, self.color_space),
                };
                match clip {
                    // Composite on a copy, keep the copy inside the mask and
                    // the old pixels outside it.
                    ClipMask::Mask(mask) => {
                        let mut drawn = target.duplicate();
                        draw.draw_on_chunk(&mut drawn, pos, self.chunk_size);
                        drawn
                            .surface_mut()
                            .draw_surface(mask.surface(), VecI::ZERO, BlendMode::DstIn);
                        let target_surface = target.surface_mut();
                        target_surface.draw_surface(mask.surface(), VecI::ZERO, BlendMode::DstOut);
                        target_surface.draw_surface(drawn.surface(), VecI::ZERO, BlendMode::Plus);
                    }
                    _ => draw.draw_on_chunk(&mut target, pos, self.chunk_size),
                }
                LatestContent::Drawn(target)
            }
        }
    }

    /// Intersect the committed alpha of every queued clip mask at `pos`.
    /// A clip on this same store reads its committed map directly.
    fn combine_raster_clips(&mut self, pos: VecI, res: ChunkResolution) -> ClipMask {
        let sources: Vec<ClipSource> = self
            .queue
            .iter()
            .filter_map(|q| match &q.operation {
                Operation::RasterClip(source) => Some(source.clone()),
                _ => None,
            })
            .collect();

        let mut combined = ClipMask::Unclipped;
        for source in sources {
            let mask = match source {
                ClipSource::SelfCommitted => self.committed_chunk(pos, res).map(Chunk::duplicate),
                ClipSource::Other(image) => image.committed_chunk_copy(pos, res),
            };
            let Some(mask) = mask else {
                return ClipMask::FullyClipped;
            };
            combined = match combined {
                ClipMask::Mask(mut acc) => {
                    acc.surface_mut()
                        .draw_surface(mask.surface(), VecI::ZERO, BlendMode::DstIn);
                    ClipMask::Mask(acc)
                }
                _ => ClipMask::Mask(mask),
            };
        }
        combined
    }

    /// Latest chunk at `res`, falling back to committed data when no queued
    /// operation touches it.  `None` when the chunk is absent or deleted.
    fn latest_chunk(&mut self, pos: VecI, res: ChunkResolution) -> Option<&Chunk> {
        if self.queue.is_empty() {
            return self.committed_chunk(pos, res);
        }
        self.materialize(pos, res);
        match self.latest[res].get(&pos).map(LatestChunk::is_deleted) {
            Some(true) => None,
            Some(false) => self.latest[res].get(&pos).and_then(LatestChunk::chunk),
            None => self.committed_chunk(pos, res),
        }
    }

    // ---- commit / cancel --------------------------------------------------------

    fn commit(&mut self, cleanup_interval: u32) {
        let queue_len = self.queue.len();
        let AffectedArea { chunks: mut to_process, global_area } = self.find_affected_area();
        to_process.extend(self.latest[ChunkResolution::Full].keys().copied());
        for pos in &to_process {
            self.materialize(*pos, ChunkResolution::Full);
        }

        let mut fresh: MultiResStore<HashSet<VecI>> = MultiResStore::from_fn(|_| HashSet::new());
        let mut committed_count = 0usize;
        let mut removed_count = 0usize;
        for res in ChunkResolution::ALL {
            let latest = std::mem::take(&mut self.latest[res]);
            for (pos, entry) in latest {
                if entry.progress != queue_len {
                    if res == ChunkResolution::Full {
                        log_err!(
                            "commit: Full chunk {:?} applied {} of {} queued operations",
                            pos,
                            entry.progress,
                            queue_len
                        );
                        panic!(
                            "attempted to commit Full chunk {:?} that was not fully processed ({} of {})",
                            pos, entry.progress, queue_len
                        );
                    }
                    // stale lower tier, re-derived on demand
                    continue;
                }
                fresh[res].insert(pos);
                match entry.content {
                    LatestContent::Drawn(chunk) => {
                        self.committed[res].insert(pos, chunk);
                        if res == ChunkResolution::Full {
                            committed_count += 1;
                        }
                    }
                    LatestContent::Deleted => {
                        if self.committed[res].remove(&pos).is_some() && res == ChunkResolution::Full {
                            removed_count += 1;
                        }
                    }
                }
            }
        }

        // Lower tiers that were not brought up to date no longer match Full.
        for pos in &to_process {
            for res in &ChunkResolution::ALL[1..] {
                if !fresh[*res].contains(pos) {
                    self.committed[*res].remove(pos);
                }
            }
        }

        self.committed_size = self.latest_size;
        self.queue.clear();
        self.commit_counter = self.commit_counter.wrapping_add(1);
        log_debug!(
            "commit #{}: {} operations, {} chunks committed, {} removed, dirty {:?}",
            self.commit_counter,
            queue_len,
            committed_count,
            removed_count,
            global_area
        );

        if self.commit_counter % cleanup_interval == 0 {
            self.remove_transparent_chunks();
        }
    }

    /// Drop committed Full chunks with no visible pixels, along with their
    /// lower-tier counterparts.
    fn remove_transparent_chunks(&mut self) {
        let empty: Vec<VecI> = self.committed[ChunkResolution::Full]
            .par_iter()
            .filter(|(_, chunk)| chunk.is_fully_transparent())
            .map(|(pos, _)| *pos)
            .collect();
        if empty.is_empty() {
            return;
        }
        for pos in &empty {
            for res in ChunkResolution::ALL {
                self.committed[res].remove(pos);
            }
        }
        log_info!("removed {} fully transparent chunks", empty.len());
    }

    fn cancel(&mut self) {
        for (_, latest) in self.latest.iter_mut() {
            latest.clear();
        }
        self.queue.clear();
        self.latest_size = self.committed_size;
    }
}

/// Sparse tiled image with a committed state and a queue of speculative
/// operations on top of it.
///
/// Every public method takes the store's lock for its whole duration; there
/// is no internal parallelism between calls.  A raster clip that references
/// another store locks that store too, so two stores must not clip each other
/// within the same batch.
pub struct ChunkyImage {
    id: Uuid,
    pool: Arc<ChunkPool>,
    chunk_size: u32,
    color_space: ColorSpace,
    cleanup_interval: u32,
    state: Mutex<ImageState>,
}

impl ChunkyImage {
    /// Empty store in sRGB using the pool's chunk size.
    pub fn new(size: VecI, pool: Arc<ChunkPool>) -> Result<Self> {
        let config = EngineConfig::with_chunk_size(pool.chunk_size());
        Self::with_config(size, pool, &config)
    }

    pub fn with_config(size: VecI, pool: Arc<ChunkPool>, config: &EngineConfig) -> Result<Self> {
        if !size.is_positive() {
            return Err(ChunkyError::InvalidArgument(format!(
                "image size must be positive, got {}×{}",
                size.x, size.y
            )));
        }
        config.validate()?;
        if config.chunk_size != pool.chunk_size() {
            return Err(ChunkyError::InvalidArgument(format!(
                "config chunk size {} does not match pool chunk size {}",
                config.chunk_size,
                pool.chunk_size()
            )));
        }
        let id = Uuid::new_v4();
        log_debug!("chunky image {} created ({}×{})", id, size.x, size.y);
        Ok(Self {
            id,
            pool: Arc::clone(&pool),
            chunk_size: config.chunk_size,
            color_space: config.color_space,
            cleanup_interval: config.cleanup_interval,
            state: Mutex::new(ImageState {
                pool,
                chunk_size: config.chunk_size,
                color_space: config.color_space,
                committed_size: size,
                latest_size: size,
                committed: MultiResStore::from_fn(|_| HashMap::new()),
                latest: MultiResStore::from_fn(|_| HashMap::new()),
                queue: Vec::new(),
                commit_counter: 0,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, ImageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn config(&self) -> EngineConfig {
        EngineConfig {
            chunk_size: self.chunk_size,
            cleanup_interval: self.cleanup_interval,
            color_space: self.color_space,
            pool_capacity: self.pool.capacity(),
            log_file: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn pool(&self) -> &Arc<ChunkPool> {
        &self.pool
    }

    pub fn committed_size(&self) -> VecI {
        self.state().committed_size
    }

    /// Size after every queued resize.
    pub fn latest_size(&self) -> VecI {
        self.state().latest_size
    }

    pub fn queue_len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn commit_counter(&self) -> u32 {
        self.state().commit_counter
    }

    /// How many queued operations the latest chunk at `pos` has applied,
    /// `None` when it has not been materialized.
    ///
    /// Progress only grows within a batch, except that enqueueing a raster
    /// clip discards every latest chunk: they are replayed from the committed
    /// state under the new mask on the next read.
    pub fn queue_progress(&self, pos: VecI, res: ChunkResolution) -> Option<usize> {
        self.state().latest[res].get(&pos).map(|e| e.progress)
    }

    // ---- mutations (enqueue only) -------------------------------------------------

    pub fn enqueue_draw_rectangle(&self, rect: &RectangleData) -> Result<()> {
        let op = RectangleOperation::new(rect)?;
        self.state().enqueue(Operation::DrawRectangle(op));
        Ok(())
    }

    /// Draw `surface` with its top-left corner at `pos`.  A surface in another
    /// color space is converted once, here.
    pub fn enqueue_draw_image(&self, pos: VecI, surface: &Surface, mode: BlendMode) -> Result<()> {
        self.enqueue_image(pos, surface, mode, false)
    }

    /// Like [`enqueue_draw_image`](Self::enqueue_draw_image), but chunks that
    /// hold no pixels are left alone.
    pub fn enqueue_draw_image_ignoring_empty(&self, pos: VecI, surface: &Surface, mode: BlendMode) -> Result<()> {
        self.enqueue_image(pos, surface, mode, true)
    }

    fn enqueue_image(&self, pos: VecI, surface: &Surface, mode: BlendMode, ignore_empty: bool) -> Result<()> {
        if !surface.size().is_positive() {
            return Err(ChunkyError::InvalidArgument(format!(
                "image size must be positive, got {}×{}",
                surface.width(),
                surface.height()
            )));
        }
        let surface = Arc::new(surface.converted_to(self.color_space));
        let op = ImageOperation::new(pos, surface, mode, ignore_empty);
        self.state().enqueue(Operation::DrawImage(op));
        Ok(())
    }

    pub fn enqueue_clear_region(&self, pos: VecI, size: VecI) -> Result<()> {
        let op = ClearRegionOperation::new(pos, size)?;
        self.state().enqueue(Operation::ClearRegion(op));
        Ok(())
    }

    pub fn enqueue_clear(&self) {
        self.state().enqueue(Operation::Clear);
    }

    /// Change the canvas size.  Chunks entirely outside the new bounds are
    /// deleted; pixel content is not rescaled.
    pub fn enqueue_resize(&self, size: VecI) -> Result<()> {
        if !size.is_positive() {
            return Err(ChunkyError::InvalidArgument(format!(
                "image size must be positive, got {}×{}",
                size.x, size.y
            )));
        }
        self.state().enqueue(Operation::Resize { size });
        Ok(())
    }

    /// Remove the chunk at `pos` entirely on commit.  Nothing is queued for
    /// a chunk the store does not know about.
    pub(crate) fn enqueue_delete_chunk(&self, pos: VecI) {
        self.state().enqueue(Operation::DeleteChunk(pos));
    }

    /// Clip every queued drawing to the committed alpha of `mask`.  `mask`
    /// may be this same store.
    ///
    /// Drawings already replayed were rendered without the mask, so every
    /// latest chunk is dropped and [`queue_progress`](Self::queue_progress)
    /// returns `None` until the chunk is read again.
    pub fn enqueue_apply_raster_clip(&self, mask: &Arc<ChunkyImage>) -> Result<()> {
        let source = if mask.id == self.id {
            ClipSource::SelfCommitted
        } else {
            if mask.chunk_size != self.chunk_size {
                return Err(ChunkyError::InvalidArgument(format!(
                    "clip mask chunk size {} does not match {}",
                    mask.chunk_size, self.chunk_size
                )));
            }
            ClipSource::Other(Arc::clone(mask))
        };
        self.state().enqueue(Operation::RasterClip(source));
        Ok(())
    }

    /// Clip to this store's own committed alpha.  Resets latest chunks like
    /// [`enqueue_apply_raster_clip`](Self::enqueue_apply_raster_clip).
    pub fn enqueue_apply_self_clip(&self) {
        self.state().enqueue(Operation::RasterClip(ClipSource::SelfCommitted));
    }

    // ---- commit / cancel ------------------------------------------------------

    /// Apply every queued operation and make the result the committed state.
    pub fn commit_changes(&self) {
        self.state().commit(self.cleanup_interval);
    }

    /// Discard every queued operation without applying it.
    pub fn cancel_changes(&self) {
        let mut state = self.state();
        if !state.queue.is_empty() {
            log_debug!("chunky image {}: cancelled {} queued operations", self.id, state.queue.len());
        }
        state.cancel();
    }

    // ---- chunk queries ----------------------------------------------------------

    /// Committed Full chunks plus every chunk a queued operation can affect.
    pub fn find_all_chunks(&self) -> HashSet<VecI> {
        self.state().find_all_chunks()
    }

    pub fn find_affected_chunks(&self) -> HashSet<VecI> {
        self.state().find_affected_area().chunks
    }

    pub fn find_affected_area(&self) -> AffectedArea {
        self.state().find_affected_area()
    }

    pub fn find_committed_chunks(&self) -> HashSet<VecI> {
        self.state().find_committed_chunks()
    }

    pub fn committed_chunk_exists(&self, pos: VecI) -> bool {
        self.state().committed_chunk_exists(pos, ChunkResolution::Full)
    }

    pub fn latest_or_committed_chunk_exists(&self, pos: VecI) -> bool {
        self.state().latest_chunk(pos, ChunkResolution::Full).is_some()
    }

    /// Borrow the latest chunk, materializing it first.
    pub fn with_latest_chunk<R>(&self, pos: VecI, res: ChunkResolution, f: impl FnOnce(&Chunk) -> R) -> Option<R> {
        self.state().latest_chunk(pos, res).map(f)
    }

    /// Borrow the committed chunk, ignoring the queue.
    pub fn with_committed_chunk<R>(&self, pos: VecI, res: ChunkResolution, f: impl FnOnce(&Chunk) -> R) -> Option<R> {
        self.state().committed_chunk(pos, res).map(f)
    }

    /// Copy of the latest pixels of a chunk.
    pub fn get_latest_chunk(&self, pos: VecI, res: ChunkResolution) -> Option<Surface> {
        self.with_latest_chunk(pos, res, |c| c.surface().clone())
    }

    pub fn get_committed_chunk(&self, pos: VecI, res: ChunkResolution) -> Option<Surface> {
        self.with_committed_chunk(pos, res, |c| c.surface().clone())
    }

    /// Pooled copy of a committed chunk; used when this store is another
    /// store's clip mask.
    pub(crate) fn committed_chunk_copy(&self, pos: VecI, res: ChunkResolution) -> Option<Chunk> {
        self.with_committed_chunk(pos, res, Chunk::duplicate)
    }

    /// Composite the latest chunk onto `target` at `at`.  Returns `false`
    /// when there is nothing to draw.
    pub fn draw_latest_chunk_on(
        &self,
        pos: VecI,
        res: ChunkResolution,
        target: &mut Surface,
        at: VecI,
        mode: BlendMode,
    ) -> bool {
        self.with_latest_chunk(pos, res, |c| c.draw_on(target, at, mode)).is_some()
    }

    pub fn draw_committed_chunk_on(
        &self,
        pos: VecI,
        res: ChunkResolution,
        target: &mut Surface,
        at: VecI,
        mode: BlendMode,
    ) -> bool {
        self.with_committed_chunk(pos, res, |c| c.draw_on(target, at, mode)).is_some()
    }

    // ---- pixel queries ----------------------------------------------------------

    fn split(&self, pos: VecI) -> (VecI, VecI) {
        let chunk = pos.to_chunk(self.chunk_size);
        (chunk, pos - chunk * self.chunk_size as i32)
    }

    /// Straight-alpha committed pixel; transparent outside the canvas.
    pub fn get_committed_pixel(&self, pos: VecI) -> Rgba<u8> {
        let mut state = self.state();
        if !RectI::from_pos_size(VecI::ZERO, state.committed_size).contains(pos) {
            return TRANSPARENT;
        }
        let (chunk, local) = self.split(pos);
        state
            .committed_chunk(chunk, ChunkResolution::Full)
            .and_then(|c| c.get_pixel(local.x, local.y))
            .map_or(TRANSPARENT, color::unpremultiply)
    }

    /// Straight-alpha pixel with every queued operation applied.
    pub fn get_most_up_to_date_pixel(&self, pos: VecI) -> Rgba<u8> {
        let mut state = self.state();
        if !RectI::from_pos_size(VecI::ZERO, state.latest_size).contains(pos) {
            return TRANSPARENT;
        }
        let (chunk, local) = self.split(pos);
        state
            .latest_chunk(chunk, ChunkResolution::Full)
            .and_then(|c| c.get_pixel(local.x, local.y))
            .map_or(TRANSPARENT, color::unpremultiply)
    }

    /// True when no committed Full chunk holds a visible pixel.
    pub fn check_if_committed_is_empty(&self) -> bool {
        self.state().committed[ChunkResolution::Full]
            .par_iter()
            .all(|(_, chunk)| chunk.is_fully_transparent())
    }

    /// Flatten the committed Full chunks into one surface of `committed_size`.
    pub fn to_surface(&self) -> Result<Surface> {
        let state = self.state();
        let mut out = Surface::new(state.committed_size, self.color_space)?;
        let cs = self.chunk_size as i32;
        for (pos, chunk) in &state.committed[ChunkResolution::Full] {
            chunk.draw_on(&mut out, *pos * cs, BlendMode::Src);
        }
        Ok(out)
    }

    /// Independent, queue-free copy of the latest state.
    pub fn clone_from_latest(&self) -> Result<ChunkyImage> {
        let (size, tiles) = {
            let mut state = self.state();
            let mut tiles = Vec::new();
            for pos in state.find_all_chunks() {
                if let Some(chunk) = state.latest_chunk(pos, ChunkResolution::Full) {
                    tiles.push((pos, chunk.surface().clone()));
                }
            }
            (state.latest_size, tiles)
        };

        let output = ChunkyImage::with_config(size, Arc::clone(&self.pool), &self.config())?;
        let cs = self.chunk_size as i32;
        for (pos, surface) in tiles {
            output.enqueue_draw_image(pos * cs, &surface, BlendMode::Src)?;
        }
        output.commit_changes();
        Ok(output)
    }
}

impl std::fmt::Debug for ChunkyImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("ChunkyImage")
            .field("id", &self.id)
            .field("committed_size", &state.committed_size)
            .field("latest_size", &state.latest_size)
            .field("committed_chunks", &state.committed[ChunkResolution::Full].len())
            .field("queued", &state.queue.len())
            .finish()
    }
}
