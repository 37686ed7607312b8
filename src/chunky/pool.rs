// ============================================================================
// CHUNK POOL — recycle chunk surfaces to avoid allocation churn
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use image::RgbaImage;

use super::chunk::Chunk;
use super::resolution::{ChunkResolution, MultiResStore};
use crate::color::ColorSpace;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::surface::Surface;
use crate::log_warn;

/// Lock-free free-list of pixel buffers of one (resolution, color space).
struct FreeList {
    tx: Sender<RgbaImage>,
    rx: Receiver<RgbaImage>,
}

impl FreeList {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

/// A pool of chunk surfaces keyed by resolution and color space.
///
/// When a [`Chunk`] is dropped its surface goes back into the pool.  When a
/// new chunk of the same tier and color space is needed, we grab a buffer from
/// the pool instead of allocating a new one.  Buffers never cross color
/// spaces.
///
/// Many stores on many threads share one pool, so the free-lists are
/// lock-free channels.  The per-list capacity is a soft bound: two threads
/// releasing at once may both pass the length check.
pub struct ChunkPool {
    chunk_size: u32,
    /// Maximum number of buffers to keep per key.
    capacity: usize,
    free: MultiResStore<[FreeList; 2]>,
    allocated: AtomicUsize,
    trimmed: AtomicUsize,
}

impl ChunkPool {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            capacity: config.pool_capacity,
            free: MultiResStore::from_fn(|_| [FreeList::new(), FreeList::new()]),
            allocated: AtomicUsize::new(0),
            trimmed: AtomicUsize::new(0),
        })
    }

    /// Pool with default settings and the given chunk size.
    pub fn with_chunk_size(chunk_size: u32) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new(&EngineConfig::with_chunk_size(chunk_size))?))
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn list(&self, res: ChunkResolution, color_space: ColorSpace) -> &FreeList {
        &self.free[res][color_space.index()]
    }

    /// A zeroed chunk, recycled when one is available.
    pub fn acquire(self: &Arc<Self>, res: ChunkResolution, color_space: ColorSpace) -> Chunk {
        let surface = match self.list(res, color_space).rx.try_recv() {
            Ok(pixels) => {
                let mut surface = Surface::from_premultiplied(pixels, color_space);
                surface.clear();
                surface
            }
            Err(_) => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                let side = res.pixel_size(self.chunk_size);
                Surface::from_premultiplied(RgbaImage::new(side, side), color_space)
            }
        };
        Chunk::from_pool(surface, res, Arc::clone(self))
    }

    /// Return a chunk to the pool.  Equivalent to dropping it.
    pub fn release(&self, chunk: Chunk) {
        drop(chunk);
    }

    /// Take back the surface of a dropped chunk.  Past the soft cap the
    /// buffer is simply freed.
    pub(crate) fn release_surface(&self, res: ChunkResolution, surface: Surface) {
        let side = res.pixel_size(self.chunk_size);
        if surface.width() != side || surface.height() != side {
            return;
        }
        let list = self.list(res, surface.color_space());
        if list.rx.len() >= self.capacity {
            let trimmed = self.trimmed.fetch_add(1, Ordering::Relaxed) + 1;
            if trimmed % 1000 == 1 {
                log_warn!("chunk pool full for {:?}; {} buffers freed so far", res, trimmed);
            }
            return;
        }
        // The pool owns the receiver, so the channel is never disconnected.
        let _ = list.tx.send(surface.into_pixels());
    }

    /// Drop all pooled buffers.
    pub fn clear(&self) {
        for (_, lists) in self.free.iter() {
            for list in lists {
                while list.rx.try_recv().is_ok() {}
            }
        }
    }

    /// Total number of buffers currently in the pool.
    pub fn pooled_count(&self) -> usize {
        self.free
            .iter()
            .flat_map(|(_, lists)| lists.iter())
            .map(|l| l.rx.len())
            .sum()
    }

    pub fn pooled_count_for(&self, res: ChunkResolution, color_space: ColorSpace) -> usize {
        self.list(res, color_space).rx.len()
    }

    /// Approximate memory held by pooled buffers (bytes).
    pub fn pooled_memory_bytes(&self) -> usize {
        self.free
            .iter()
            .map(|(res, lists)| {
                let side = res.pixel_size(self.chunk_size) as usize;
                let count: usize = lists.iter().map(|l| l.rx.len()).sum();
                side * side * 4 * count
            })
            .sum()
    }

    /// Number of fresh allocations made since the pool was created.
    pub fn allocated_count(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}
