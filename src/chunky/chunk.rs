use std::sync::Arc;

use image::{Rgba, RgbaImage};

use super::pool::ChunkPool;
use super::resolution::ChunkResolution;
use crate::color::{BlendMode, ColorSpace, TRANSPARENT};
use crate::geometry::VecI;
use crate::surface::Surface;

/// One square tile: a fixed-size surface plus its resolution tier.
///
/// Chunks always come from a [`ChunkPool`] and hand their surface back to it
/// when dropped.  The surface is never resized.
pub struct Chunk {
    surface: Surface,
    resolution: ChunkResolution,
    pool: Arc<ChunkPool>,
}

impl Chunk {
    pub(super) fn from_pool(surface: Surface, resolution: ChunkResolution, pool: Arc<ChunkPool>) -> Self {
        Self { surface, resolution, pool }
    }

    pub fn resolution(&self) -> ChunkResolution {
        self.resolution
    }

    pub fn color_space(&self) -> ColorSpace {
        self.surface.color_space()
    }

    /// Side length in pixels.
    pub fn pixel_size(&self) -> u32 {
        self.surface.width()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    pub fn pool(&self) -> &Arc<ChunkPool> {
        &self.pool
    }

    /// Pooled copy of this chunk.
    pub fn duplicate(&self) -> Chunk {
        let mut copy = self.pool.acquire(self.resolution, self.color_space());
        copy.surface
            .pixels_mut()
            .copy_from_slice(self.surface.pixels().as_raw());
        copy
    }

    /// Point-sampled copy at a lower tier: target pixel `t` takes the source
    /// pixel at `t * step`, the same grid operations render on, so a derived
    /// chunk matches one materialized directly at that tier.
    pub fn downsample(&self, res: ChunkResolution) -> Chunk {
        let mut out = self.pool.acquire(res, self.color_space());
        let step = 1i32 << res.shift().saturating_sub(self.resolution.shift());
        let side = out.pixel_size();
        let dst = out.surface.pixels_mut();
        for ty in 0..side {
            for tx in 0..side {
                let px = self
                    .surface
                    .get_pixel(tx as i32 * step, ty as i32 * step)
                    .unwrap_or(TRANSPARENT);
                dst.put_pixel(tx, ty, px);
            }
        }
        out
    }

    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        self.surface.get_pixel(x, y)
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.surface.is_fully_transparent()
    }

    /// Composite this chunk onto `target` with its top-left corner at `at`.
    pub fn draw_on(&self, target: &mut Surface, at: VecI, mode: BlendMode) {
        target.draw_surface(&self.surface, at, mode);
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        let color_space = self.surface.color_space();
        let surface = std::mem::replace(
            &mut self.surface,
            Surface::from_premultiplied(RgbaImage::new(0, 0), color_space),
        );
        self.pool.release_surface(self.resolution, surface);
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("resolution", &self.resolution)
            .field("color_space", &self.color_space())
            .field("pixel_size", &self.pixel_size())
            .finish()
    }
}
