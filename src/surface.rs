// ============================================================================
// SURFACE — premultiplied RGBA8 image, the 2D surface every tile is made of
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::color::{self, BlendMode, ColorSpace, TRANSPARENT};
use crate::error::{ChunkyError, Result};
use crate::geometry::{RectI, VecI};

/// A premultiplied RGBA8 pixel surface tagged with its color space.
///
/// Tiles own one of these; callers hand them to `enqueue_draw_image` and get
/// copies back from the read APIs.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    pixels: RgbaImage,
    color_space: ColorSpace,
}

impl Surface {
    /// Fully transparent surface.  Both dimensions must be positive.
    pub fn new(size: VecI, color_space: ColorSpace) -> Result<Self> {
        if !size.is_positive() {
            return Err(ChunkyError::InvalidArgument(format!(
                "surface size must be positive, got {}×{}",
                size.x, size.y
            )));
        }
        Ok(Self {
            pixels: RgbaImage::new(size.x as u32, size.y as u32),
            color_space,
        })
    }

    /// Wrap an already premultiplied image.
    pub fn from_premultiplied(pixels: RgbaImage, color_space: ColorSpace) -> Self {
        Self { pixels, color_space }
    }

    /// Import a straight-alpha image (what `image` decoders produce).
    pub fn from_straight(mut pixels: RgbaImage, color_space: ColorSpace) -> Self {
        for px in pixels.pixels_mut() {
            *px = color::premultiply(*px);
        }
        Self { pixels, color_space }
    }

    /// Export as a straight-alpha image.
    pub fn to_straight(&self) -> RgbaImage {
        let mut out = self.pixels.clone();
        for px in out.pixels_mut() {
            *px = color::unpremultiply(*px);
        }
        out
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> VecI {
        VecI::new(self.pixels.width() as i32, self.pixels.height() as i32)
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Raw premultiplied pixels.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// Premultiplied pixel, `None` outside the surface.
    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        if x < 0 || y < 0 || x as u32 >= self.pixels.width() || y as u32 >= self.pixels.height() {
            return None;
        }
        Some(*self.pixels.get_pixel(x as u32, y as u32))
    }

    #[inline]
    pub fn blend_pixel(&mut self, x: u32, y: u32, src: Rgba<u8>, mode: BlendMode) {
        let dst = self.pixels.get_pixel_mut(x, y);
        *dst = color::blend(*dst, src, mode);
    }

    pub fn clear(&mut self) {
        for b in self.pixels.iter_mut() {
            *b = 0;
        }
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.pixels.pixels().all(|px| px[3] == 0)
    }

    /// Blend a premultiplied color over `rect` (clipped to the surface).
    pub fn fill_rect(&mut self, rect: RectI, color: Rgba<u8>, mode: BlendMode) {
        let area = rect.intersect(&RectI::from_pos_size(VecI::ZERO, self.size()));
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                self.blend_pixel(x as u32, y as u32, color, mode);
            }
        }
    }

    /// Copy of this surface re-encoded into `target`.
    pub fn converted_to(&self, target: ColorSpace) -> Surface {
        if target == self.color_space {
            return self.clone();
        }
        let mut out = self.pixels.clone();
        for px in out.pixels_mut() {
            *px = color::convert_premultiplied(*px, self.color_space, target);
        }
        Surface { pixels: out, color_space: target }
    }

    /// Composite `src` with its top-left corner at `at`.  A source in another
    /// color space is converted per pixel on the way in.
    pub fn draw_surface(&mut self, src: &Surface, at: VecI, mode: BlendMode) {
        let dst_rect = RectI::from_pos_size(at, src.size())
            .intersect(&RectI::from_pos_size(VecI::ZERO, self.size()));
        let convert = src.color_space != self.color_space;
        for y in dst_rect.y..dst_rect.bottom() {
            for x in dst_rect.x..dst_rect.right() {
                let mut px = src.get_pixel(x - at.x, y - at.y).unwrap_or(TRANSPARENT);
                if convert {
                    px = color::convert_premultiplied(px, src.color_space, self.color_space);
                }
                self.blend_pixel(x as u32, y as u32, px, mode);
            }
        }
    }
}
