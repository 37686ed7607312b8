// ============================================================================
// OPERATIONS — deferred mutations queued on a ChunkyImage
// ============================================================================
//
// An operation never touches pixels when it is enqueued.  It only reports
// which chunks it can affect; the pixel work happens per chunk, when that
// chunk is materialized.

use std::collections::HashSet;
use std::sync::Arc;

use image::Rgba;

use super::chunk::Chunk;
use super::image::ChunkyImage;
use crate::color::{self, BlendMode, TRANSPARENT};
use crate::error::{ChunkyError, Result};
use crate::geometry::{RectI, VecI};
use crate::surface::Surface;

/// Chunks (and the pixel region) a set of operations can change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AffectedArea {
    pub chunks: HashSet<VecI>,
    /// Bounding pixel region, `None` when nothing is affected.
    pub global_area: Option<RectI>,
}

impl AffectedArea {
    pub fn new(chunks: HashSet<VecI>, global_area: Option<RectI>) -> Self {
        Self { chunks, global_area }
    }

    pub fn union_with(&mut self, other: &AffectedArea) {
        self.chunks.extend(other.chunks.iter().copied());
        self.global_area = match (self.global_area, other.global_area) {
            (Some(a), Some(b)) => {
                let x0 = a.x.min(b.x);
                let y0 = a.y.min(b.y);
                let x1 = a.right().max(b.right());
                let y1 = a.bottom().max(b.bottom());
                Some(RectI::new(x0, y0, x1 - x0, y1 - y0))
            }
            (a, b) => a.or(b),
        };
    }
}

/// Rectangle shape submitted by tool code.  Colors are straight alpha; the
/// stroke is drawn inside the rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectangleData {
    pub pos: VecI,
    pub size: VecI,
    pub stroke_width: i32,
    pub stroke_color: Rgba<u8>,
    pub fill_color: Rgba<u8>,
    pub blend_mode: BlendMode,
}

impl RectangleData {
    /// Filled rectangle without a stroke.
    pub fn filled(pos: VecI, size: VecI, color: Rgba<u8>) -> Self {
        Self {
            pos,
            size,
            stroke_width: 0,
            stroke_color: TRANSPARENT,
            fill_color: color,
            blend_mode: BlendMode::SrcOver,
        }
    }

    pub fn with_stroke(mut self, width: i32, color: Rgba<u8>) -> Self {
        self.stroke_width = width;
        self.stroke_color = color;
        self
    }

    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }
}

/// Per-pixel source of a drawing operation.  Implementors describe the
/// pixel at a Full-resolution canvas position; rendering at any tier is
/// shared in [`DrawOperation::draw_on_chunk`].
pub(crate) trait DrawOperation {
    /// Full-resolution pixel region the operation can touch.
    fn bounds(&self) -> RectI;

    /// Skip chunks that hold no pixels yet.
    fn ignore_empty_chunks(&self) -> bool;

    fn blend_mode(&self) -> BlendMode;

    /// Premultiplied source pixel at canvas position `(x, y)` inside `bounds()`.
    fn pixel(&self, x: i32, y: i32) -> Rgba<u8>;

    /// Render onto `chunk`, which sits at `chunk_pos`.  A lower-tier chunk
    /// pixel `t` samples canvas position `origin + t * step`.
    fn draw_on_chunk(&self, chunk: &mut Chunk, chunk_pos: VecI, chunk_size: u32) {
        let res = chunk.resolution();
        let step = res.step();
        let side = chunk.pixel_size() as i32;
        let origin = chunk_pos * chunk_size as i32;
        let area = self
            .bounds()
            .intersect(&RectI::from_pos_size(origin, VecI::new(chunk_size as i32, chunk_size as i32)));
        if area.is_empty() {
            return;
        }
        let ceil_div = |v: i32| (v + step - 1) / step;
        let tx0 = ceil_div(area.x - origin.x);
        let ty0 = ceil_div(area.y - origin.y);
        let tx1 = ceil_div(area.right() - origin.x).min(side);
        let ty1 = ceil_div(area.bottom() - origin.y).min(side);
        let mode = self.blend_mode();
        let surface = chunk.surface_mut();
        for ty in ty0..ty1 {
            let y = origin.y + ty * step;
            for tx in tx0..tx1 {
                let x = origin.x + tx * step;
                surface.blend_pixel(tx as u32, ty as u32, self.pixel(x, y), mode);
            }
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct RectangleOperation {
    rect: RectI,
    stroke_width: i32,
    stroke: Rgba<u8>,
    fill: Rgba<u8>,
    blend_mode: BlendMode,
}

impl RectangleOperation {
    pub(crate) fn new(data: &RectangleData) -> Result<Self> {
        if !data.size.is_positive() {
            return Err(ChunkyError::InvalidArgument(format!(
                "rectangle size must be positive, got {}×{}",
                data.size.x, data.size.y
            )));
        }
        if data.stroke_width < 0 {
            return Err(ChunkyError::InvalidArgument(format!(
                "stroke width must not be negative, got {}",
                data.stroke_width
            )));
        }
        Ok(Self {
            rect: RectI::from_pos_size(data.pos, data.size),
            stroke_width: data.stroke_width,
            stroke: color::premultiply(data.stroke_color),
            fill: color::premultiply(data.fill_color),
            blend_mode: data.blend_mode,
        })
    }
}

impl DrawOperation for RectangleOperation {
    fn bounds(&self) -> RectI {
        self.rect
    }

    fn ignore_empty_chunks(&self) -> bool {
        false
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    fn pixel(&self, x: i32, y: i32) -> Rgba<u8> {
        let lx = x - self.rect.x;
        let ly = y - self.rect.y;
        let edge = lx.min(ly).min(self.rect.w - 1 - lx).min(self.rect.h - 1 - ly);
        if edge < self.stroke_width { self.stroke } else { self.fill }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ImageOperation {
    pos: VecI,
    surface: Arc<Surface>,
    blend_mode: BlendMode,
    ignore_empty: bool,
}

impl ImageOperation {
    /// `surface` must already be in the target store's color space.
    pub(crate) fn new(pos: VecI, surface: Arc<Surface>, blend_mode: BlendMode, ignore_empty: bool) -> Self {
        Self { pos, surface, blend_mode, ignore_empty }
    }
}

impl DrawOperation for ImageOperation {
    fn bounds(&self) -> RectI {
        RectI::from_pos_size(self.pos, self.surface.size())
    }

    fn ignore_empty_chunks(&self) -> bool {
        self.ignore_empty
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    fn pixel(&self, x: i32, y: i32) -> Rgba<u8> {
        self.surface
            .get_pixel(x - self.pos.x, y - self.pos.y)
            .unwrap_or(TRANSPARENT)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ClearRegionOperation {
    rect: RectI,
}

impl ClearRegionOperation {
    pub(crate) fn new(pos: VecI, size: VecI) -> Result<Self> {
        if !size.is_positive() {
            return Err(ChunkyError::InvalidArgument(format!(
                "clear region size must be positive, got {}×{}",
                size.x, size.y
            )));
        }
        Ok(Self { rect: RectI::from_pos_size(pos, size) })
    }
}

impl DrawOperation for ClearRegionOperation {
    fn bounds(&self) -> RectI {
        self.rect
    }

    fn ignore_empty_chunks(&self) -> bool {
        true
    }

    fn blend_mode(&self) -> BlendMode {
        BlendMode::Clear
    }

    fn pixel(&self, _x: i32, _y: i32) -> Rgba<u8> {
        TRANSPARENT
    }
}

/// Mask referenced by a raster clip.
#[derive(Clone)]
pub(crate) enum ClipSource {
    /// The clipped store itself; read from its own committed tiles.
    SelfCommitted,
    Other(Arc<ChunkyImage>),
}

/// One queued mutation.
#[derive(Clone)]
pub(crate) enum Operation {
    DrawRectangle(RectangleOperation),
    DrawImage(ImageOperation),
    ClearRegion(ClearRegionOperation),
    Clear,
    Resize { size: VecI },
    RasterClip(ClipSource),
    /// Drop one chunk outright; used when restoring chunks that did not exist.
    DeleteChunk(VecI),
}

impl Operation {
    pub(crate) fn as_draw(&self) -> Option<&dyn DrawOperation> {
        match self {
            Operation::DrawRectangle(op) => Some(op as &dyn DrawOperation),
            Operation::DrawImage(op) => Some(op as &dyn DrawOperation),
            Operation::ClearRegion(op) => Some(op as &dyn DrawOperation),
            _ => None,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Operation::DrawRectangle(_) => "draw rectangle",
            Operation::DrawImage(_) => "draw image",
            Operation::ClearRegion(_) => "clear region",
            Operation::Clear => "clear",
            Operation::Resize { .. } => "resize",
            Operation::RasterClip(_) => "raster clip",
            Operation::DeleteChunk(_) => "delete chunk",
        }
    }

    /// Chunks this operation can change, given the canvas size at enqueue
    /// time and every chunk currently known to the store.
    pub(crate) fn find_affected_area(
        &self,
        latest_size: VecI,
        chunk_size: u32,
        known_chunks: &HashSet<VecI>,
    ) -> AffectedArea {
        let canvas = RectI::from_pos_size(VecI::ZERO, latest_size);
        match self {
            Operation::Clear => AffectedArea::new(known_chunks.clone(), Some(canvas)),
            Operation::Resize { size } => {
                let chunks = known_chunks
                    .iter()
                    .copied()
                    .filter(|pos| is_outside_bounds(*pos, *size, chunk_size))
                    .collect();
                AffectedArea::new(chunks, Some(canvas))
            }
            Operation::RasterClip(_) => AffectedArea::default(),
            Operation::DeleteChunk(pos) => {
                if !known_chunks.contains(pos) {
                    return AffectedArea::default();
                }
                let cs = chunk_size as i32;
                let area = RectI::from_pos_size(*pos * cs, VecI::new(cs, cs)).intersect(&canvas);
                let global_area = (!area.is_empty()).then_some(area);
                AffectedArea::new(HashSet::from([*pos]), global_area)
            }
            _ => {
                let Some(draw) = self.as_draw() else {
                    return AffectedArea::default();
                };
                let area = draw.bounds().intersect(&canvas);
                if area.is_empty() {
                    return AffectedArea::default();
                }
                let chunks = area
                    .covered_chunks(chunk_size)
                    .filter(|pos| !draw.ignore_empty_chunks() || known_chunks.contains(pos))
                    .collect();
                AffectedArea::new(chunks, Some(area))
            }
        }
    }
}

/// True when the chunk at `pos` lies entirely outside a canvas of `size`.
pub(crate) fn is_outside_bounds(pos: VecI, size: VecI, chunk_size: u32) -> bool {
    let cs = chunk_size as i32;
    let max_x = (size.x + cs - 1) / cs;
    let max_y = (size.y + cs - 1) / cs;
    pos.x < 0 || pos.y < 0 || pos.x >= max_x || pos.y >= max_y
}
