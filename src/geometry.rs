// ============================================================================
// GEOMETRY — integer vectors and rectangles in canvas pixel space
// ============================================================================

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Integer 2D vector.  Used for pixel positions, sizes and chunk coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VecI {
    pub x: i32,
    pub y: i32,
}

impl VecI {
    pub const ZERO: VecI = VecI { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Both components strictly positive.
    pub fn is_positive(self) -> bool {
        self.x > 0 && self.y > 0
    }

    /// Chunk coordinate containing this pixel (floor division).
    pub fn to_chunk(self, chunk_size: u32) -> VecI {
        let cs = chunk_size as i32;
        VecI::new(self.x.div_euclid(cs), self.y.div_euclid(cs))
    }
}

impl Add for VecI {
    type Output = VecI;
    fn add(self, rhs: VecI) -> VecI {
        VecI::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for VecI {
    type Output = VecI;
    fn sub(self, rhs: VecI) -> VecI {
        VecI::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<i32> for VecI {
    type Output = VecI;
    fn mul(self, rhs: i32) -> VecI {
        VecI::new(self.x * rhs, self.y * rhs)
    }
}

impl From<(i32, i32)> for VecI {
    fn from((x, y): (i32, i32)) -> Self {
        VecI::new(x, y)
    }
}

/// Half-open integer rectangle `[x, x + w) × [y, y + h)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RectI {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl RectI {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_pos_size(pos: VecI, size: VecI) -> Self {
        Self::new(pos.x, pos.y, size.x, size.y)
    }

    pub fn pos(&self) -> VecI {
        VecI::new(self.x, self.y)
    }

    pub fn size(&self) -> VecI {
        VecI::new(self.w, self.h)
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn contains(&self, p: VecI) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// Overlap of two rectangles; empty rects come back with zero size.
    pub fn intersect(&self, other: &RectI) -> RectI {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            RectI::new(x0, y0, 0, 0)
        } else {
            RectI::new(x0, y0, x1 - x0, y1 - y0)
        }
    }

    /// Chunk coordinates of every chunk this rectangle overlaps.
    pub fn covered_chunks(&self, chunk_size: u32) -> impl Iterator<Item = VecI> {
        let cs = chunk_size as i32;
        let (cx0, cy0, cx1, cy1) = if self.is_empty() {
            (0, 0, 0, 0)
        } else {
            (
                self.x.div_euclid(cs),
                self.y.div_euclid(cs),
                (self.right() - 1).div_euclid(cs) + 1,
                (self.bottom() - 1).div_euclid(cs) + 1,
            )
        };
        (cy0..cy1).flat_map(move |cy| (cx0..cx1).map(move |cx| VecI::new(cx, cy)))
    }
}
