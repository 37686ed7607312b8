// ============================================================================
// COLOR — color space tags, premultiplication and per-pixel compositing
// ============================================================================
//
// All tile storage is premultiplied RGBA8.  Public entry points take straight
// alpha `Rgba<u8>` and convert at the boundary.

use image::Rgba;
use serde::{Deserialize, Serialize};

/// Fully transparent premultiplied pixel.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Color encoding attached to every tile and surface.  Pixel data is only
/// copied verbatim between buffers that carry the same tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    Srgb,
    LinearSrgb,
}

impl ColorSpace {
    pub const ALL: [ColorSpace; 2] = [ColorSpace::Srgb, ColorSpace::LinearSrgb];

    /// Dense index, used to lay out per-color-space slots.
    pub fn index(self) -> usize {
        match self {
            ColorSpace::Srgb => 0,
            ColorSpace::LinearSrgb => 1,
        }
    }
}

/// How a source pixel is combined with the destination.
/// Every mode works on premultiplied values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    /// Porter-Duff source-over.
    #[default]
    SrcOver,
    /// Replace the destination, alpha included.
    Src,
    /// Erase the destination.
    Clear,
    /// Keep the destination scaled by source alpha (mask intersection).
    DstIn,
    /// Keep the destination scaled by inverse source alpha (mask cut-out).
    DstOut,
    /// Saturating per-channel addition.
    Plus,
}

/// `a * b / 255`, rounded.
#[inline(always)]
pub fn mul_255(a: u8, b: u8) -> u8 {
    let t = a as u32 * b as u32 + 128;
    ((t + (t >> 8)) >> 8) as u8
}

#[inline]
pub fn premultiply(px: Rgba<u8>) -> Rgba<u8> {
    let a = px[3];
    match a {
        0 => TRANSPARENT,
        255 => px,
        _ => Rgba([mul_255(px[0], a), mul_255(px[1], a), mul_255(px[2], a), a]),
    }
}

#[inline]
pub fn unpremultiply(px: Rgba<u8>) -> Rgba<u8> {
    let a = px[3];
    match a {
        0 => TRANSPARENT,
        255 => px,
        _ => {
            let un = |c: u8| -> u8 {
                let v = (c as u32 * 255 + a as u32 / 2) / a as u32;
                v.min(255) as u8
            };
            Rgba([un(px[0]), un(px[1]), un(px[2]), a])
        }
    }
}

/// Composite premultiplied `src` onto premultiplied `dst`.
#[inline]
pub fn blend(dst: Rgba<u8>, src: Rgba<u8>, mode: BlendMode) -> Rgba<u8> {
    match mode {
        BlendMode::SrcOver => {
            let sa = src[3];
            if sa == 255 {
                return src;
            }
            if sa == 0 && src == TRANSPARENT {
                return dst;
            }
            let inv = 255 - sa;
            Rgba([
                src[0].saturating_add(mul_255(dst[0], inv)),
                src[1].saturating_add(mul_255(dst[1], inv)),
                src[2].saturating_add(mul_255(dst[2], inv)),
                src[3].saturating_add(mul_255(dst[3], inv)),
            ])
        }
        BlendMode::Src => src,
        BlendMode::Clear => TRANSPARENT,
        BlendMode::DstIn => {
            let sa = src[3];
            Rgba([
                mul_255(dst[0], sa),
                mul_255(dst[1], sa),
                mul_255(dst[2], sa),
                mul_255(dst[3], sa),
            ])
        }
        BlendMode::DstOut => {
            let inv = 255 - src[3];
            Rgba([
                mul_255(dst[0], inv),
                mul_255(dst[1], inv),
                mul_255(dst[2], inv),
                mul_255(dst[3], inv),
            ])
        }
        BlendMode::Plus => Rgba([
            dst[0].saturating_add(src[0]),
            dst[1].saturating_add(src[1]),
            dst[2].saturating_add(src[2]),
            dst[3].saturating_add(src[3]),
        ]),
    }
}

// ---- sRGB transfer function --------------------------------------------------

/// sRGB-encoded channel in `[0, 1]` to linear light (IEC 61966-2-1).
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Linear-light channel in `[0, 1]` to sRGB encoding.
pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Re-encode one premultiplied pixel from `from` into `to`.
/// The transfer function is applied to unpremultiplied color; alpha is kept.
pub fn convert_premultiplied(px: Rgba<u8>, from: ColorSpace, to: ColorSpace) -> Rgba<u8> {
    if from == to || px[3] == 0 {
        return px;
    }
    let straight = unpremultiply(px);
    let f: fn(f32) -> f32 = match (from, to) {
        (ColorSpace::Srgb, ColorSpace::LinearSrgb) => srgb_to_linear,
        _ => linear_to_srgb,
    };
    let ch = |c: u8| -> u8 { (f(c as f32 / 255.0) * 255.0).round().clamp(0.0, 255.0) as u8 };
    premultiply(Rgba([ch(straight[0]), ch(straight[1]), ch(straight[2]), straight[3]]))
}
