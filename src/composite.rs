//! Alpha compositing, nearest-neighbour resampling and tinting.
//!
//! Every operation that produces an image of a different size returns a fresh
//! [`PixelBuffer`]; only [`overlay`] and the rectangle painters mutate their
//! destination in place.

use serde::Deserialize;

use crate::buffer::{check_dimensions, PixelBuffer};
use crate::Result;

const OPAQUE: f32 = 0.99;
const TRANSPARENT: f32 = 0.01;

/// Round and clamp a blended value into a byte.
#[inline]
fn bound(x: f32) -> u8 {
    x.clamp(0.0, 255.0).round() as u8
}

#[inline]
fn alpha_of(px: &[u8]) -> f32 {
    if px.len() < 4 {
        1.0
    } else {
        px[3] as f32 / 255.0
    }
}

/// Colour channel `c` of a source pixel, broadcasting single-channel sources.
#[inline]
fn color_at(px: &[u8], c: usize) -> u8 {
    if px.len() == 1 {
        px[0]
    } else {
        px[c]
    }
}

/// Porter–Duff "over" of `src` onto `dst` with `src`'s top-left at
/// `(offset_x, offset_y)`. Source pixels landing outside `dst` are skipped.
pub fn overlay(dst: &mut PixelBuffer, src: &PixelBuffer, offset_x: i64, offset_y: i64) {
    let dst_channels = dst.channels() as usize;
    let color_channels = dst_channels.min(3);
    let (dst_w, dst_h) = (dst.width() as i64, dst.height() as i64);
    let src_channels = src.channels() as usize;

    for sy in (-offset_y).max(0)..src.height() as i64 {
        let dy = sy + offset_y;
        if dy >= dst_h {
            break;
        }
        for sx in (-offset_x).max(0)..src.width() as i64 {
            let dx = sx + offset_x;
            if dx >= dst_w {
                break;
            }

            let si = (sx as usize + sy as usize * src.width() as usize) * src_channels;
            let di = (dx as usize + dy as usize * dst_w as usize) * dst_channels;
            let s = &src.samples()[si..si + src_channels];
            let d = &mut dst.samples_mut()[di..di + dst_channels];

            let src_alpha = alpha_of(s);
            let dst_alpha = alpha_of(d);

            if src_alpha > OPAQUE && dst_alpha > OPAQUE {
                for c in 0..color_channels {
                    d[c] = color_at(s, c);
                }
                if dst_channels == 4 {
                    d[3] = if src_channels == 4 { s[3] } else { 255 };
                }
                continue;
            }

            let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
            if out_alpha < TRANSPARENT {
                d.fill(0);
                continue;
            }

            for c in 0..color_channels {
                let sc = color_at(s, c) as f32 / 255.0;
                let dc = d[c] as f32 / 255.0;
                d[c] = bound((sc * src_alpha + dc * dst_alpha * (1.0 - src_alpha)) / out_alpha * 255.0);
            }
            if dst_channels == 4 {
                d[3] = bound(out_alpha * 255.0);
            }
        }
    }
}

/// Nearest-neighbour resample. Target pixel (x, y) copies source pixel
/// `(x * w / tw, y * h / th)`.
pub fn resize_nearest(src: &PixelBuffer, target_width: u32, target_height: u32) -> Result<PixelBuffer> {
    check_dimensions(target_width, target_height, src.channels())?;
    let mut out = PixelBuffer::new(target_width, target_height, src.channels())?;
    let n = src.channels() as usize;
    let (sw, sh) = (src.width() as u64, src.height() as u64);

    let columns: Vec<usize> = (0..target_width as u64)
        .map(|x| (x * sw / target_width as u64) as usize * n)
        .collect();

    for y in 0..target_height {
        let ry = (y as u64 * sh / target_height as u64) as u32;
        let src_row = src.row_span(0, ry, src.width());
        let start = y as usize * target_width as usize * n;
        let dst_row = &mut out.samples_mut()[start..start + target_width as usize * n];
        for (px, &col) in dst_row.chunks_exact_mut(n).zip(&columns) {
            px.copy_from_slice(&src_row[col..col + n]);
        }
    }
    Ok(out)
}

/// Copy of the `w`×`h` region at `(x, y)`. Parts outside `src` stay zero.
pub fn crop(src: &PixelBuffer, x: u32, y: u32, w: u32, h: u32) -> Result<PixelBuffer> {
    let mut out = PixelBuffer::new(w, h, src.channels())?;
    if x >= src.width() || y >= src.height() {
        return Ok(out);
    }
    let n = src.channels() as usize;
    let copy_w = w.min(src.width() - x);
    let copy_h = h.min(src.height() - y);
    for row in 0..copy_h {
        let from = src.row_span(x, y + row, copy_w);
        let start = row as usize * w as usize * n;
        out.samples_mut()[start..start + copy_w as usize * n].copy_from_slice(from);
    }
    Ok(out)
}

/// `floor(value * s)` for a fractional scale `s` in `[0, 1]`.
#[inline]
pub fn scale_fraction(value: u8, s: f32) -> u8 {
    (f64::from(value) * f64::from(s)).clamp(0.0, 255.0) as u8
}

/// `value * m / 255` for a byte multiplier `m`.
#[inline]
pub fn scale_byte(value: u8, m: u8) -> u8 {
    (u16::from(value) * u16::from(m) / 255) as u8
}

/// Convention used to turn a target colour into a per-channel multiplier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tint {
    /// Multiply by `color / 255` as a float, then floor.
    #[default]
    Fraction,
    /// Multiply by `color` and integer-divide by 255.
    Byte,
}

impl Tint {
    pub fn apply(self, src: &PixelBuffer, color: [u8; 3]) -> PixelBuffer {
        match self {
            Tint::Fraction => tint_fraction(
                src,
                [color[0] as f32 / 255.0, color[1] as f32 / 255.0, color[2] as f32 / 255.0],
            ),
            Tint::Byte => tint_byte(src, color),
        }
    }
}

fn tint_with(src: &PixelBuffer, scale: impl Fn(u8, usize) -> u8) -> PixelBuffer {
    let mut out = src.clone();
    let n = out.channels() as usize;
    let color_channels = n.min(3);
    for px in out.samples_mut().chunks_exact_mut(n) {
        for (c, v) in px.iter_mut().take(color_channels).enumerate() {
            *v = scale(*v, c);
        }
    }
    out
}

/// New buffer with each colour channel scaled by a fraction. Alpha is kept.
pub fn tint_fraction(src: &PixelBuffer, factors: [f32; 3]) -> PixelBuffer {
    tint_with(src, |v, c| scale_fraction(v, factors[c]))
}

/// New buffer with each colour channel scaled by a byte multiplier. Alpha is kept.
pub fn tint_byte(src: &PixelBuffer, multipliers: [u8; 3]) -> PixelBuffer {
    tint_with(src, |v, c| scale_byte(v, multipliers[c]))
}

fn paint(dst: &mut PixelBuffer, x: u32, y: u32, color: [u8; 3]) {
    let Ok(px) = dst.pixel_mut(x, y) else { return };
    match px.len() {
        1 => px[0] = color[0],
        n => {
            px[..3].copy_from_slice(&color);
            if n == 4 {
                px[3] = 255;
            }
        }
    }
}

/// Solid rectangle, clipped to `dst`.
pub fn fill_rect(dst: &mut PixelBuffer, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
    let x1 = x.saturating_add(w).min(dst.width());
    let y1 = y.saturating_add(h).min(dst.height());
    for py in y..y1 {
        for px in x..x1 {
            paint(dst, px, py, color);
        }
    }
}

/// One-pixel rectangle border, clipped to `dst`.
pub fn outline_rect(dst: &mut PixelBuffer, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
    if w == 0 || h == 0 {
        return;
    }
    if w <= 2 || h <= 2 {
        fill_rect(dst, x, y, w, h, color);
        return;
    }
    let (right, bottom) = (x.saturating_add(w - 1), y.saturating_add(h - 1));
    for px in x..=right {
        paint(dst, px, y, color);
        paint(dst, px, bottom, color);
    }
    for py in y..=bottom {
        paint(dst, x, py, color);
        paint(dst, right, py, color);
    }
}
