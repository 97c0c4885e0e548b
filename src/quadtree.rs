//! Quadtree decomposition of a frame into tinted sprite tiles.
//!
//! A region is inspected; if it is not uniform enough (and still large enough)
//! it is split into four and each quarter is visited in turn. Regions that stop
//! splitting receive the cached sprite of their exact size, tinted to the
//! region's mean colour. Nothing about the tree outlives the traversal.

use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::composite::{outline_rect, overlay};
use crate::params::Params;
use crate::sprite_cache::SpriteCache;
use crate::{MosaicError, Result};

/// How regions are measured and when they split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Channel 0 only; split on contrast, skip dark leaves.
    Gray,
    /// Per-channel means; split on any colour change, cap leaf size.
    Color,
}

/// Axis-aligned rectangle of the frame being decomposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// The four children of a split.
    ///
    /// Every child has the floored half size `(w/2, h/2)`; the right and
    /// bottom children start at the ceiled half. For odd sides this leaves
    /// the middle column/row uncovered, which is the established output.
    pub fn quadrants(&self) -> [Region; 4] {
        let left = self.width / 2;
        let right = self.width - left;
        let top = self.height / 2;
        let bottom = self.height - top;
        [
            Region::new(self.x, self.y, left, top),
            Region::new(self.x + right, self.y, left, top),
            Region::new(self.x, self.y + bottom, left, top),
            Region::new(self.x + right, self.y + bottom, left, top),
        ]
    }

    fn check_within(&self, frame: &PixelBuffer) -> Result<()> {
        let fits_x = self.x.checked_add(self.width).is_some_and(|r| r <= frame.width());
        let fits_y = self.y.checked_add(self.height).is_some_and(|b| b <= frame.height());
        if self.width == 0 || self.height == 0 || !fits_x || !fits_y {
            return Err(MosaicError::OutOfRange {
                x: self.x.saturating_add(self.width),
                y: self.y.saturating_add(self.height),
                width: frame.width(),
                height: frame.height(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrayStats {
    pub min: u8,
    pub max: u8,
    /// Rounded mean of channel 0.
    pub mean: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorStats {
    /// Every pixel's RGB equals the region's top-left pixel.
    pub quad: bool,
    /// Truncated per-channel means.
    pub mean: [u8; 3],
}

/// Min, max and mean of channel 0 over `region`.
pub fn evaluate_gray(frame: &PixelBuffer, region: Region) -> Result<GrayStats> {
    region.check_within(frame)?;
    let n = frame.channels() as usize;
    let (mut min, mut max, mut sum) = (u8::MAX, u8::MIN, 0u64);
    for y in region.y..region.y + region.height {
        for px in frame.row_span(region.x, y, region.width).chunks_exact(n) {
            min = min.min(px[0]);
            max = max.max(px[0]);
            sum += u64::from(px[0]);
        }
    }
    let count = u64::from(region.width) * u64::from(region.height);
    let mean = (sum as f64 / count as f64).round().clamp(0.0, 255.0) as u8;
    Ok(GrayStats { min, max, mean })
}

/// Exact-uniformity flag and mean RGB over `region`. Needs 3+ channels.
pub fn evaluate_color(frame: &PixelBuffer, region: Region) -> Result<ColorStats> {
    region.check_within(frame)?;
    if frame.channels() < 3 {
        return Err(MosaicError::InvalidDimension {
            width: frame.width(),
            height: frame.height(),
            channels: frame.channels(),
        });
    }
    let n = frame.channels() as usize;
    let corner = frame.row_span(region.x, region.y, 1);
    let first = [corner[0], corner[1], corner[2]];
    let mut quad = true;
    let mut sum = [0u64; 3];
    for y in region.y..region.y + region.height {
        for px in frame.row_span(region.x, y, region.width).chunks_exact(n) {
            quad &= px[..3] == first;
            for (s, &v) in sum.iter_mut().zip(&px[..3]) {
                *s += u64::from(v);
            }
        }
    }
    let count = u64::from(region.width) * u64::from(region.height);
    Ok(ColorStats { quad, mean: sum.map(|s| (s / count) as u8) })
}

/// Node counts from one traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Regions evaluated, root included.
    pub nodes: usize,
    /// Leaves that received a sprite.
    pub leaves: usize,
    /// Leaves left black for being too dark.
    pub skipped: usize,
}

/// Output frame of a decomposition.
#[derive(Debug)]
pub struct Mosaic {
    pub frame: PixelBuffer,
    pub stats: TraversalStats,
}

/// Drives the traversal for one sprite (and optional eye sprite).
pub struct Decomposer<'a> {
    sprites: &'a SpriteCache,
    eyes: Option<&'a SpriteCache>,
    mode: Mode,
    params: Params,
    outline: Option<[u8; 3]>,
}

impl<'a> Decomposer<'a> {
    pub fn new(sprites: &'a SpriteCache, mode: Mode) -> Self {
        Self { sprites, eyes: None, mode, params: Params::default(), outline: None }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Overlay an untinted sprite of the same size on top of every leaf.
    pub fn with_eyes(mut self, eyes: Option<&'a SpriteCache>) -> Self {
        self.eyes = eyes;
        self
    }

    /// Draw each leaf's border in `color`.
    pub fn with_outline(mut self, color: Option<[u8; 3]>) -> Self {
        self.outline = color;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Decompose `source` onto a fresh black RGB frame of the same size.
    pub fn decompose(&self, source: &PixelBuffer) -> Result<Mosaic> {
        let mut frame = PixelBuffer::new(source.width(), source.height(), 3)?;
        let mut stats = TraversalStats::default();
        let root = Region::new(0, 0, source.width(), source.height());
        self.visit(source, root, &mut frame, &mut stats)?;
        debug!(
            width = source.width(),
            height = source.height(),
            nodes = stats.nodes,
            leaves = stats.leaves,
            skipped = stats.skipped,
            "frame decomposed"
        );
        Ok(Mosaic { frame, stats })
    }

    fn visit(
        &self,
        source: &PixelBuffer,
        region: Region,
        frame: &mut PixelBuffer,
        stats: &mut TraversalStats,
    ) -> Result<()> {
        stats.nodes += 1;
        let p = &self.params;
        let (w, h) = (region.width, region.height);

        let (split, color) = match self.mode {
            Mode::Gray => {
                let g = evaluate_gray(source, region)?;
                let uniform = g.max - g.min <= p.gray_uniform_range;
                let split = !uniform && w > p.gray_min_split && h > p.gray_min_split;
                if !split && g.mean <= p.dark_threshold {
                    stats.skipped += 1;
                    return Ok(());
                }
                (split, [g.mean; 3])
            }
            Mode::Color => {
                let c = evaluate_color(source, region)?;
                let split = (!c.quad && w > p.color_min_split && h > p.color_min_split)
                    || (w > p.color_max_leaf && h > p.color_max_leaf);
                (split, c.mean)
            }
        };

        if split {
            for child in region.quadrants() {
                self.visit(source, child, frame, stats)?;
            }
            return Ok(());
        }

        self.place(region, color, frame)?;
        stats.leaves += 1;
        Ok(())
    }

    fn place(&self, region: Region, color: [u8; 3], frame: &mut PixelBuffer) -> Result<()> {
        let (x, y) = (i64::from(region.x), i64::from(region.y));
        let sprite = self.sprites.get(region.width, region.height)?;
        overlay(frame, &self.params.tint.apply(&sprite, color), x, y);
        if let Some(eyes) = self.eyes {
            let eye = eyes.get(region.width, region.height)?;
            overlay(frame, &eye, x, y);
        }
        if let Some(line) = self.outline {
            outline_rect(frame, region.x, region.y, region.width, region.height, line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite_cache::DEFAULT_MIN_DIM;

    fn white(w: u32, h: u32) -> SpriteCache {
        SpriteCache::build(PixelBuffer::filled(w, h, &[255, 255, 255]).unwrap(), w, h, DEFAULT_MIN_DIM)
            .unwrap()
    }

    /// Left half black, right half white.
    fn split_frame(size: u32) -> PixelBuffer {
        let mut frame = PixelBuffer::new(size, size, 3).unwrap();
        for y in 0..size {
            for x in size / 2..size {
                frame.set_pixel(x, y, &[255, 255, 255]).unwrap();
            }
        }
        frame
    }

    #[test]
    fn quadrants_reuse_floor_half() {
        let q = Region::new(0, 0, 17, 9).quadrants();
        assert_eq!(q[0], Region::new(0, 0, 8, 4));
        assert_eq!(q[1], Region::new(9, 0, 8, 4));
        assert_eq!(q[2], Region::new(0, 5, 8, 4));
        assert_eq!(q[3], Region::new(9, 5, 8, 4));
    }

    #[test]
    fn gray_stats_round_mean() {
        let mut frame = PixelBuffer::new(2, 1, 1).unwrap();
        frame.set_pixel(0, 0, &[10]).unwrap();
        frame.set_pixel(1, 0, &[13]).unwrap();
        let g = evaluate_gray(&frame, Region::new(0, 0, 2, 1)).unwrap();
        assert_eq!(g, GrayStats { min: 10, max: 13, mean: 12 });
        assert!(evaluate_gray(&frame, Region::new(1, 0, 2, 1)).is_err());
    }

    #[test]
    fn color_stats_truncate_mean() {
        let mut frame = PixelBuffer::filled(2, 1, &[10, 20, 30]).unwrap();
        frame.set_pixel(1, 0, &[11, 20, 30]).unwrap();
        let c = evaluate_color(&frame, Region::new(0, 0, 2, 1)).unwrap();
        assert!(!c.quad);
        assert_eq!(c.mean, [10, 20, 30]);
        let one = evaluate_color(&frame, Region::new(0, 0, 1, 1)).unwrap();
        assert!(one.quad);
    }

    #[test]
    fn gray_sixteen_stays_leaf() {
        let cache = white(16, 16);
        let mosaic = Decomposer::new(&cache, Mode::Gray).decompose(&split_frame(16)).unwrap();
        assert_eq!(mosaic.stats.nodes, 1);
        assert_eq!(mosaic.stats.leaves, 1);
    }

    #[test]
    fn gray_seventeen_splits() {
        let cache = white(17, 17);
        let mosaic = Decomposer::new(&cache, Mode::Gray).decompose(&split_frame(17)).unwrap();
        assert_eq!(mosaic.stats.nodes, 5);
        // Middle column and row are never covered by a child.
        assert_eq!(mosaic.frame.pixel(8, 0).unwrap(), &[0, 0, 0]);
        assert_eq!(mosaic.frame.pixel(12, 8).unwrap(), &[0, 0, 0]);
    }

    #[test]
    fn gray_mid_gray_frame_is_tinted_sprite() {
        let cache = white(32, 32);
        let frame = PixelBuffer::filled(32, 32, &[128, 128, 128]).unwrap();
        let mosaic = Decomposer::new(&cache, Mode::Gray).decompose(&frame).unwrap();
        assert_eq!(mosaic.stats.leaves, 1);
        assert_eq!(mosaic.frame.dimensions(), (32, 32));
        assert!(mosaic.frame.samples().iter().all(|&v| v == 128));
    }

    #[test]
    fn gray_dark_leaves_are_skipped() {
        let cache = white(20, 20);
        let frame = PixelBuffer::filled(20, 20, &[20]).unwrap();
        let mosaic = Decomposer::new(&cache, Mode::Gray).decompose(&frame).unwrap();
        assert_eq!(mosaic.stats.skipped, 1);
        assert_eq!(mosaic.stats.leaves, 0);
        assert!(mosaic.frame.samples().iter().all(|&v| v == 0));

        let params = Params { dark_threshold: 0, ..Params::default() };
        let mosaic = Decomposer::new(&cache, Mode::Gray).with_params(params).decompose(&frame).unwrap();
        assert_eq!(mosaic.stats.leaves, 1);
        assert!(mosaic.frame.samples().iter().all(|&v| v == 20));
    }

    #[test]
    fn color_uniform_leaf_at_root() {
        let cache = white(32, 32);
        let frame = PixelBuffer::filled(32, 32, &[200, 100, 50]).unwrap();
        let mosaic = Decomposer::new(&cache, Mode::Color).decompose(&frame).unwrap();
        assert_eq!(mosaic.stats.nodes, 1);
        for px in mosaic.frame.samples().chunks_exact(3) {
            assert_eq!(px, &[200, 100, 50]);
        }
    }

    #[test]
    fn color_large_uniform_frame_still_splits() {
        let cache = white(64, 64);
        let frame = PixelBuffer::filled(64, 64, &[90, 90, 90]).unwrap();
        let mosaic = Decomposer::new(&cache, Mode::Color).decompose(&frame).unwrap();
        assert_eq!(mosaic.stats.nodes, 5);
        assert_eq!(mosaic.stats.leaves, 4);
        // All leaves were 32x32, already seeded.
        assert_eq!(cache.resize_count(), cache.len());
        assert!(cache.lookup(32, 32).is_some());
    }

    #[test]
    fn color_mode_needs_rgb() {
        let cache = white(8, 8);
        let frame = PixelBuffer::new(8, 8, 1).unwrap();
        let err = Decomposer::new(&cache, Mode::Color).decompose(&frame).unwrap_err();
        assert!(matches!(err, MosaicError::InvalidDimension { channels: 1, .. }));
    }

    #[test]
    fn eyes_are_drawn_untinted() {
        let cache = white(8, 8);
        let mut eye = PixelBuffer::new(8, 8, 4).unwrap();
        eye.set_pixel(3, 3, &[255, 0, 0, 255]).unwrap();
        let eyes = SpriteCache::new(eye);
        let frame = PixelBuffer::filled(8, 8, &[100, 100, 100]).unwrap();
        let mosaic = Decomposer::new(&cache, Mode::Color)
            .with_eyes(Some(&eyes))
            .decompose(&frame)
            .unwrap();
        assert_eq!(mosaic.frame.pixel(3, 3).unwrap(), &[255, 0, 0]);
        assert_eq!(mosaic.frame.pixel(4, 3).unwrap(), &[100, 100, 100]);
    }

    #[test]
    fn outline_marks_leaf_border() {
        let cache = white(8, 8);
        let frame = PixelBuffer::filled(8, 8, &[100, 100, 100]).unwrap();
        let mosaic = Decomposer::new(&cache, Mode::Color)
            .with_outline(Some([0, 255, 0]))
            .decompose(&frame)
            .unwrap();
        assert_eq!(mosaic.frame.pixel(0, 0).unwrap(), &[0, 255, 0]);
        assert_eq!(mosaic.frame.pixel(7, 4).unwrap(), &[0, 255, 0]);
        assert_eq!(mosaic.frame.pixel(4, 4).unwrap(), &[100, 100, 100]);
    }
}
