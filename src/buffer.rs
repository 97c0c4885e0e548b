//! Owned, bounds-checked pixel storage.

use crate::{MosaicError, Result};

/// A W×H image with 1, 3 or 4 interleaved 8-bit channels.
///
/// Sample `(x, y, c)` lives at `(x + y * width) * channels + c`.
/// Operations that change dimensions return a new buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    samples: Vec<u8>,
}

impl PixelBuffer {
    /// Zero-filled buffer.
    pub fn new(width: u32, height: u32, channels: u8) -> Result<Self> {
        check_dimensions(width, height, channels)?;
        let len = width as usize * height as usize * channels as usize;
        Ok(Self { width, height, channels, samples: vec![0; len] })
    }

    /// Wrap raw samples, e.g. the output of a decoder.
    pub fn from_raw(width: u32, height: u32, channels: u8, samples: Vec<u8>) -> Result<Self> {
        check_dimensions(width, height, channels)?;
        if samples.len() != width as usize * height as usize * channels as usize {
            return Err(MosaicError::InvalidDimension { width, height, channels });
        }
        Ok(Self { width, height, channels, samples })
    }

    /// Buffer filled with one pixel value. `pixel` must have `channels` entries.
    pub fn filled(width: u32, height: u32, pixel: &[u8]) -> Result<Self> {
        let channels = u8::try_from(pixel.len()).unwrap_or(0);
        let mut buf = Self::new(width, height, channels)?;
        for px in buf.samples.chunks_exact_mut(pixel.len()) {
            px.copy_from_slice(pixel);
        }
        Ok(buf)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [u8] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<u8> {
        self.samples
    }

    #[inline]
    pub fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (x as usize + y as usize * self.width as usize) * self.channels as usize
    }

    /// All channels of pixel (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> Result<&[u8]> {
        self.check(x, y)?;
        let i = self.offset(x, y);
        Ok(&self.samples[i..i + self.channels as usize])
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Result<&mut [u8]> {
        self.check(x, y)?;
        let i = self.offset(x, y);
        let n = self.channels as usize;
        Ok(&mut self.samples[i..i + n])
    }

    /// Write the leading channels of pixel (x, y). Extra values are ignored,
    /// missing ones leave the remaining channels untouched.
    pub fn set_pixel(&mut self, x: u32, y: u32, values: &[u8]) -> Result<()> {
        let px = self.pixel_mut(x, y)?;
        let n = px.len().min(values.len());
        px[..n].copy_from_slice(&values[..n]);
        Ok(())
    }

    /// Single sample lookup.
    pub fn sample(&self, x: u32, y: u32, c: u8) -> Result<u8> {
        if c >= self.channels {
            return Err(MosaicError::OutOfRange { x, y, width: self.width, height: self.height });
        }
        Ok(self.pixel(x, y)?[c as usize])
    }

    fn check(&self, x: u32, y: u32) -> Result<()> {
        if self.in_bounds(x, y) {
            Ok(())
        } else {
            Err(MosaicError::OutOfRange { x, y, width: self.width, height: self.height })
        }
    }

    /// Row `y` restricted to columns `[x, x + w)`. Caller guarantees bounds.
    pub(crate) fn row_span(&self, x: u32, y: u32, w: u32) -> &[u8] {
        let start = self.offset(x, y);
        &self.samples[start..start + w as usize * self.channels as usize]
    }
}

pub(crate) fn check_dimensions(width: u32, height: u32, channels: u8) -> Result<()> {
    if width == 0 || height == 0 || !matches!(channels, 1 | 3 | 4) {
        return Err(MosaicError::InvalidDimension { width, height, channels });
    }
    Ok(())
}
