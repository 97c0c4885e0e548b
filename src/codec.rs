//! PNG/JPEG reading and writing through the `image` crate.

use std::path::Path;

use image::{ColorType, DynamicImage};

use crate::buffer::PixelBuffer;
use crate::{MosaicError, Result};

/// Read an image file, keeping 1, 3 or 4 channels.
///
/// Gray+alpha is widened to RGBA; deeper sample types are narrowed to 8 bits.
pub fn decode(path: impl AsRef<Path>) -> Result<PixelBuffer> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| MosaicError::Decode { path: path.to_path_buf(), source })?;
    from_dynamic(image)
}

pub fn from_dynamic(image: DynamicImage) -> Result<PixelBuffer> {
    let (width, height) = (image.width(), image.height());
    let (channels, samples) = match image {
        DynamicImage::ImageLuma8(gray) => (1, gray.into_raw()),
        DynamicImage::ImageRgb8(rgb) => (3, rgb.into_raw()),
        DynamicImage::ImageRgba8(rgba) => (4, rgba.into_raw()),
        other if other.color().has_alpha() => (4, other.to_rgba8().into_raw()),
        other if other.color().has_color() => (3, other.to_rgb8().into_raw()),
        other => (1, other.to_luma8().into_raw()),
    };
    PixelBuffer::from_raw(width, height, channels, samples)
}

/// Write `buffer` to `path`; the format follows the file extension.
pub fn encode(buffer: &PixelBuffer, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let color = match buffer.channels() {
        1 => ColorType::L8,
        3 => ColorType::Rgb8,
        _ => ColorType::Rgba8,
    };
    image::save_buffer(path, buffer.samples(), buffer.width(), buffer.height(), color)
        .map_err(|source| MosaicError::Encode { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_keeps_channel_count() {
        let dir = tempfile::tempdir().unwrap();
        for channels in [1u8, 3, 4] {
            let mut buf = PixelBuffer::new(5, 3, channels).unwrap();
            for (i, v) in buf.samples_mut().iter_mut().enumerate() {
                *v = (i * 13 % 256) as u8;
            }
            let path = dir.path().join(format!("c{channels}.png"));
            encode(&buf, &path).unwrap();
            assert_eq!(decode(&path).unwrap(), buf);
        }
    }

    #[test]
    fn gray_alpha_widens_to_rgba() {
        let img = image::GrayAlphaImage::from_raw(1, 1, vec![40, 200]).unwrap();
        let buf = from_dynamic(DynamicImage::ImageLumaA8(img)).unwrap();
        assert_eq!(buf.channels(), 4);
        assert_eq!(buf.pixel(0, 0).unwrap(), &[40, 40, 40, 200]);
    }

    #[test]
    fn missing_or_corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");
        assert!(matches!(decode(&missing), Err(MosaicError::Decode { .. })));

        let corrupt = dir.path().join("bad.png");
        std::fs::write(&corrupt, b"not a png").unwrap();
        assert!(matches!(decode(&corrupt), Err(MosaicError::Decode { .. })));
    }

    #[test]
    fn unwritable_path_is_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let buf = PixelBuffer::new(2, 2, 3).unwrap();
        let path = dir.path().join("missing_dir").join("out.png");
        assert!(matches!(encode(&buf, &path), Err(MosaicError::Encode { .. })));
    }
}
