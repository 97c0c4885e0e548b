//! Quadtree sprite mosaics for image sequences.
//!
//! Each frame is split into blocks until they are uniform enough, and every
//! block is replaced by a pre-scaled sprite tinted to the block's colour.

pub mod batch;
pub mod buffer;
pub mod codec;
pub mod composite;
pub mod params;
pub mod quadtree;
pub mod sprite_cache;

pub use batch::{Batch, BatchReport, FrameJob, SpriteSet};
pub use buffer::PixelBuffer;
pub use composite::Tint;
pub use params::Params;
pub use quadtree::{Decomposer, Mode, Mosaic, Region, TraversalStats};
pub use sprite_cache::SpriteCache;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MosaicError {
    #[error("Invalid dimension: {width}x{height} with {channels} channels")]
    InvalidDimension { width: u32, height: u32, channels: u8 },
    #[error("Pixel ({x}, {y}) outside {width}x{height} image")]
    OutOfRange { x: u32, y: u32, width: u32, height: u32 },
    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Params error: {0}")]
    Params(String),
    #[error("Sprite error: {0}")]
    MissingSprite(String),
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, MosaicError>;
