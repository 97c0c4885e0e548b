//! Memoized sprite resizes keyed by block size.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::composite::resize_nearest;
use crate::Result;

/// Default dimension at which seeding stops halving.
pub const DEFAULT_MIN_DIM: u32 = 4;

/// A sprite plus every resized copy requested so far.
///
/// Entries are never evicted, so a key always maps to the same pixels. The
/// cache is `Sync`: frame workers share one instance by reference and a miss
/// resizes once under the write lock.
pub struct SpriteCache {
    sprite: PixelBuffer,
    entries: RwLock<HashMap<(u32, u32), Arc<PixelBuffer>>>,
    resizes: AtomicUsize,
}

impl SpriteCache {
    /// Empty cache around `sprite`; sizes are resized on first use.
    pub fn new(sprite: PixelBuffer) -> Self {
        Self {
            sprite,
            entries: RwLock::new(HashMap::new()),
            resizes: AtomicUsize::new(0),
        }
    }

    /// Cache pre-warmed for a `width`×`height` frame: the sprite is resized to
    /// every size on the halving chain `(w, h), (w/2, h/2), ...` until either
    /// side is `<= min_dim`.
    pub fn build(sprite: PixelBuffer, width: u32, height: u32, min_dim: u32) -> Result<Self> {
        let cache = Self::new(sprite);
        let (mut w, mut h) = (width, height);
        loop {
            cache.get(w, h)?;
            if w <= min_dim || h <= min_dim {
                break;
            }
            w /= 2;
            h /= 2;
        }
        debug!(width, height, entries = cache.len(), "sprite cache seeded");
        Ok(cache)
    }

    /// The sprite resized to exactly `width`×`height`.
    pub fn get(&self, width: u32, height: u32) -> Result<Arc<PixelBuffer>> {
        if let Some(hit) = self.lookup(width, height) {
            return Ok(hit);
        }
        let resized = Arc::new(resize_nearest(&self.sprite, width, height)?);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry((width, height)).or_insert_with(|| {
            self.resizes.fetch_add(1, Ordering::Relaxed);
            resized
        });
        Ok(Arc::clone(entry))
    }

    /// Cached entry without resizing on a miss.
    pub fn lookup(&self, width: u32, height: u32) -> Option<Arc<PixelBuffer>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&(width, height)).cloned()
    }

    pub fn sprite(&self) -> &PixelBuffer {
        &self.sprite
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of resizes stored since construction.
    pub fn resize_count(&self) -> usize {
        self.resizes.load(Ordering::Relaxed)
    }
}
