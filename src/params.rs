//! Tuning constants for the decomposer, loadable from JSON.

use std::path::Path;

use serde::Deserialize;

use crate::composite::Tint;
use crate::sprite_cache::DEFAULT_MIN_DIM;
use crate::{MosaicError, Result};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Params {
    /// Grayscale regions with `max - min` at or below this are uniform.
    pub gray_uniform_range: u8,
    /// Grayscale regions split only while both sides exceed this.
    pub gray_min_split: u32,
    /// Non-uniform colour regions split only while both sides exceed this.
    pub color_min_split: u32,
    /// Colour regions with both sides above this always split.
    pub color_max_leaf: u32,
    /// Grayscale leaves with a mean at or below this are left black.
    pub dark_threshold: u8,
    /// Sprite cache seeding stops once either side is at or below this.
    pub cache_min_dim: u32,
    pub tint: Tint,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            gray_uniform_range: 4,
            gray_min_split: 16,
            color_min_split: 8,
            color_max_leaf: 32,
            dark_threshold: 20,
            cache_min_dim: DEFAULT_MIN_DIM,
            tint: Tint::Fraction,
        }
    }
}

impl Params {
    pub fn from_json(text: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(text).map_err(|e| MosaicError::Params(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Split thresholds of zero would let regions shrink to nothing.
    pub fn validate(&self) -> Result<()> {
        let floors = [
            ("gray_min_split", self.gray_min_split),
            ("color_min_split", self.color_min_split),
            ("color_max_leaf", self.color_max_leaf),
            ("cache_min_dim", self.cache_min_dim),
        ];
        if let Some((name, _)) = floors.iter().find(|(_, v)| *v == 0) {
            return Err(MosaicError::Params(format!("{name} must be at least 1")));
        }
        Ok(())
    }
}
