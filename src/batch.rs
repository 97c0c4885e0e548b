//! Frame enumeration, sprite rotation and the parallel per-frame driver.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::codec;
use crate::params::Params;
use crate::quadtree::{Decomposer, Mode};
use crate::sprite_cache::SpriteCache;
use crate::{MosaicError, Result};

/// Sprites each shown for `repeat` consecutive frames, in a loop.
pub struct SpriteSet {
    sprites: Vec<SpriteCache>,
    eyes: Option<Vec<SpriteCache>>,
    repeat: usize,
}

impl SpriteSet {
    pub fn new(sprites: Vec<SpriteCache>) -> Result<Self> {
        if sprites.is_empty() {
            return Err(MosaicError::MissingSprite("sprite set is empty".into()));
        }
        Ok(Self { sprites, eyes: None, repeat: 2 })
    }

    /// Pair every sprite with an eye sprite drawn untinted on top.
    pub fn with_eyes(mut self, eyes: Vec<SpriteCache>) -> Result<Self> {
        if eyes.len() != self.sprites.len() {
            return Err(MosaicError::MissingSprite(format!(
                "{} eye sprites for {} sprites",
                eyes.len(),
                self.sprites.len()
            )));
        }
        self.eyes = Some(eyes);
        Ok(self)
    }

    pub fn with_repeat(mut self, repeat: usize) -> Result<Self> {
        if repeat == 0 {
            return Err(MosaicError::Params("sprite repeat must be at least 1".into()));
        }
        self.repeat = repeat;
        Ok(self)
    }

    /// Load `{k}.png` (and `{k}_eye.png` with `eyes`) for `k in 0..count`.
    /// With `seed`, each cache is pre-warmed for a frame of that size;
    /// without it every size is resized on first use.
    pub fn load(
        dir: impl AsRef<Path>,
        count: usize,
        eyes: bool,
        seed: Option<(u32, u32)>,
        min_dim: u32,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let load_all = |suffix: &str| -> Result<Vec<SpriteCache>> {
            (0..count)
                .map(|k| {
                    let sprite = codec::decode(dir.join(format!("{k}{suffix}.png")))?;
                    match seed {
                        Some((width, height)) => SpriteCache::build(sprite, width, height, min_dim),
                        None => Ok(SpriteCache::new(sprite)),
                    }
                })
                .collect()
        };
        let set = Self::new(load_all("")?)?;
        info!(count, seed = ?seed, "sprites loaded");
        if eyes {
            set.with_eyes(load_all("_eye")?)
        } else {
            Ok(set)
        }
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    /// Sprite index for frame `frame`.
    pub fn index_for(&self, frame: usize) -> usize {
        (frame % (self.sprites.len() * self.repeat)) / self.repeat
    }

    pub fn pick(&self, frame: usize) -> (&SpriteCache, Option<&SpriteCache>) {
        let k = self.index_for(frame);
        (&self.sprites[k], self.eyes.as_ref().map(|eyes| &eyes[k]))
    }
}

/// One frame's input and output location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameJob {
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// `img_{i}.png` for every `i` in `start..=end`.
pub fn frames_in_range(input: &Path, output: &Path, start: usize, end: usize) -> Vec<FrameJob> {
    (start..=end)
        .map(|index| {
            let name = format!("img_{index}.png");
            FrameJob { index, input: input.join(&name), output: output.join(&name) }
        })
        .collect()
}

/// Every file in `input`, sorted by name and indexed by position.
pub fn frames_in_dir(input: &Path, output: &Path) -> Result<Vec<FrameJob>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(input)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name());
        }
    }
    names.sort();
    Ok(names
        .into_iter()
        .enumerate()
        .map(|(index, name)| FrameJob { index, input: input.join(&name), output: output.join(&name) })
        .collect())
}

/// Dimensions of a frame without decoding its pixels.
pub fn probe_dimensions(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path).map_err(|source| MosaicError::Decode { path: path.to_path_buf(), source })
}

/// Size of the first frame whose header can be read. Unreadable frames are
/// left for [`Batch::run`] to report.
pub fn seed_dimensions(jobs: &[FrameJob]) -> Option<(u32, u32)> {
    jobs.iter().find_map(|job| match probe_dimensions(&job.input) {
        Ok(dims) => Some(dims),
        Err(e) => {
            debug!(index = job.index, error = %e, "cannot seed sprite caches from frame");
            None
        }
    })
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    /// Frame index and reason for every skipped frame.
    pub failed: Vec<(usize, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs decode → decompose → encode for many frames on a worker pool.
pub struct Batch<'a> {
    sprites: &'a SpriteSet,
    mode: Mode,
    params: Params,
    outline: Option<[u8; 3]>,
    threads: Option<usize>,
}

impl<'a> Batch<'a> {
    pub fn new(sprites: &'a SpriteSet, mode: Mode) -> Self {
        Self { sprites, mode, params: Params::default(), outline: None, threads: None }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_outline(mut self, color: Option<[u8; 3]>) -> Self {
        self.outline = color;
        self
    }

    /// Worker count; `None` uses rayon's default.
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Process every job. A failing frame is logged and recorded; the rest
    /// still run.
    pub fn run(&self, jobs: &[FrameJob]) -> Result<BatchReport> {
        let pool = build_thread_pool(self.threads)?;

        let dirs: BTreeSet<&Path> = jobs.iter().filter_map(|job| job.output.parent()).collect();
        for dir in dirs {
            std::fs::create_dir_all(dir)?;
        }

        let results: Vec<(usize, Result<PathBuf>)> =
            pool.install(|| jobs.par_iter().map(|job| (job.index, self.process(job))).collect());

        let mut report = BatchReport::default();
        for (index, result) in results {
            match result {
                Ok(_) => report.succeeded += 1,
                Err(e) => report.failed.push((index, e.to_string())),
            }
        }
        info!(succeeded = report.succeeded, failed = report.failed.len(), "batch finished");
        Ok(report)
    }

    /// Decompose a single frame and write it out.
    #[tracing::instrument(skip(self, job), fields(index = job.index))]
    pub fn process(&self, job: &FrameJob) -> Result<PathBuf> {
        let outcome = self.render(job);
        match &outcome {
            Ok(path) => info!(output = %path.display(), "frame written"),
            Err(e) => warn!(input = %job.input.display(), error = %e, "frame skipped"),
        }
        outcome
    }

    fn render(&self, job: &FrameJob) -> Result<PathBuf> {
        let source = codec::decode(&job.input)?;
        let (sprite, eyes) = self.sprites.pick(job.index);
        let mosaic = Decomposer::new(sprite, self.mode)
            .with_params(self.params.clone())
            .with_eyes(eyes)
            .with_outline(self.outline)
            .decompose(&source)?;
        codec::encode(&mosaic.frame, &job.output)?;
        Ok(job.output.clone())
    }
}

fn build_thread_pool(threads: Option<usize>) -> Result<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(MosaicError::ThreadPool("thread count must be at least 1".into()));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder.build().map_err(|e| MosaicError::ThreadPool(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;

    fn set(count: usize) -> SpriteSet {
        let sprites = (0..count)
            .map(|k| SpriteCache::new(PixelBuffer::filled(2, 2, &[k as u8, 0, 0]).unwrap()))
            .collect();
        SpriteSet::new(sprites).unwrap()
    }

    #[test]
    fn sprites_rotate_every_repeat_frames() {
        let sprites = set(6);
        let picks: Vec<usize> = (0..14).map(|i| sprites.index_for(i)).collect();
        assert_eq!(picks, [0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 0, 0]);

        let sprites = set(3).with_repeat(1).unwrap();
        assert_eq!(sprites.index_for(4), 1);
        assert!(set(3).with_repeat(0).is_err());
    }

    #[test]
    fn sprite_set_validation() {
        assert!(SpriteSet::new(Vec::new()).is_err());
        let eyes = vec![SpriteCache::new(PixelBuffer::new(1, 1, 4).unwrap())];
        assert!(matches!(set(2).with_eyes(eyes), Err(MosaicError::MissingSprite(_))));
    }

    #[test]
    fn range_names_frames_by_index() {
        let jobs = frames_in_range(Path::new("in"), Path::new("out"), 3, 5);
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].input, Path::new("in/img_3.png"));
        assert_eq!(jobs[2].output, Path::new("out/img_5.png"));
        assert_eq!(jobs[2].index, 5);
        assert!(frames_in_range(Path::new("in"), Path::new("out"), 5, 4).is_empty());
    }

    #[test]
    fn directory_frames_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.png"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let jobs = frames_in_dir(dir.path(), Path::new("out")).unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.output.clone()).collect();
        assert_eq!(names, [Path::new("out/a.png"), Path::new("out/b.png"), Path::new("out/c.png")]);
        assert_eq!(jobs[1].index, 1);
    }

    #[test]
    fn seed_skips_unreadable_frames() {
        let dir = tempfile::tempdir().unwrap();
        let frame = PixelBuffer::new(6, 4, 3).unwrap();
        codec::encode(&frame, dir.path().join("img_2.png")).unwrap();
        std::fs::write(dir.path().join("img_1.png"), b"garbage").unwrap();

        let jobs = frames_in_range(dir.path(), dir.path(), 0, 2);
        assert_eq!(seed_dimensions(&jobs), Some((6, 4)));
        assert_eq!(seed_dimensions(&jobs[..2]), None);
    }

    #[test]
    fn zero_threads_is_rejected() {
        assert!(matches!(build_thread_pool(Some(0)), Err(MosaicError::ThreadPool(_))));
    }
}
