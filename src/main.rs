//! quadmosaic CLI - Stylize a frame sequence with quadtree sprite mosaics

use clap::Parser;
use quadmosaic::{batch, Batch, Mode, MosaicError, Params, SpriteSet};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quadmosaic", about = "Turn image frames into sprite mosaics")]
struct Args {
    /// Grayscale or colour decomposition
    #[arg(value_enum)]
    mode: Mode,
    /// First frame index (reads <input>/img_<i>.png); omit to take every file in <input>
    #[arg(long, requires = "end")]
    start: Option<usize>,
    /// Last frame index, inclusive
    #[arg(long, requires = "start")]
    end: Option<usize>,
    /// Directory of input frames
    #[arg(short, long, default_value = "in")]
    input: PathBuf,
    /// Directory for output frames
    #[arg(short, long, default_value = "out")]
    output: PathBuf,
    /// Directory holding <k>.png (and <k>_eye.png) sprites
    #[arg(short, long, default_value = "res")]
    sprites: PathBuf,
    /// Number of sprites to rotate through
    #[arg(long, default_value = "6")]
    sprite_count: usize,
    /// Frames each sprite is shown for
    #[arg(short, long, default_value = "2")]
    repeat: usize,
    /// Draw <k>_eye.png untinted over every tile
    #[arg(short, long)]
    eyes: bool,
    /// Worker threads (default: one per core)
    #[arg(short, long)]
    threads: Option<usize>,
    /// JSON file overriding tuning constants
    #[arg(short, long)]
    params: Option<PathBuf>,
    /// Outline every tile in this colour, e.g. 0,255,0
    #[arg(long, value_parser = parse_color)]
    outline: Option<[u8; 3]>,
}

fn parse_color(s: &str) -> Result<[u8; 3], String> {
    let parts: Vec<u8> = s
        .split(',')
        .map(|p| p.trim().parse::<u8>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    <[u8; 3]>::try_from(parts).map_err(|_| "expected R,G,B".to_string())
}

fn main() -> Result<(), MosaicError> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let params = match &args.params {
        Some(path) => Params::load(path)?,
        None => Params::default(),
    };

    let jobs = match (args.start, args.end) {
        (Some(start), Some(end)) => batch::frames_in_range(&args.input, &args.output, start, end),
        _ => batch::frames_in_dir(&args.input, &args.output)?,
    };
    if jobs.is_empty() {
        tracing::warn!(input = %args.input.display(), "no frames to process");
        return Ok(());
    }

    // Sprites are seeded for the first readable frame's size and shared by every worker.
    let seed = batch::seed_dimensions(&jobs);
    let sprites = SpriteSet::load(&args.sprites, args.sprite_count, args.eyes, seed, params.cache_min_dim)?
        .with_repeat(args.repeat)?;

    let report = Batch::new(&sprites, args.mode)
        .with_params(params)
        .with_outline(args.outline)
        .with_threads(args.threads)
        .run(&jobs)?;

    for (index, reason) in &report.failed {
        eprintln!("frame {index} failed: {reason}");
    }
    println!("Done: {} frames written, {} failed", report.succeeded, report.failed.len());
    Ok(())
}
