// Example runner for the `glitch_engine` library.
//
// It stands in for the collaborators the engine leaves out: a background image
// is loaded from disk, live frames are synthesized (a bright bar sweeping over
// an optional still image), effects are cycled like a user pressing buttons,
// and every rendered frame is written out as a PNG.

use anyhow::{Context, Result, bail};
use glitch_engine::core_modules::utils::image_helper::image_helper;
use glitch_engine::{Dimensions, Effect, FrameBuffer, GlitchPipeline, PipelineConfig, Session};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_FRAMES: u64 = 48;
const DEFAULT_FRAMES_PER_EFFECT: u64 = 6;

/// Runner settings from positional arguments plus `GLITCH_*` overrides.
#[derive(Debug)]
struct RunnerConfig {
    background: PathBuf,
    output_dir: PathBuf,
    frames: u64,
    live_image: Option<PathBuf>,
    alpha: Option<f32>,
    seed: u64,
    threads: Option<usize>,
    effect: Effect,
    frames_per_effect: u64,
}

impl RunnerConfig {
    fn from_env() -> Result<Option<Self>> {
        let args: Vec<String> = env::args().collect();
        if args.len() < 3 {
            println!("Usage: glitch_engine <background_image> <output_dir> [frames] [live_image]");
            println!("Environment: GLITCH_ALPHA, GLITCH_SEED, GLITCH_THREADS, GLITCH_EFFECT, GLITCH_FRAMES_PER_EFFECT");
            return Ok(None);
        }

        let frames = match args.get(3) {
            Some(raw) => raw.parse().with_context(|| format!("invalid frame count `{raw}`"))?,
            None => DEFAULT_FRAMES,
        };

        Ok(Some(Self {
            background: PathBuf::from(&args[1]),
            output_dir: PathBuf::from(&args[2]),
            frames,
            live_image: args.get(4).map(PathBuf::from),
            alpha: env_var("GLITCH_ALPHA")?,
            seed: env_var("GLITCH_SEED")?.unwrap_or(0),
            threads: env_var("GLITCH_THREADS")?,
            effect: env_var("GLITCH_EFFECT")?.unwrap_or_default(),
            frames_per_effect: env_var("GLITCH_FRAMES_PER_EFFECT")?
                .unwrap_or(DEFAULT_FRAMES_PER_EFFECT)
                .max(1),
        }))
    }
}

fn env_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value `{raw}` for {name}")),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(error) => Err(error).with_context(|| format!("cannot read {name}")),
    }
}

/// A live frame: the still image (or black) with a bright bar sweeping across.
fn synthetic_live(dims: Dimensions, base: Option<&FrameBuffer>, frame_index: u64) -> FrameBuffer {
    let mut frame = match base {
        Some(base) => base.clone(),
        None => FrameBuffer::new(dims.width, dims.height),
    };

    let width = dims.width.max(1) as u64;
    // The bar speeds up and widens over time so intensity varies from frame to frame.
    let bar_width = (width / 16).max(1) + (frame_index % 8) * (width / 32).max(1);
    let start = (frame_index * frame_index * 3) % width;

    for row in 0..dims.height as usize {
        for offset in 0..bar_width.min(width) {
            let col = ((start + offset) % width) as usize;
            frame.set_pixel(row, col, [250, 250, 250]);
        }
    }
    frame
}

fn output_path(dir: &Path, frame_index: u64, effect: Effect) -> PathBuf {
    dir.join(format!("frame_{frame_index:04}_{}.png", effect.id()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Some(runner) = RunnerConfig::from_env()? else {
        return Ok(());
    };

    // --- 1. Inputs ---
    let background = image_helper::load(&runner.background)
        .with_context(|| format!("cannot load background {}", runner.background.display()))?;
    let dims = background.dimensions();
    if dims.pixel_count() == 0 {
        bail!("background {} is empty", runner.background.display());
    }
    let still = match &runner.live_image {
        Some(path) => {
            let image = image_helper::load(path).with_context(|| format!("cannot load live image {}", path.display()))?;
            Some(image_helper::fit(&image, dims.width, dims.height)?)
        }
        None => None,
    };
    std::fs::create_dir_all(&runner.output_dir)
        .with_context(|| format!("cannot create {}", runner.output_dir.display()))?;

    // --- 2. Pipeline ---
    let mut config = PipelineConfig::new(dims.width, dims.height);
    config.seed = runner.seed;
    config.threads = runner.threads;
    config.initial_effect = runner.effect;
    if let Some(alpha) = runner.alpha {
        config.alpha = alpha;
    }
    let pipeline = GlitchPipeline::new(config, background)?;
    let mut session = Session::spawn(pipeline, 2);

    // --- 3. Frame Loop ---
    let mut effect = runner.effect;
    for frame_index in 0..runner.frames {
        if frame_index > 0 && frame_index % runner.frames_per_effect == 0 {
            effect = effect.next();
            session.select(effect);
        }

        session.submit(synthetic_live(dims, still.as_ref(), frame_index)).await?;
        let Some(processed) = session.next_output().await else {
            bail!("session stopped after {frame_index} frames");
        };

        let path = output_path(&runner.output_dir, processed.report.frame_index, processed.report.effect);
        image_helper::save(&path, &processed.frame).with_context(|| format!("cannot write {}", path.display()))?;
        info!(
            frame = processed.report.frame_index,
            effect = %processed.report.effect,
            intensity = processed.report.motion.intensity,
            "wrote {}",
            path.display()
        );
    }

    let pipeline = session.shutdown().await?;
    println!(
        "Processing complete. {} frames saved to {}",
        pipeline.frames_processed(),
        runner.output_dir.display()
    );
    Ok(())
}
