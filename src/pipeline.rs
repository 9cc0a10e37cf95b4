// THEORY:
// The `pipeline` module is the top-level API of the engine. It owns everything
// that lives across frames (the background, the previous mask, the worker pool
// and the scratch buffers) and runs one frame through the full stack:
//
//   live frame -> MotionEstimator (merged buffer + intensity)
//              -> active Effect (result buffer)
//              -> caller
//
// Both stages are fork-join phases on the same persistent pool and the second
// never starts before the first has joined. The active effect is read from the
// shared `EffectSelector` once, at the start of the frame.

use crate::core_modules::effects::EffectRun;
use crate::core_modules::frame::frame::{Dimensions, FrameBuffer};
use crate::core_modules::motion::MotionEstimator;
use crate::core_modules::partition::{WorkerPool, available_parallelism};
use crate::core_modules::selector::EffectSelector;
use crate::error::GlitchError;
use tracing::{debug, info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::motion::MotionReport;
pub use crate::core_modules::selector::Effect;

/// Initial blend of the live frame over the background.
pub const DEFAULT_ALPHA: f32 = 0.3;

/// Configuration for the GlitchPipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub image_width: u32,
    pub image_height: u32,
    /// Weight of the live frame in the merged buffer, in `[0, 1]`.
    pub alpha: f32,
    /// Master seed; every frame derives its own seed from it.
    pub seed: u64,
    /// Worker count. `None` uses the platform's hardware parallelism.
    pub threads: Option<usize>,
    pub initial_effect: Effect,
}

impl PipelineConfig {
    pub fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            image_width,
            image_height,
            alpha: DEFAULT_ALPHA,
            seed: 0,
            threads: None,
            initial_effect: Effect::default(),
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.image_width, self.image_height)
    }
}

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub effect: Effect,
    pub motion: MotionReport,
}

/// The main, top-level struct of the engine.
pub struct GlitchPipeline {
    config: PipelineConfig,
    background: FrameBuffer,
    motion: MotionEstimator,
    selector: EffectSelector,
    pool: WorkerPool,
    merged: FrameBuffer,
    result: FrameBuffer,
    frame_counter: u64,
    last_report: Option<FrameReport>,
}

impl GlitchPipeline {
    pub fn new(config: PipelineConfig, background: FrameBuffer) -> Result<Self, GlitchError> {
        let dims = config.dimensions();
        if background.dimensions() != dims {
            return Err(GlitchError::DimensionMismatch {
                expected: dims,
                found: background.dimensions(),
            });
        }

        let pool = WorkerPool::new(config.threads.unwrap_or_else(available_parallelism))?;
        info!(
            width = dims.width,
            height = dims.height,
            threads = pool.threads(),
            effect = config.initial_effect.id(),
            "glitch pipeline ready"
        );

        let mut pipeline = Self {
            background,
            motion: MotionEstimator::new(dims),
            selector: EffectSelector::new(config.initial_effect),
            pool,
            merged: FrameBuffer::new(dims.width, dims.height),
            result: FrameBuffer::new(dims.width, dims.height),
            frame_counter: 0,
            last_report: None,
            config,
        };
        pipeline.set_alpha(pipeline.config.alpha);
        Ok(pipeline)
    }

    /// A handle that can switch the active effect from anywhere.
    pub fn selector(&self) -> EffectSelector {
        self.selector.clone()
    }

    pub fn alpha(&self) -> f32 {
        self.config.alpha
    }

    /// The configuration the pipeline is currently running with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sets the live-frame blend weight, clamped to `[0, 1]`.
    pub fn set_alpha(&mut self, alpha: f32) {
        let clamped = if alpha.is_nan() { DEFAULT_ALPHA } else { alpha.clamp(0.0, 1.0) };
        if clamped != alpha {
            warn!(alpha, clamped, "alpha out of range");
        }
        self.config.alpha = clamped;
    }

    pub fn threads(&self) -> usize {
        self.pool.threads()
    }

    pub fn dimensions(&self) -> Dimensions {
        self.background.dimensions()
    }

    /// The seed used for frame `frame_index`.
    pub fn frame_seed(&self, frame_index: u64) -> u64 {
        splitmix64(self.config.seed ^ frame_index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Runs `live` through motion estimation and the active effect.
    pub fn generate_report(&mut self, live: &FrameBuffer) -> Result<FrameReport, GlitchError> {
        let dims = self.dimensions();
        if live.dimensions() != dims {
            return Err(GlitchError::DimensionMismatch {
                expected: dims,
                found: live.dimensions(),
            });
        }

        // Stage 1: Motion Estimation
        let motion = self
            .motion
            .estimate(&self.pool, &self.background, live, self.config.alpha, &mut self.merged)?;

        // Stage 2: Effect
        let effect = self.selector.current();
        let frame_index = self.frame_counter;
        let run = EffectRun::new(&self.pool, self.frame_seed(frame_index));
        effect.apply(&run, &mut self.result, &self.merged, motion.intensity);

        self.frame_counter += 1;
        debug!(
            frame = frame_index,
            effect = effect.id(),
            intensity = motion.intensity,
            "frame processed"
        );

        let report = FrameReport {
            frame_index,
            effect,
            motion,
        };
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Runs `live` through the pipeline and returns the rendered frame.
    pub fn process_frame(&mut self, live: &FrameBuffer) -> Result<&FrameBuffer, GlitchError> {
        self.generate_report(live)?;
        Ok(&self.result)
    }

    pub fn result(&self) -> &FrameBuffer {
        &self.result
    }

    /// The background/live blend of the last frame, before the effect.
    pub fn merged(&self) -> &FrameBuffer {
        &self.merged
    }

    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame_counter
    }

    /// Forgets motion history so the next frame starts from a clean mask.
    pub fn reset_motion(&mut self) {
        self.motion.reset();
    }
}

fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    state = (state ^ (state >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    state = (state ^ (state >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    state ^ (state >> 31)
}
