// THEORY:
// This file is the main entry point for the `glitch_engine` library crate.
// The public surface is deliberately small: `GlitchPipeline` (one frame in, one
// glitched frame out), `Session` (the same pipeline behind async channels) and
// the `Effect` selector. The pixel machinery in `core_modules` is public for
// callers that want to drive a single stage directly, but a typical consumer
// never needs to reach past `pipeline` and `session`.

pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod session;

pub use crate::core_modules::frame::frame::{Dimensions, FrameBuffer};
pub use crate::error::GlitchError;
pub use crate::pipeline::{Effect, FrameReport, GlitchPipeline, PipelineConfig};
pub use crate::session::{ProcessedFrame, Session, SessionHandle};
