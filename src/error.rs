use crate::core_modules::frame::frame::Dimensions;

/// Every failure the engine can report at its public boundary.
#[derive(Debug, thiserror::Error)]
pub enum GlitchError {
    /// A live frame arrived whose size differs from the background buffer.
    #[error("frame is {found} but the background is {expected}")]
    DimensionMismatch {
        expected: Dimensions,
        found: Dimensions,
    },
    /// A raw byte buffer cannot be interpreted as a frame of the given size.
    #[error("{width}x{height} frame needs {expected} bytes, got {found}")]
    BufferLength {
        width: u32,
        height: u32,
        expected: usize,
        found: usize,
    },
    #[error("unknown effect `{0}`")]
    UnknownEffect(String),
    /// The session task has stopped and no longer accepts frames.
    #[error("glitch session is closed")]
    SessionClosed,
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
