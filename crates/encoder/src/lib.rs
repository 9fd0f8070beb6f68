//! Video encoding for shadereel.
//!
//! Frames from the renderer are piped as raw RGBA into an external
//! ffmpeg-compatible program. Nothing is staged on disk; the only file written
//! is the one the encoder produces.

pub mod error;
pub mod ffmpeg;
pub mod pipeline;
pub mod profile;

pub use error::EncodeError;
pub use ffmpeg::{
    ensure_available, ensure_parent_dir, EncodeConfig, FfmpegEncoder, DEFAULT_LOG_LEVEL,
    DEFAULT_PROGRAM,
};
pub use pipeline::{EncodeSummary, EncodingPipeline};
pub use profile::{EncodingProfile, ProfileKind};
