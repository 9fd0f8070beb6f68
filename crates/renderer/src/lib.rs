//! Offscreen renderer for shadereel.
//!
//! Turns a WebGL-flavoured fragment shader into a stream of RGBA frames. The
//! crate never touches a window or an encoder; it hands pixel buffers to
//! whoever drives the [`FrameSequencer`]. The overall flow is:
//!
//! ```text
//!   ShaderSource::load
//!          │ raw GLSL
//!          ▼
//!   transpile() ──▶ CanonicalProgram ──▶ compile() ──▶ CompiledProgram
//!                                                          │
//!   RenderJob ──▶ FrameSchedule                            ▼
//!                      │                           RenderSession (wgpu)
//!                      └──▶ FrameSequencer ──draw_frame(t)──┘
//!                                 │
//!                                 └─▶ RenderedFrame { frame, pixels } ...
//! ```
//!
//! Compilation runs on the CPU through naga before any adapter is requested,
//! so shader mistakes surface without a GPU and before an encoder starts.

pub mod compile;
pub mod error;
pub mod gpu;
pub mod sequence;
pub mod transpile;
pub mod types;

pub use compile::{compile, CompiledProgram, UniformUsage};
pub use error::RenderError;
pub use gpu::{RenderSession, DEFAULT_MOUSE};
pub use sequence::{
    Frame, FrameRenderer, FrameSchedule, FrameSequencer, ProgressReporter, RenderedFrame,
};
pub use transpile::{
    transpile, CanonicalProgram, ShaderSource, StandardUniform, LEGACY_OUTPUT_IDENT, OUTPUT_IDENT,
};
pub use types::{
    GpuOptions, GpuPowerPreference, PixelBuffer, RenderJob, BYTES_PER_PIXEL,
};
