//! Headless GPU rendering for one render job.
//!
//! The pieces mirror the lifetime of a job:
//! - `context` owns the wgpu instance/adapter/device wiring without any
//!   window surface.
//! - `pipeline` turns a compiled fragment program plus the fixed vertex shader
//!   into a fullscreen triangle-strip pipeline.
//! - `uniforms` owns one small buffer per standard uniform and only writes the
//!   ones the program reads.
//! - `readback` copies the offscreen target into mappable memory, strips row
//!   padding, and flips rows into top-first order.
//! - `session` glues everything together behind `RenderSession::draw_frame`.

mod context;
mod pipeline;
mod readback;
mod session;
mod uniforms;

pub use session::RenderSession;
pub use uniforms::DEFAULT_MOUSE;
