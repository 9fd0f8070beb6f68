use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while preparing or driving a render job.
///
/// Every variant is terminal for the job; callers are expected to report the
/// error and exit rather than retry.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("shader file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("failed to read shader at {}: {source}", path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid render job: {0}")]
    InvalidJob(String),

    /// The canonical program failed to compile. `canonical_source` carries the
    /// generated text with line numbers so compiler positions can be matched
    /// against it rather than against the user's file.
    #[error("shader compilation failed:\n{message}\n--- generated shader ---\n{canonical_source}")]
    ShaderCompile {
        message: String,
        canonical_source: String,
    },

    #[error("no gpu adapter available: {0}")]
    NoAdapter(String),

    #[error("gpu device error: {0}")]
    Device(String),

    #[error("frame readback failed: {0}")]
    Readback(String),

    #[error("failed to export still frame to {}: {message}", path.display())]
    Export { path: PathBuf, message: String },
}

impl RenderError {
    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    pub fn readback(msg: impl Into<String>) -> Self {
        Self::Readback(msg.into())
    }

    pub fn is_shader_compile(&self) -> bool {
        matches!(self, Self::ShaderCompile { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_display_includes_generated_source() {
        let err = RenderError::ShaderCompile {
            message: "expected ';'".into(),
            canonical_source: "   1 | #version 450".into(),
        };
        let text = err.to_string();
        assert!(text.contains("expected ';'"));
        assert!(text.contains("#version 450"));
        assert!(err.is_shader_compile());
    }

    #[test]
    fn input_not_found_names_the_path() {
        let err = RenderError::InputNotFound(PathBuf::from("missing.frag"));
        assert!(err.to_string().contains("missing.frag"));
        assert!(!err.is_shader_compile());
    }
}
