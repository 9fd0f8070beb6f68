use std::path::PathBuf;
use std::process::ExitStatus;

use renderer::RenderError;
use thiserror::Error;

/// Failures raised while turning rendered frames into a video file.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The encoder program could not be run at all.
    #[error("video encoder '{program}' is not available: {reason}")]
    Unavailable { program: String, reason: String },

    #[error("invalid encode configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start encoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write frame {frame} to the encoder: {source}")]
    Write {
        frame: u64,
        #[source]
        source: std::io::Error,
    },

    /// The encoder ran but exited unsuccessfully; `stderr` is its diagnostic
    /// output, trimmed.
    #[error("encoder exited with {status}: {stderr}")]
    Failure { status: ExitStatus, stderr: String },

    #[error("failed to prepare output {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl EncodeError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
