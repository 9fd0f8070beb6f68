use std::path::{Path, PathBuf};

use renderer::{RenderError, RenderedFrame};
use tracing::{info, warn};

use crate::error::EncodeError;
use crate::ffmpeg::{EncodeConfig, FfmpegEncoder};
use crate::profile::EncodingProfile;

/// Outcome of a completed encode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeSummary {
    pub frames: u64,
    /// Size of the finished output file.
    pub bytes: u64,
    pub profile: EncodingProfile,
    pub output: PathBuf,
}

/// Streams rendered frames, in order, into one encoder process.
#[derive(Clone, Debug)]
pub struct EncodingPipeline {
    config: EncodeConfig,
}

impl EncodingPipeline {
    pub fn new(config: EncodeConfig) -> Result<Self, EncodeError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Encodes every frame from `frames` and finalizes the file.
    ///
    /// The first render or encoder error stops the run. Once the encoder has
    /// started, whatever it wrote to the output path is removed on failure; a
    /// failed start leaves any existing file alone.
    pub fn run<I>(&self, frames: I) -> Result<EncodeSummary, EncodeError>
    where
        I: IntoIterator<Item = Result<RenderedFrame, RenderError>>,
    {
        let output = self.config.out_path.clone();
        let encoder = FfmpegEncoder::spawn(self.config.clone())?;
        match feed(encoder, frames) {
            Ok(frames) => {
                let bytes = std::fs::metadata(&output)
                    .map(|meta| meta.len())
                    .unwrap_or_default();
                let summary = EncodeSummary {
                    frames,
                    bytes,
                    profile: self.config.profile(),
                    output,
                };
                info!(
                    frames = summary.frames,
                    bytes = summary.bytes,
                    output = %summary.output.display(),
                    "encode complete"
                );
                Ok(summary)
            }
            Err(err) => {
                discard_partial_output(&output);
                Err(err)
            }
        }
    }
}

fn feed<I>(mut encoder: FfmpegEncoder, frames: I) -> Result<u64, EncodeError>
where
    I: IntoIterator<Item = Result<RenderedFrame, RenderError>>,
{
    for item in frames {
        let rendered = match item {
            Ok(rendered) => rendered,
            Err(err) => {
                encoder.abort();
                return Err(err.into());
            }
        };
        debug_assert_eq!(rendered.frame.index, encoder.frames_written());
        encoder.write_frame(&rendered.pixels)?;
    }
    let frames = encoder.frames_written();
    encoder.finish()?;
    Ok(frames)
}

fn discard_partial_output(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => info!(path = %path.display(), "removed partial output"),
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove partial output"),
    }
}
