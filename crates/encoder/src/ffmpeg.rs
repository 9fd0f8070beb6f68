use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use renderer::PixelBuffer;
use tracing::{debug, info, warn};

use crate::error::EncodeError;
use crate::profile::EncodingProfile;

pub const DEFAULT_PROGRAM: &str = "ffmpeg";
pub const DEFAULT_LOG_LEVEL: &str = "error";

/// Everything needed to launch one encoder process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub out_path: PathBuf,
    /// Executable name or path of the ffmpeg-compatible encoder.
    pub program: String,
    /// Value passed to `-loglevel`.
    pub log_level: String,
}

impl EncodeConfig {
    pub fn new(out_path: impl Into<PathBuf>, width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            out_path: out_path.into(),
            program: DEFAULT_PROGRAM.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }

    pub fn profile(&self) -> EncodingProfile {
        EncodingProfile::for_output(&self.out_path)
    }

    pub fn validate(&self) -> Result<(), EncodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(EncodeError::invalid_config(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(EncodeError::invalid_config("encode fps must be non-zero"));
        }
        if self.out_path.as_os_str().is_empty() {
            return Err(EncodeError::invalid_config("output path is empty"));
        }
        if self.program.trim().is_empty() {
            return Err(EncodeError::invalid_config("encoder program is empty"));
        }

        let profile = self.profile();
        if profile.requires_even_width() && self.width % 2 != 0 {
            return Err(EncodeError::invalid_config(format!(
                "width {} must be even for {}",
                self.width, profile.pixel_format
            )));
        }
        if profile.requires_even_height() && self.height % 2 != 0 {
            return Err(EncodeError::invalid_config(format!(
                "height {} must be even for {}",
                self.height, profile.pixel_format
            )));
        }
        Ok(())
    }

    /// Command-line arguments after the program name.
    pub fn args(&self) -> Vec<OsString> {
        let profile = self.profile();
        let size = format!("{}x{}", self.width, self.height);
        let fps = self.fps.to_string();
        let mut args: Vec<OsString> = [
            "-y",
            "-loglevel",
            self.log_level.as_str(),
            "-f",
            "rawvideo",
            "-pixel_format",
            "rgba",
            "-video_size",
            size.as_str(),
            "-framerate",
            fps.as_str(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            profile.codec,
            "-pix_fmt",
            profile.pixel_format,
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.extend(profile.codec_args.iter().map(OsString::from));
        args.push(self.out_path.clone().into_os_string());
        args
    }
}

/// Runs `<program> -version` to confirm the encoder can be launched.
pub fn ensure_available(program: &str) -> Result<(), EncodeError> {
    let status = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|err| EncodeError::Unavailable {
            program: program.to_string(),
            reason: err.to_string(),
        })?;
    if !status.success() {
        return Err(EncodeError::Unavailable {
            program: program.to_string(),
            reason: format!("`{program} -version` exited with {status}"),
        });
    }
    Ok(())
}

pub fn ensure_parent_dir(path: &Path) -> Result<(), EncodeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| EncodeError::Output {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// A running encoder fed raw RGBA frames through its stdin.
///
/// Writes block when the encoder falls behind. The child is always reaped:
/// by [`finish`](Self::finish), by [`abort`](Self::abort), or on drop.
pub struct FfmpegEncoder {
    config: EncodeConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    frames_written: u64,
    reaped: bool,
}

impl FfmpegEncoder {
    pub fn spawn(config: EncodeConfig) -> Result<Self, EncodeError> {
        config.validate()?;
        ensure_parent_dir(&config.out_path)?;

        let args = config.args();
        debug!(program = %config.program, ?args, "spawning encoder");

        let mut child = Command::new(&config.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EncodeError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).trim().to_string()
            })
        });

        info!(
            output = %config.out_path.display(),
            profile = %config.profile(),
            "encoder started"
        );

        Ok(Self {
            config,
            child,
            stdin,
            stderr,
            frames_written: 0,
            reaped: false,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Appends one frame to the video.
    pub fn write_frame(&mut self, frame: &PixelBuffer) -> Result<(), EncodeError> {
        if frame.width() != self.config.width || frame.height() != self.config.height {
            return Err(EncodeError::invalid_config(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.config.width,
                self.config.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(EncodeError::Write {
                frame: self.frames_written,
                source: io::Error::new(io::ErrorKind::BrokenPipe, "encoder input already closed"),
            });
        };

        if let Err(source) = stdin.write_all(frame.as_bytes()) {
            let frame = self.frames_written;
            if source.kind() == io::ErrorKind::BrokenPipe {
                // The encoder quit early; its exit status and stderr say why.
                let (status, stderr) = self.reap()?;
                if !status.success() {
                    return Err(EncodeError::Failure { status, stderr });
                }
            }
            return Err(EncodeError::Write { frame, source });
        }

        self.frames_written += 1;
        Ok(())
    }

    /// Closes the input stream and waits for the encoder to finalize the file.
    pub fn finish(mut self) -> Result<(), EncodeError> {
        let (status, stderr) = self.reap()?;
        if !status.success() {
            return Err(EncodeError::Failure { status, stderr });
        }
        if !stderr.is_empty() {
            warn!(stderr = %stderr, "encoder reported diagnostics");
        }
        debug!(frames = self.frames_written, "encoder finished");
        Ok(())
    }

    /// Stops the encoder without finalizing the output.
    pub fn abort(mut self) {
        self.kill();
    }

    fn reap(&mut self) -> Result<(ExitStatus, String), EncodeError> {
        drop(self.stdin.take());
        let status = self.child.wait().map_err(|source| EncodeError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;
        self.reaped = true;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        Ok((status, stderr))
    }

    fn kill(&mut self) {
        if self.reaped {
            return;
        }
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
        if let Some(handle) = self.stderr.take() {
            let _ = handle.join();
        }
        debug!(frames = self.frames_written, "encoder killed");
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: u32, height: u32, out: &str) -> EncodeConfig {
        EncodeConfig::new(out, width, height, 30)
    }

    #[test]
    fn validation_catches_bad_values() {
        assert!(config(640, 360, "out.mp4").validate().is_ok());
        assert!(config(0, 10, "out.mp4").validate().is_err());
        assert!(config(11, 10, "out.mp4").validate().is_err());
        assert!(config(10, 11, "out.mp4").validate().is_err());
        assert!(EncodeConfig::new("out.mp4", 10, 10, 0).validate().is_err());
        assert!(config(10, 10, "").validate().is_err());
        assert!(config(10, 10, "out.mp4").with_program(" ").validate().is_err());
    }

    #[test]
    fn prores_allows_odd_height_but_not_odd_width() {
        assert!(config(10, 11, "out.mov").validate().is_ok());
        assert!(config(11, 10, "out.mov").validate().is_err());
    }

    #[test]
    fn args_describe_raw_rgba_input_and_profile() {
        let args: Vec<String> = config(64, 32, "clips/out.mp4")
            .args()
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        let joined = args.join(" ");
        assert!(joined.starts_with("-y -loglevel error -f rawvideo -pixel_format rgba"));
        assert!(joined.contains("-video_size 64x32 -framerate 30 -i pipe:0 -an"));
        assert!(joined.contains("-c:v libx264 -pix_fmt yuv420p -crf 18 -preset medium"));
        assert_eq!(args.last().map(String::as_str), Some("clips/out.mp4"));
    }

    #[test]
    fn mov_args_select_prores_hq() {
        let joined = config(64, 32, "out.MOV")
            .args()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        assert!(joined.contains("-c:v prores_ks -pix_fmt yuv422p10le -profile:v 3"));
        assert!(!joined.contains("faststart"));
    }

    #[test]
    fn missing_program_is_unavailable() {
        let err = ensure_available("shadereel-no-such-encoder").unwrap_err();
        assert!(matches!(err, EncodeError::Unavailable { .. }));
    }

    #[test]
    fn parent_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a/b/out.mp4");
        ensure_parent_dir(&out).unwrap();
        assert!(dir.path().join("a/b").is_dir());
        ensure_parent_dir(Path::new("bare.mp4")).unwrap();
    }
}
