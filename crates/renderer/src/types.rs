use std::path::{Path, PathBuf};

use crate::error::RenderError;

/// Bytes per RGBA8 pixel in every buffer the renderer hands out.
pub const BYTES_PER_PIXEL: usize = 4;

/// Immutable description of one render: frame geometry, timing, and target.
///
/// `RenderJob` mirrors CLI flags (or a job file) and is validated once before
/// any GPU or encoder work begins.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderJob {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Length of the video in seconds.
    pub duration: f64,
    /// Output frame rate.
    pub fps: u32,
    /// Value of `u_time` for the first frame.
    pub start_time: f64,
    /// Destination video file; its extension selects the encoding profile.
    pub output: PathBuf,
}

impl RenderJob {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::invalid_job(format!(
                "dimensions must be greater than zero (got {}x{})",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(RenderError::invalid_job("fps must be greater than zero"));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(RenderError::invalid_job(format!(
                "duration must be a non-negative number of seconds (got {})",
                self.duration
            )));
        }
        if !self.start_time.is_finite() {
            return Err(RenderError::invalid_job("start time must be finite"));
        }
        Ok(())
    }

    /// Number of frames the job produces: `floor(duration * fps)`.
    pub fn total_frames(&self) -> u64 {
        (self.duration * f64::from(self.fps)).floor() as u64
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

pub(crate) fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// One rendered image: tightly packed RGBA8 rows, top row first.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RenderError> {
        let expected = frame_len(width, height);
        if data.len() != expected {
            return Err(RenderError::readback(format!(
                "pixel buffer holds {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A buffer with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(frame_len(width, height))
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row `y`, counted from the top of the image.
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = x as usize * BYTES_PER_PIXEL;
        let row = self.row(y);
        [row[offset], row[offset + 1], row[offset + 2], row[offset + 3]]
    }

    /// True when every pixel equals `rgba`.
    pub fn is_uniform(&self, rgba: [u8; 4]) -> bool {
        self.data
            .chunks_exact(BYTES_PER_PIXEL)
            .all(|pixel| pixel == rgba)
    }

    /// Writes the buffer as a PNG image.
    pub fn save_png(&self, path: &Path) -> Result<(), RenderError> {
        let image = image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| RenderError::Export {
                path: path.to_path_buf(),
                message: "pixel buffer does not match its dimensions".into(),
            })?;
        image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|err| RenderError::Export {
                path: path.to_path_buf(),
                message: err.to_string(),
            })
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Adapter selection hint forwarded to wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

impl std::fmt::Display for GpuPowerPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuPowerPreference::Low => f.write_str("low"),
            GpuPowerPreference::High => f.write_str("high"),
        }
    }
}

impl std::str::FromStr for GpuPowerPreference {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "low-power" | "integrated" => Ok(Self::Low),
            "high" | "high-performance" | "discrete" => Ok(Self::High),
            other => Err(format!("unknown gpu power preference '{other}'; expected low or high")),
        }
    }
}

/// Knobs for headless adapter selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpuOptions {
    pub power: GpuPowerPreference,
    /// Ask wgpu for a software adapter (useful on headless CI machines).
    pub force_fallback_adapter: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(duration: f64, fps: u32) -> RenderJob {
        RenderJob {
            width: 64,
            height: 32,
            duration,
            fps,
            start_time: 0.0,
            output: PathBuf::from("out.mp4"),
        }
    }

    #[test]
    fn total_frames_floors_duration_times_fps() {
        assert_eq!(job(2.0, 30).total_frames(), 60);
        assert_eq!(job(1.0, 10).total_frames(), 10);
        assert_eq!(job(0.55, 10).total_frames(), 5);
        assert_eq!(job(0.0, 24).total_frames(), 0);
    }

    #[test]
    fn validation_rejects_bad_jobs() {
        assert!(job(1.0, 30).validate().is_ok());
        assert!(job(0.0, 30).validate().is_ok());
        assert!(job(-1.0, 30).validate().is_err());
        assert!(job(f64::NAN, 30).validate().is_err());
        assert!(job(1.0, 0).validate().is_err());

        let mut zero_width = job(1.0, 30);
        zero_width.width = 0;
        assert!(zero_width.validate().is_err());

        let mut infinite_start = job(1.0, 30);
        infinite_start.start_time = f64::INFINITY;
        assert!(infinite_start.validate().is_err());
    }

    #[test]
    fn pixel_buffer_rejects_wrong_length() {
        assert!(PixelBuffer::new(2, 2, vec![0; 16]).is_ok());
        assert!(PixelBuffer::new(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn filled_buffer_is_uniform() {
        let buffer = PixelBuffer::filled(3, 2, [255, 0, 0, 255]);
        assert_eq!(buffer.len(), 3 * 2 * 4);
        assert!(buffer.is_uniform([255, 0, 0, 255]));
        assert_eq!(buffer.pixel(2, 1), [255, 0, 0, 255]);
    }

    #[test]
    fn rows_are_addressed_from_the_top() {
        let mut data = vec![0u8; 2 * 2 * 4];
        data[8..].copy_from_slice(&[9, 9, 9, 9, 9, 9, 9, 9]);
        let buffer = PixelBuffer::new(2, 2, data).unwrap();
        assert_eq!(buffer.row(0), &[0; 8]);
        assert_eq!(buffer.row(1), &[9; 8]);
    }

    #[test]
    fn saves_png_roundtrip_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        PixelBuffer::filled(4, 3, [0, 128, 255, 255])
            .save_png(&path)
            .unwrap();
        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(1, 1).0, [0, 128, 255, 255]);
    }

    #[test]
    fn parses_power_preference() {
        assert_eq!("low".parse::<GpuPowerPreference>(), Ok(GpuPowerPreference::Low));
        assert_eq!(" HIGH ".parse::<GpuPowerPreference>(), Ok(GpuPowerPreference::High));
        assert!("turbo".parse::<GpuPowerPreference>().is_err());
    }
}
