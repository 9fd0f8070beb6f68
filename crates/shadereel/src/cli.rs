use std::path::PathBuf;

use clap::Parser;
use renderer::GpuPowerPreference;

#[derive(Parser, Debug)]
#[command(
    name = "shadereel",
    author,
    version,
    about = "Render a GLSL fragment shader to a video file"
)]
pub struct Cli {
    /// Fragment shader source (`.frag`, `.glsl`). May come from `--config` instead.
    #[arg(value_name = "SHADER")]
    pub shader: Option<PathBuf>,

    /// Output video path; `.mov` selects ProRes, anything else H.264 (default: `<shader>.mp4`).
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Frame width in pixels (default: 1920).
    #[arg(short = 'W', long, value_name = "PIXELS", value_parser = parse_dimension)]
    pub width: Option<u32>,

    /// Frame height in pixels (default: 1080).
    #[arg(short = 'H', long, value_name = "PIXELS", value_parser = parse_dimension)]
    pub height: Option<u32>,

    /// Video length as seconds or a human-readable span like `1m30s` (default: 10).
    #[arg(short = 'd', long, value_name = "SECONDS", value_parser = parse_duration)]
    pub duration: Option<f64>,

    /// Frames per second (default: 30).
    #[arg(long, value_name = "FPS", value_parser = parse_fps)]
    pub fps: Option<u32>,

    /// Value of `u_time` on the first frame (default: 0).
    #[arg(long, value_name = "SECONDS", allow_negative_numbers = true, value_parser = parse_start)]
    pub start: Option<f64>,

    /// Job file (TOML) providing defaults for any of the flags above.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Encoder executable; can also be supplied via `SHADEREEL_FFMPEG`.
    #[arg(long, value_name = "PROGRAM", env = "SHADEREEL_FFMPEG")]
    pub ffmpeg: Option<String>,

    /// GPU adapter preference: `low` or `high`.
    #[arg(long, value_name = "low|high", value_parser = parse_gpu_power)]
    pub gpu_power: Option<GpuPowerPreference>,

    /// Render a single frame at the start time to this PNG and exit without encoding.
    #[arg(long, value_name = "PNG")]
    pub still_export: Option<PathBuf>,

    /// Print the generated shader program and exit.
    #[arg(long)]
    pub dump_canonical: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_dimension(value: &str) -> Result<u32, String> {
    let pixels: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid pixel count '{value}'"))?;
    if pixels == 0 {
        return Err("dimension must be greater than zero".to_string());
    }
    Ok(pixels)
}

fn parse_fps(value: &str) -> Result<u32, String> {
    let fps: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame rate '{value}'; expected a whole number"))?;
    if fps == 0 {
        return Err("fps must be greater than zero".to_string());
    }
    Ok(fps)
}

fn parse_duration(value: &str) -> Result<f64, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("duration must not be empty".to_string());
    }
    let seconds = match trimmed.parse::<f64>() {
        Ok(seconds) => seconds,
        Err(_) => humantime::parse_duration(trimmed)
            .map_err(|err| format!("invalid duration '{trimmed}': {err}"))?
            .as_secs_f64(),
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("duration must be non-negative (got {trimmed})"));
    }
    Ok(seconds)
}

fn parse_start(value: &str) -> Result<f64, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid start time '{value}'"))?;
    if !seconds.is_finite() {
        return Err("start time must be finite".to_string());
    }
    Ok(seconds)
}

fn parse_gpu_power(value: &str) -> Result<GpuPowerPreference, String> {
    value.parse()
}
