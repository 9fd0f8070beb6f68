use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use jobconfig::{GpuPower, JobConfig};
use renderer::{GpuOptions, GpuPowerPreference, RenderJob};

use crate::cli::Cli;

pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;
pub const DEFAULT_DURATION_SECS: f64 = 10.0;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_START_SECS: f64 = 0.0;

/// Everything a run needs once flags, job file, and defaults are merged.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub shader: PathBuf,
    pub job: RenderJob,
    pub encoder_program: String,
    pub encoder_log_level: String,
    pub gpu: GpuOptions,
}

/// Loads the job file named by `--config`, if any.
pub fn load_job_file(cli: &Cli) -> Result<JobConfig> {
    match &cli.config {
        Some(path) => JobConfig::load(path)
            .with_context(|| format!("failed to load job file {}", path.display())),
        None => Ok(JobConfig::default()),
    }
}

/// Merges flags over job-file values over built-in defaults.
pub fn resolve_plan(cli: &Cli, file: &JobConfig) -> Result<RunPlan> {
    let Some(shader) = cli.shader.clone().or_else(|| file.shader.clone()) else {
        bail!("no shader given; pass a SHADER path or set `shader` in the job file");
    };

    let output = cli
        .output
        .clone()
        .or_else(|| file.output.clone())
        .unwrap_or_else(|| default_output(&shader));

    let job = RenderJob {
        width: cli.width.or(file.width).unwrap_or(DEFAULT_WIDTH),
        height: cli.height.or(file.height).unwrap_or(DEFAULT_HEIGHT),
        duration: cli
            .duration
            .or_else(|| file.duration_secs())
            .unwrap_or(DEFAULT_DURATION_SECS),
        fps: cli.fps.or(file.fps).unwrap_or(DEFAULT_FPS),
        start_time: cli.start.or(file.start).unwrap_or(DEFAULT_START_SECS),
        output,
    };
    job.validate().context("invalid render settings")?;

    let power = cli
        .gpu_power
        .or_else(|| file.gpu.power.map(map_gpu_power))
        .unwrap_or_default();

    Ok(RunPlan {
        shader,
        job,
        encoder_program: cli
            .ffmpeg
            .clone()
            .or_else(|| file.encoder.program.clone())
            .unwrap_or_else(|| encoder::DEFAULT_PROGRAM.to_string()),
        encoder_log_level: file
            .encoder
            .log_level
            .clone()
            .unwrap_or_else(|| encoder::DEFAULT_LOG_LEVEL.to_string()),
        gpu: GpuOptions {
            power,
            ..GpuOptions::default()
        },
    })
}

/// `<shader stem>.mp4` in the working directory.
pub fn default_output(shader: &Path) -> PathBuf {
    let stem = shader
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_else(|| "output".into());
    let mut name = stem;
    name.push(".mp4");
    PathBuf::from(name)
}

fn map_gpu_power(power: GpuPower) -> GpuPowerPreference {
    match power {
        GpuPower::Low => GpuPowerPreference::Low,
        GpuPower::High => GpuPowerPreference::High,
    }
}
