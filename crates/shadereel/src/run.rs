use std::path::Path;

use anyhow::{bail, Context, Result};
use encoder::{EncodeConfig, EncodingPipeline};
use renderer::{compile, transpile, FrameSequencer, RenderSession, ShaderSource};
use tracing_subscriber::EnvFilter;

use crate::bootstrap::{load_job_file, resolve_plan, RunPlan};
use crate::cli::Cli;

pub fn run(cli: Cli) -> Result<()> {
    let file = load_job_file(&cli)?;
    let plan = resolve_plan(&cli, &file)?;

    let source = ShaderSource::load(&plan.shader)?;
    let canonical = transpile(&source);
    tracing::debug!(
        shader = %plan.shader.display(),
        inserted_output = canonical.inserted_output(),
        inserted_entry = canonical.inserted_entry(),
        "transpiled shader"
    );

    if cli.dump_canonical {
        print!("{}", canonical.text());
        return Ok(());
    }

    if let Some(path) = cli.still_export.as_deref() {
        return export_still(&plan, &canonical, path);
    }

    if plan.job.total_frames() == 0 {
        bail!(
            "duration {}s at {} fps produces no frames",
            plan.job.duration,
            plan.job.fps
        );
    }
    encoder::ensure_available(&plan.encoder_program)?;
    let pipeline = EncodingPipeline::new(
        EncodeConfig::new(
            plan.job.output.clone(),
            plan.job.width,
            plan.job.height,
            plan.job.fps,
        )
        .with_program(plan.encoder_program.clone())
        .with_log_level(plan.encoder_log_level.clone()),
    )?;

    let program = compile(&canonical)?;
    let mut session = RenderSession::for_job(&plan.job, &program, plan.gpu)?;
    tracing::info!(
        shader = %plan.shader.display(),
        output = %plan.job.output.display(),
        width = plan.job.width,
        height = plan.job.height,
        fps = plan.job.fps,
        frames = plan.job.total_frames(),
        adapter = session.adapter_name(),
        "rendering shader to video"
    );

    let summary = pipeline
        .run(FrameSequencer::for_job(&mut session, &plan.job))
        .with_context(|| format!("failed to render {}", plan.job.output.display()))?;

    tracing::info!(
        frames = summary.frames,
        bytes = summary.bytes,
        profile = %summary.profile,
        "video saved to {}",
        summary.output.display()
    );
    Ok(())
}

fn export_still(plan: &RunPlan, canonical: &renderer::CanonicalProgram, path: &Path) -> Result<()> {
    let program = compile(canonical)?;
    let mut session = RenderSession::for_job(&plan.job, &program, plan.gpu)?;
    session.export_still(plan.job.start_time as f32, path)?;
    tracing::info!(
        path = %path.display(),
        time = plan.job.start_time,
        "exported still frame"
    );
    Ok(())
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
