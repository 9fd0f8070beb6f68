use std::path::PathBuf;

use renderer::{
    compile, transpile, FrameSequencer, GpuOptions, RenderError, RenderJob, RenderSession,
    ShaderSource,
};

const SOLID_RED: &str = "void main() { gl_FragColor = vec4(1.0, 0.0, 0.0, 1.0); }";

const VERTICAL_GRADIENT: &str = r#"
precision mediump float;
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    float v = fragCoord.y / u_resolution.y;
    fragColor = vec4(v, v, v, 1.0);
}
"#;

/// Opens a session, or returns `None` on machines without any usable adapter.
fn session(source: &str, width: u32, height: u32) -> Option<RenderSession> {
    let canonical = transpile(&ShaderSource::from_text(source));
    let program = compile(&canonical).expect("shader should compile");
    let options = GpuOptions {
        force_fallback_adapter: false,
        ..GpuOptions::default()
    };
    match RenderSession::new(width, height, &program, options) {
        Ok(session) => Some(session),
        Err(RenderError::NoAdapter(reason)) => {
            eprintln!("skipping: no gpu adapter available ({reason})");
            None
        }
        Err(err) => panic!("failed to open render session: {err}"),
    }
}

fn job(width: u32, height: u32, duration: f64, fps: u32) -> RenderJob {
    RenderJob {
        width,
        height,
        duration,
        fps,
        start_time: 0.0,
        output: PathBuf::from("unused.mp4"),
    }
}

#[test]
fn frame_has_width_times_height_rgba_bytes() {
    let Some(mut session) = session(SOLID_RED, 37, 19) else {
        return;
    };
    let frame = session.draw_frame(0.0).unwrap();
    assert_eq!(frame.len(), 37 * 19 * 4);
    assert_eq!((frame.width(), frame.height()), (37, 19));
}

#[test]
fn solid_red_job_yields_identical_frames() {
    let Some(mut session) = session(SOLID_RED, 64, 64) else {
        return;
    };
    let frames: Vec<_> = FrameSequencer::for_job(&mut session, &job(64, 64, 1.0, 10))
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(frames.len(), 10);
    for rendered in &frames {
        assert!(
            rendered.pixels.is_uniform([255, 0, 0, 255]),
            "frame {} is not solid red",
            rendered.frame.index
        );
    }
}

/// Rows follow GL's bottom-left origin: `fragCoord.y` grows toward the top of
/// the delivered image.
#[test]
fn vertical_gradient_follows_gl_bottom_left_origin() {
    let Some(mut session) = session(VERTICAL_GRADIENT, 16, 64) else {
        return;
    };
    let frame = session.draw_frame(0.0).unwrap();
    let top = frame.pixel(8, 0)[0];
    let bottom = frame.pixel(8, 63)[0];
    assert!(top > bottom, "top={top} bottom={bottom}");
}

#[test]
fn time_uniform_reaches_the_shader() {
    let source = "void main() { gl_FragColor = vec4(fract(u_time), 0.0, 0.0, 1.0); }";
    let Some(mut session) = session(source, 8, 8) else {
        return;
    };
    let early = session.draw_frame(0.0).unwrap().pixel(0, 0)[0];
    let late = session.draw_frame(0.5).unwrap().pixel(0, 0)[0];
    assert_eq!(early, 0);
    assert!((120..=135).contains(&late), "late={late}");
}

#[test]
fn export_still_writes_png() {
    let Some(mut session) = session(SOLID_RED, 8, 6) else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("still.png");
    session.export_still(0.0, &path).unwrap();
    assert!(path.is_file());
}

#[test]
fn compile_errors_surface_before_any_gpu_work() {
    let canonical = transpile(&ShaderSource::from_text("void main() { gl_FragColor = vec4(1.0 }"));
    let err = compile(&canonical).unwrap_err();
    assert!(err.is_shader_compile());
    assert!(err.to_string().contains("--- generated shader ---"));
}
