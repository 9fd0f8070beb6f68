use std::path::{Path, PathBuf};

use encoder::{ensure_available, EncodeConfig, EncodeError, EncodingPipeline, ProfileKind};
use renderer::{Frame, PixelBuffer, RenderError, RenderedFrame};

fn frame(index: u64, width: u32, height: u32) -> Result<RenderedFrame, RenderError> {
    Ok(RenderedFrame {
        frame: Frame {
            index,
            time: index as f64 / 10.0,
        },
        pixels: PixelBuffer::filled(width, height, [index as u8, 0, 0, 255]),
    })
}

/// Writes an executable shell script standing in for ffmpeg.
///
/// `body` runs with `$out` bound to the last argument (the output path).
#[cfg(unix)]
fn fake_encoder(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then echo fake; exit 0; fi\nfor out; do :; done\n{body}\n"
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn frames_reach_the_encoder_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let program = fake_encoder(dir.path(), "cat-encoder", "cat > \"$out\"");
    let output = dir.path().join("clip.mp4");

    let config = EncodeConfig::new(&output, 4, 2, 10).with_program(program.to_string_lossy());
    let summary = EncodingPipeline::new(config)
        .unwrap()
        .run((0..3).map(|i| frame(i, 4, 2)))
        .unwrap();

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.bytes, 3 * 4 * 2 * 4);
    assert_eq!(summary.profile.kind, ProfileKind::Delivery);

    let written = std::fs::read(&output).unwrap();
    for (i, chunk) in written.chunks_exact(4 * 2 * 4).enumerate() {
        assert!(chunk.chunks_exact(4).all(|px| px == [i as u8, 0, 0, 255]));
    }
}

#[cfg(unix)]
#[test]
fn encoder_failure_reports_stderr_and_removes_output() {
    let dir = tempfile::tempdir().unwrap();
    let program = fake_encoder(
        dir.path(),
        "broken-encoder",
        "echo partial > \"$out\"\necho 'Unknown encoder libx264' >&2\nexit 3",
    );
    let output = dir.path().join("clip.mp4");

    let config = EncodeConfig::new(&output, 4, 2, 10).with_program(program.to_string_lossy());
    let err = EncodingPipeline::new(config)
        .unwrap()
        .run((0..2).map(|i| frame(i, 4, 2)))
        .unwrap_err();

    match err {
        EncodeError::Failure { status, stderr } => {
            assert_eq!(status.code(), Some(3));
            assert!(stderr.contains("Unknown encoder libx264"), "{stderr}");
        }
        other => panic!("expected encoder failure, got {other}"),
    }
    assert!(!output.exists());
}

#[cfg(unix)]
#[test]
fn render_error_aborts_and_removes_output() {
    let dir = tempfile::tempdir().unwrap();
    let program = fake_encoder(dir.path(), "cat-encoder", "cat > \"$out\"");
    let output = dir.path().join("clip.mp4");

    let frames = vec![
        frame(0, 4, 2),
        frame(1, 4, 2),
        Err(RenderError::device("device lost")),
        frame(3, 4, 2),
    ];
    let config = EncodeConfig::new(&output, 4, 2, 10).with_program(program.to_string_lossy());
    let err = EncodingPipeline::new(config).unwrap().run(frames).unwrap_err();

    assert!(matches!(err, EncodeError::Render(RenderError::Device(_))));
    assert!(!output.exists());
}

#[test]
fn odd_dimensions_are_rejected_before_spawning() {
    let err = EncodingPipeline::new(EncodeConfig::new("clip.mp4", 65, 64, 30)).unwrap_err();
    assert!(matches!(err, EncodeError::InvalidConfig(_)));
}

#[test]
fn spawn_failure_names_the_program() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");
    let config = EncodeConfig::new(&output, 4, 2, 10).with_program("shadereel-missing-encoder");
    let err = EncodingPipeline::new(config)
        .unwrap()
        .run((0..1).map(|i| frame(i, 4, 2)))
        .unwrap_err();
    assert!(matches!(err, EncodeError::Spawn { .. }));
    assert!(err.to_string().contains("shadereel-missing-encoder"));
}

#[test]
fn failed_start_leaves_existing_output_alone() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("keep.mp4");
    std::fs::write(&output, "previous render").unwrap();

    let config = EncodeConfig::new(&output, 4, 2, 10).with_program("shadereel-missing-encoder");
    let err = EncodingPipeline::new(config)
        .unwrap()
        .run((0..2).map(|i| frame(i, 4, 2)))
        .unwrap_err();

    assert!(matches!(err, EncodeError::Spawn { .. }));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous render");
}

#[cfg(unix)]
#[test]
fn started_encoder_failure_replaces_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let program = fake_encoder(
        dir.path(),
        "broken-encoder",
        "echo partial > \"$out\"\nexit 1",
    );
    let output = dir.path().join("clip.mp4");
    std::fs::write(&output, "previous render").unwrap();

    let config = EncodeConfig::new(&output, 4, 2, 10).with_program(program.to_string_lossy());
    let err = EncodingPipeline::new(config)
        .unwrap()
        .run((0..2).map(|i| frame(i, 4, 2)))
        .unwrap_err();

    assert!(matches!(err, EncodeError::Failure { .. }));
    assert!(!output.exists());
}

#[test]
fn real_ffmpeg_produces_a_video() {
    if ensure_available("ffmpeg").is_err() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("red.mp4");
    let frames = (0..10).map(|index| {
        Ok(RenderedFrame {
            frame: Frame {
                index,
                time: index as f64 / 10.0,
            },
            pixels: PixelBuffer::filled(64, 64, [255, 0, 0, 255]),
        })
    });

    let summary = EncodingPipeline::new(EncodeConfig::new(&output, 64, 64, 10))
        .unwrap()
        .run(frames)
        .unwrap();

    assert_eq!(summary.frames, 10);
    assert!(summary.bytes > 0);
    assert!(output.is_file());
}
