use std::path::PathBuf;
use std::process::Command;
use synoid_fps::media::{ffmpeg_available, ffmpeg_bin, probe_video, FfmpegSink, FfmpegSource};
use synoid_fps::{CancelToken, EncodeConfig, FrameSource, Interpolator, InterpolatorConfig};

fn scratch(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("synoid_fps_{}_{}", std::process::id(), name));
    if path.exists() {
        std::fs::remove_file(&path).unwrap();
    }
    path
}

/// 1 second of testsrc at 10 fps.
fn make_clip(path: &PathBuf) {
    let out = Command::new(ffmpeg_bin())
        .args([
            "-y",
            "-f",
            "lavfi",
            "-i",
            "testsrc=duration=1:size=64x48:rate=10",
            "-c:v",
            "mpeg4",
            "-q:v",
            "2",
        ])
        .arg(path)
        .output()
        .expect("Failed to execute ffmpeg");

    if !out.status.success() {
        eprintln!("FFmpeg stderr: {}", String::from_utf8_lossy(&out.stderr));
        panic!("Failed to create test clip");
    }
}

#[tokio::test]
async fn test_convert_10_to_20_fps() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }

    let input = scratch("in.mp4");
    let output = scratch("out.mp4");
    make_clip(&input);

    let (src_path, dst_path) = (input.clone(), output.clone());
    let summary = tokio::task::spawn_blocking(move || {
        let mut source = FfmpegSource::open(&src_path).unwrap();
        let info = source.stream_info();
        assert_eq!((info.width, info.height), (64, 48));
        assert!((info.fps - 10.0).abs() < 1e-6);

        let config = InterpolatorConfig {
            encode: EncodeConfig {
                codec: "mpeg4".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let interp = Interpolator::new(&config).unwrap();
        let mut sink = FfmpegSink::create(&dst_path, 64, 48, 20.0, &config.encode).unwrap();
        interp
            .run(&mut source, &mut sink, 20.0, |_| {}, &CancelToken::new())
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(summary.input_frames, 10);
    assert_eq!(summary.output_frames, 19);

    let probed = probe_video(&output).expect("Failed to probe output");
    assert_eq!((probed.width, probed.height), (64, 48));
    assert!((probed.fps - 20.0).abs() < 1e-6, "fps = {}", probed.fps);
    assert_eq!(probed.frame_count, Some(19));

    let _ = std::fs::remove_file(input);
    let _ = std::fs::remove_file(output);
}

#[tokio::test]
async fn test_missing_input_is_reported() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }

    let missing = scratch("does_not_exist.mp4");
    let err = FfmpegSource::open(&missing).err().expect("open should fail");
    assert!(err.to_string().contains("does_not_exist"), "{:#}", err);
}
