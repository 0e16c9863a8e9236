// SYNOID ffmpeg Frame Sink
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Pipes raw rgb24 frames into an ffmpeg encoder at the output rate.

use crate::config::EncodeConfig;
use crate::engine::SynoidFrame;
use crate::engine::sequencer::FrameSink;
use crate::error::BoxError;
use crate::media::{ffmpeg_bin, StderrTail};
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use tracing::{info, warn};

pub struct FfmpegSink {
    path: PathBuf,
    width: u32,
    height: u32,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: StderrTail,
    frames: u64,
    finalized: bool,
}

impl FfmpegSink {
    /// Start an encoder writing `width`x`height` frames at `fps` to `path`.
    /// An existing file at `path` is overwritten.
    pub fn create(path: &Path, width: u32, height: u32, fps: f64, encode: &EncodeConfig) -> Result<Self> {
        let mut cmd = Command::new(ffmpeg_bin());
        cmd.args(["-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s")
            .arg(format!("{}x{}", width, height))
            .arg("-framerate")
            .arg(fps.to_string())
            .args(["-i", "-", "-an"])
            .args(encoder_args(encode))
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Spawning {} to encode {}", ffmpeg_bin(), path.display()))?;
        let stdin = child.stdin.take();
        let stderr = StderrTail::spawn(child.stderr.take());

        info!(
            "[FFMPEG] Encoding {}x{} @ {} fps -> {} ({})",
            width,
            height,
            fps,
            path.display(),
            encode.codec
        );

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            child,
            stdin,
            stderr,
            frames: 0,
            finalized: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    fn write_frame(&mut self, frame: &SynoidFrame) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(anyhow!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("encoder input already closed"))?;
        if let Err(e) = stdin.write_all(frame.as_bytes()) {
            // Broken pipe: the encoder died; its stderr says why.
            self.stdin = None;
            let _ = self.child.wait();
            return Err(anyhow!(
                "writing frame {} to encoder: {}: {}",
                self.frames,
                e,
                self.stderr.finish()
            ));
        }
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }

        let status = close_encoder(self.stdin.take(), &mut self.child);
        self.finalized = true;
        let status = status?;
        if !status.success() {
            return Err(anyhow!(
                "ffmpeg encoder exited with {}: {}",
                status,
                self.stderr.finish()
            ));
        }
        info!(
            "[FFMPEG] Wrote {} frames to {}",
            self.frames,
            self.path.display()
        );
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn write(&mut self, frame: &SynoidFrame) -> std::result::Result<(), BoxError> {
        self.write_frame(frame).map_err(Into::into)
    }

    fn finalize(&mut self) -> std::result::Result<(), BoxError> {
        self.finish().map_err(Into::into)
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if !self.finalized {
            warn!(
                "[FFMPEG] Encoder for {} dropped before finalize; output is incomplete",
                self.path.display()
            );
            self.stdin = None;
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Close the encoder's input and reap it. The child is waited on even when
/// the final flush fails, so no encoder outlives its sink.
fn close_encoder<W: Write>(stdin: Option<W>, child: &mut Child) -> Result<ExitStatus> {
    let flushed = match stdin {
        Some(mut pipe) => pipe.flush(),
        None => Ok(()),
    };
    let status = child.wait().context("Waiting for ffmpeg encoder")?;
    flushed.context("Flushing encoder input")?;
    Ok(status)
}

/// Codec arguments. Preset and CRF only apply to the x264/x265 family.
fn encoder_args(encode: &EncodeConfig) -> Vec<String> {
    let mut args = vec!["-c:v".to_string(), encode.codec.clone()];
    if matches!(encode.codec.as_str(), "libx264" | "libx265") {
        args.extend([
            "-preset".to_string(),
            encode.preset.clone(),
            "-crf".to_string(),
            encode.crf.to_string(),
        ]);
    }
    if !encode.pix_fmt.is_empty() {
        args.extend(["-pix_fmt".to_string(), encode.pix_fmt.clone()]);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x264_args() {
        let args = encoder_args(&EncodeConfig::default());
        assert_eq!(
            args,
            ["-c:v", "libx264", "-preset", "medium", "-crf", "18", "-pix_fmt", "yuv420p"]
        );
    }

    #[cfg(unix)]
    struct BrokenPipe;

    #[cfg(unix)]
    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "encoder gone"))
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_flush_still_reaps_encoder() {
        let mut child = Command::new("true").spawn().unwrap();
        let err = close_encoder(Some(BrokenPipe), &mut child).unwrap_err();
        assert!(format!("{:#}", err).contains("encoder gone"));
        // Already waited on: the exit status is cached.
        assert!(child.try_wait().unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_close_returns_status() {
        let mut child = Command::new("true").spawn().unwrap();
        let status = close_encoder(None::<BrokenPipe>, &mut child).unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_other_codecs_skip_x264_options() {
        let encode = EncodeConfig {
            codec: "mpeg4".into(),
            pix_fmt: String::new(),
            ..Default::default()
        };
        assert_eq!(encoder_args(&encode), ["-c:v", "mpeg4"]);
    }
}
