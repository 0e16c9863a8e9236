// SYNOID ffmpeg Frame Source
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Decodes any ffmpeg-readable video to raw rgb24 on a pipe and slices it
// into frames of width * height * 3 bytes.

use crate::engine::sequencer::{FrameSource, StreamInfo};
use crate::engine::SynoidFrame;
use crate::error::BoxError;
use crate::media::{ffmpeg_bin, probe_video, StderrTail};
use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, info};

pub struct FfmpegSource {
    path: PathBuf,
    info: StreamInfo,
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: StderrTail,
    frame_size: usize,
    next_index: u64,
}

impl FfmpegSource {
    /// Probe `path` and start decoding it.
    pub fn open(path: &Path) -> Result<Self> {
        let info = probe_video(path)?;
        Self::with_info(path, info)
    }

    /// Start decoding with stream info the caller already has.
    pub fn with_info(path: &Path, info: StreamInfo) -> Result<Self> {
        if info.width == 0 || info.height == 0 {
            return Err(anyhow!(
                "{} reports an empty frame size {}x{}",
                path.display(),
                info.width,
                info.height
            ));
        }

        let mut child = Command::new(ffmpeg_bin())
            .args(decoder_args(path, &info))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Spawning {} to decode {}", ffmpeg_bin(), path.display()))?;

        let stdout = child.stdout.take();
        let stderr = StderrTail::spawn(child.stderr.take());

        info!(
            "[FFMPEG] Decoding {} ({}x{} @ {:.3} fps, {} frames)",
            path.display(),
            info.width,
            info.height,
            info.fps,
            info.frame_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".into())
        );

        Ok(Self {
            path: path.to_path_buf(),
            frame_size: info.width as usize * info.height as usize * 3,
            info,
            child,
            stdout,
            stderr,
            next_index: 0,
        })
    }

    fn read_frame(&mut self) -> Result<Option<SynoidFrame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.frame_size];
        let filled = read_full(stdout, &mut buf)
            .with_context(|| format!("Reading frame {} of {}", self.next_index, self.path.display()))?;

        if filled == 0 {
            self.stdout = None;
            let status = self.child.wait().context("Waiting for ffmpeg decoder")?;
            if !status.success() {
                return Err(anyhow!(
                    "ffmpeg decoder exited with {} after {} frames: {}",
                    status,
                    self.next_index,
                    self.stderr.finish()
                ));
            }
            debug!("[FFMPEG] End of stream after {} frames", self.next_index);
            return Ok(None);
        }

        if filled < self.frame_size {
            self.stdout = None;
            let _ = self.child.wait();
            return Err(anyhow!(
                "partial frame {} ({} of {} bytes): {}",
                self.next_index,
                filled,
                self.frame_size,
                self.stderr.finish()
            ));
        }

        let image = RgbImage::from_raw(self.info.width, self.info.height, buf)
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.info.width, self.info.height))?;
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(SynoidFrame::original(
            image,
            index,
            index as f64 / self.info.fps,
        )))
    }
}

impl FrameSource for FfmpegSource {
    fn stream_info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> std::result::Result<Option<SynoidFrame>, BoxError> {
        self.read_frame().map_err(Into::into)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if self.stdout.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Decode arguments. Rotation metadata is ignored and the output size is
/// pinned to the probed geometry, so every frame is exactly `width*height*3`
/// bytes laid out as the probe reported.
fn decoder_args(path: &Path, info: &StreamInfo) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-noautorotate", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(
        [
            "-an".to_string(),
            "-s".to_string(),
            format!("{}x{}", info.width, info.height),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-".to_string(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args
}

/// Fill `buf` as far as the reader allows. Returns bytes read; fewer than
/// `buf.len()` means the stream ended.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
