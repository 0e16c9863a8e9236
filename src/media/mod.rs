// SYNOID Media Adapters
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// ffmpeg-backed frame source and sink plus ffprobe stream inspection.
// Frames cross the process boundary as raw rgb24 over pipes.

pub mod probe;
pub mod sink;
pub mod source;

pub use probe::probe_video;
pub use sink::FfmpegSink;
pub use source::FfmpegSource;

use std::io::Read;
use std::process::{ChildStderr, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// ffmpeg binary, overridable with `SYNOID_FFMPEG`.
pub fn ffmpeg_bin() -> String {
    std::env::var("SYNOID_FFMPEG").unwrap_or_else(|_| "ffmpeg".to_string())
}

/// ffprobe binary, overridable with `SYNOID_FFPROBE`.
pub fn ffprobe_bin() -> String {
    std::env::var("SYNOID_FFPROBE").unwrap_or_else(|_| "ffprobe".to_string())
}

/// True when the configured ffmpeg runs.
pub fn ffmpeg_available() -> bool {
    Command::new(ffmpeg_bin())
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Parse an ffmpeg rate string: "30000/1001", "25/1" or "29.97".
/// Returns `None` for "0/0" and anything non-positive.
pub fn parse_rate(s: &str) -> Option<f64> {
    let s = s.trim();
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

const STDERR_KEEP: usize = 4096;

/// Drains a child's stderr on a background thread, keeping the last few KB
/// for error messages. Without draining, a chatty ffmpeg blocks on a full pipe.
#[derive(Default)]
pub(crate) struct StderrTail {
    buf: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl StderrTail {
    pub(crate) fn spawn(stderr: Option<ChildStderr>) -> Self {
        let Some(mut stderr) = stderr else {
            return Self::default();
        };
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let reader = thread::spawn(move || {
            let mut chunk = [0u8; 1024];
            while let Ok(n) = stderr.read(&mut chunk) {
                if n == 0 {
                    break;
                }
                if let Ok(mut b) = sink.lock() {
                    b.extend_from_slice(&chunk[..n]);
                    if b.len() > STDERR_KEEP {
                        let cut = b.len() - STDERR_KEEP;
                        b.drain(..cut);
                    }
                }
            }
        });
        Self {
            buf,
            reader: Some(reader),
        }
    }

    /// Wait for the child to close stderr and return what it said.
    /// Only call after the child has exited.
    pub(crate) fn finish(&mut self) -> String {
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        self.buf
            .lock()
            .map(|b| String::from_utf8_lossy(&b).trim().to_string())
            .unwrap_or_default()
    }
}
