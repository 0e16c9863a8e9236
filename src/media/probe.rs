// SYNOID Stream Probe
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use crate::engine::sequencer::StreamInfo;
use crate::media::{ffprobe_bin, parse_rate};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Inspect the first video stream of `path` with ffprobe.
pub fn probe_video(path: &Path) -> Result<StreamInfo> {
    let output = Command::new(ffprobe_bin())
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,duration:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .with_context(|| format!("Running {} on {} (is it installed?)", ffprobe_bin(), path.display()))?;

    if !output.status.success() {
        return Err(anyhow!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let info = parse_probe_json(&text).with_context(|| format!("Probing {}", path.display()))?;
    debug!("[FFMPEG] Probed {}: {:?}", path.display(), info);
    Ok(info)
}

/// Interpret ffprobe's JSON. The frame count falls back to
/// `round(duration * fps)` when the container has no `nb_frames`.
pub fn parse_probe_json(json: &str) -> Result<StreamInfo> {
    let probe: ProbeOutput = serde_json::from_str(json).context("Parsing ffprobe JSON")?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no video stream"))?;

    let width = stream.width.ok_or_else(|| anyhow!("stream has no width"))?;
    let height = stream.height.ok_or_else(|| anyhow!("stream has no height"))?;
    let fps = pick_rate(
        stream.r_frame_rate.as_deref().and_then(parse_rate),
        stream.avg_frame_rate.as_deref().and_then(parse_rate),
    )
    .ok_or_else(|| anyhow!("stream has no usable frame rate"))?;

    let duration = stream
        .duration
        .as_deref()
        .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| duration.map(|d| (d * fps).round() as u64));

    Ok(StreamInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

/// Relative disagreement above which the container's base rate is distrusted.
const RATE_TOLERANCE: f64 = 0.05;

/// `r_frame_rate` is exact for constant-rate streams, but variable-rate
/// phone footage reports a timebase there (90000/1, 120/1). Trust the
/// average whenever the two disagree.
fn pick_rate(base: Option<f64>, avg: Option<f64>) -> Option<f64> {
    match (base, avg) {
        (Some(base), Some(avg)) if ((base - avg) / avg).abs() > RATE_TOLERANCE => {
            debug!("[FFMPEG] r_frame_rate {} disagrees with avg_frame_rate {}; using the average", base, avg);
            Some(avg)
        }
        (Some(base), _) => Some(base),
        (None, avg) => avg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_stream() {
        let json = r#"{
            "streams": [{ "width": 1280, "height": 720, "r_frame_rate": "30000/1001",
                          "avg_frame_rate": "30000/1001", "nb_frames": "300", "duration": "10.01" }],
            "format": { "duration": "10.01" }
        }"#;
        let info = parse_probe_json(json).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert!((info.fps - 29.97).abs() < 0.001);
        assert_eq!(info.frame_count, Some(300));
    }

    #[test]
    fn test_frame_count_falls_back_to_duration() {
        let json = r#"{
            "streams": [{ "width": 640, "height": 360, "r_frame_rate": "0/0", "avg_frame_rate": "25/1" }],
            "format": { "duration": "4.000000" }
        }"#;
        let info = parse_probe_json(json).unwrap();
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_count, Some(100));
    }

    #[test]
    fn test_variable_rate_uses_average() {
        let json = r#"{
            "streams": [{ "width": 1080, "height": 1920, "r_frame_rate": "90000/1",
                          "avg_frame_rate": "8991000/300700", "nb_frames": "299" }]
        }"#;
        let info = parse_probe_json(json).unwrap();
        assert!((info.fps - 29.9).abs() < 0.01, "fps = {}", info.fps);
    }

    #[test]
    fn test_pick_rate() {
        // NTSC base rate and a slightly drifting average agree.
        let ntsc = 30000.0 / 1001.0;
        assert_eq!(pick_rate(Some(ntsc), Some(29.95)), Some(ntsc));
        assert_eq!(pick_rate(Some(120.0), Some(30.0)), Some(30.0));
        assert_eq!(pick_rate(None, Some(25.0)), Some(25.0));
        assert_eq!(pick_rate(Some(24.0), None), Some(24.0));
        assert_eq!(pick_rate(None, None), None);
    }

    #[test]
    fn test_unknown_length() {
        let json = r#"{ "streams": [{ "width": 8, "height": 8, "r_frame_rate": "10/1" }] }"#;
        assert_eq!(parse_probe_json(json).unwrap().frame_count, None);
    }

    #[test]
    fn test_missing_stream_is_error() {
        assert!(parse_probe_json(r#"{ "streams": [] }"#).is_err());
        assert!(parse_probe_json("not json").is_err());
    }
}
