// SYNOID FPS Configuration
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Every tunable of the interpolation pipeline lives here and is passed
// explicitly into the entry point. Defaults reproduce the classic
// Farnebäck settings (0.5 / 3 / 15 / 3 / 5 / 1.2) used for 30fps footage.

use crate::error::{InterpError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Dense optical-flow (Farnebäck) parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Scale between pyramid levels (0.5 = each level is half the size).
    pub pyr_scale: f64,
    /// Number of pyramid levels above the full-resolution image.
    pub levels: u32,
    /// Averaging window size; larger is more robust to noise, blurrier motion.
    pub win_size: u32,
    /// Refinement iterations at each pyramid level.
    pub iterations: u32,
    /// Neighbourhood size for polynomial expansion (5 or 7).
    pub poly_n: u32,
    /// Gaussian sigma used to weight the polynomial fit.
    pub poly_sigma: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            win_size: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
        }
    }
}

impl FlowConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.pyr_scale > 0.0 && self.pyr_scale < 1.0) {
            return Err(InterpError::Config(format!(
                "pyr_scale must be in (0, 1), got {}",
                self.pyr_scale
            )));
        }
        if self.win_size == 0 {
            return Err(InterpError::Config("win_size must be at least 1".into()));
        }
        if self.iterations == 0 {
            return Err(InterpError::Config("iterations must be at least 1".into()));
        }
        if self.poly_n != 5 && self.poly_n != 7 {
            return Err(InterpError::Config(format!(
                "poly_n must be 5 or 7, got {}",
                self.poly_n
            )));
        }
        if !(self.poly_sigma > 0.0) {
            return Err(InterpError::Config(format!(
                "poly_sigma must be positive, got {}",
                self.poly_sigma
            )));
        }
        Ok(())
    }
}

/// What the warp sampler returns for lookups that fall outside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderMode {
    /// Repeat the nearest edge pixel.
    #[default]
    Clamp,
    /// Fill with black.
    Zero,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    pub border: BorderMode,
}

/// Encoder settings handed to the ffmpeg sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub codec: String,
    /// H.264 preset for encoding speed/quality trade-off.
    pub preset: String,
    /// CRF quality (lower = better quality, larger file).
    pub crf: u32,
    pub pix_fmt: String,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 18,
            pix_fmt: "yuv420p".to_string(),
        }
    }
}

/// Top-level configuration for an interpolation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolatorConfig {
    pub flow: FlowConfig,
    pub warp: WarpConfig,
    /// Warp all intermediates of a pair concurrently.
    pub parallel_warp: bool,
    /// Worker threads for flow and warping (0 = one per CPU).
    pub threads: usize,
    pub encode: EncodeConfig,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        Self {
            flow: FlowConfig::default(),
            warp: WarpConfig::default(),
            parallel_warp: true,
            threads: 0,
            encode: EncodeConfig::default(),
        }
    }
}

impl InterpolatorConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.flow.validate()?;
        if self.encode.codec.trim().is_empty() {
            return Err(InterpError::Config("encode.codec must not be empty".into()));
        }
        Ok(())
    }

    /// Resolved worker thread count.
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_flow() {
        let flow = FlowConfig::default();
        assert_eq!(flow.pyr_scale, 0.5);
        assert_eq!(flow.levels, 3);
        assert_eq!(flow.win_size, 15);
        assert_eq!(flow.iterations, 3);
        assert_eq!(flow.poly_n, 5);
        assert_eq!(flow.poly_sigma, 1.2);
        assert!(InterpolatorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: InterpolatorConfig =
            serde_json::from_str(r#"{ "flow": { "levels": 5 }, "warp": { "border": "zero" } }"#)
                .unwrap();
        assert_eq!(config.flow.levels, 5);
        assert_eq!(config.flow.win_size, 15);
        assert_eq!(config.warp.border, BorderMode::Zero);
        assert!(config.parallel_warp);
        assert_eq!(config.encode.codec, "libx264");
    }

    #[test]
    fn test_validate_rejects_bad_flow() {
        let mut config = InterpolatorConfig::default();
        config.flow.pyr_scale = 1.0;
        assert!(matches!(config.validate(), Err(InterpError::Config(_))));

        let mut config = InterpolatorConfig::default();
        config.flow.poly_n = 6;
        assert!(config.validate().is_err());

        let mut config = InterpolatorConfig::default();
        config.flow.iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_threads_auto() {
        let config = InterpolatorConfig::default();
        assert!(config.worker_threads() >= 1);

        let config = InterpolatorConfig {
            threads: 3,
            ..Default::default()
        };
        assert_eq!(config.worker_threads(), 3);
    }
}
