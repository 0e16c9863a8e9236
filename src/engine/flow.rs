// SYNOID Motion Estimator - Dense Optical Flow
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Farnebäck two-frame motion estimation:
//   1. Approximate each neighbourhood of both frames by a quadratic
//      polynomial (polynomial expansion, Gaussian-weighted least squares).
//   2. Estimate displacement from how the polynomial coefficients change,
//      averaging the constraint over a window.
//   3. Repeat coarse-to-fine over an image pyramid, refining the flow
//      a fixed number of iterations per level.
//
// Every pass is row-parallel (rayon). Rows never read each other's output
// within a pass, so results are identical for any thread count.

use crate::config::FlowConfig;
use crate::engine::GrayFrame;
use crate::error::{InterpError, Result};
use rayon::prelude::*;
use tracing::debug;

/// Pyramid levels whose short side would fall under this size are skipped.
const MIN_PYRAMID_SIZE: f64 = 32.0;

/// Confidence falloff applied within this many pixels of the frame edge.
const BORDER: usize = 5;
const BORDER_WEIGHTS: [f32; BORDER] = [0.14, 0.14, 0.4472, 0.4472, 0.4472];

/// Dense per-pixel displacement field, `(dx, dy)` interleaved row-major.
///
/// A vector at `(x, y)` says the content of frame A at that pixel is found
/// at `(x + dx, y + dy)` in frame B.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionField {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl MotionField {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height * 2],
        }
    }

    /// Same displacement everywhere (global translation).
    pub fn uniform(width: usize, height: usize, dx: f32, dy: f32) -> Self {
        let mut data = Vec::with_capacity(width * height * 2);
        for _ in 0..width * height {
            data.push(dx);
            data.push(dy);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> (f32, f32) {
        let i = (y * self.width + x) * 2;
        (self.data[i], self.data[i + 1])
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, dx: f32, dy: f32) {
        let i = (y * self.width + x) * 2;
        self.data[i] = dx;
        self.data[i + 1] = dy;
    }

    /// Largest vector length in the field.
    pub fn max_magnitude(&self) -> f32 {
        self.data
            .chunks_exact(2)
            .map(|v| (v[0] * v[0] + v[1] * v[1]).sqrt())
            .fold(0.0, f32::max)
    }

    /// Mean displacement over a rectangle, useful for judging global motion.
    pub fn mean_in(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> (f32, f32) {
        let (mut sx, mut sy, mut n) = (0.0f64, 0.0f64, 0usize);
        for y in y0..y1.min(self.height) {
            for x in x0..x1.min(self.width) {
                let (dx, dy) = self.get(x, y);
                sx += dx as f64;
                sy += dy as f64;
                n += 1;
            }
        }
        if n == 0 {
            (0.0, 0.0)
        } else {
            ((sx / n as f64) as f32, (sy / n as f64) as f32)
        }
    }
}

/// Anything that can produce a dense motion field for a frame pair.
pub trait MotionEstimator: Send + Sync {
    /// Estimate motion from `prev` to `next`. Frames must have equal size.
    fn estimate(&self, prev: &GrayFrame, next: &GrayFrame) -> Result<MotionField>;

    /// Get the estimator's identity for logging
    fn identity(&self) -> String;
}

/// Pyramidal Farnebäck optical flow.
#[derive(Debug, Clone, Default)]
pub struct FarnebackEstimator {
    config: FlowConfig,
}

impl FarnebackEstimator {
    pub fn new(config: FlowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Number of pyramid levels above full resolution actually used for
    /// a frame of the given size.
    fn effective_levels(&self, width: usize, height: usize) -> u32 {
        let short = width.min(height) as f64;
        let mut scale = 1.0;
        for k in 0..self.config.levels {
            scale *= self.config.pyr_scale;
            if short * scale < MIN_PYRAMID_SIZE {
                return k;
            }
        }
        self.config.levels
    }
}

impl MotionEstimator for FarnebackEstimator {
    fn estimate(&self, prev: &GrayFrame, next: &GrayFrame) -> Result<MotionField> {
        if prev.dimensions() != next.dimensions() {
            return Err(InterpError::ShapeMismatch {
                pair_index: None,
                expected: prev.dimensions(),
                found: next.dimensions(),
            });
        }

        let (width, height) = (prev.width, prev.height);
        if width == 0 || height == 0 {
            return Ok(MotionField::zeros(width, height));
        }

        let cfg = &self.config;
        let levels = self.effective_levels(width, height);
        let poly = PolyBasis::new(cfg.poly_n as usize, cfg.poly_sigma);
        let mut flow: Option<MotionField> = None;

        for k in (0..=levels).rev() {
            let scale = cfg.pyr_scale.powi(k as i32);
            let level_w = ((width as f64 * scale).round() as usize).max(1);
            let level_h = ((height as f64 * scale).round() as usize).max(1);

            let mut level_flow = match flow.take() {
                None => MotionField::zeros(level_w, level_h),
                Some(coarse) => upscale_flow(&coarse, level_w, level_h, 1.0 / cfg.pyr_scale),
            };

            let (i0, i1) = if k == 0 {
                (poly.expand(prev), poly.expand(next))
            } else {
                let sigma = (1.0 / scale - 1.0) * 0.5;
                let p = resize_bilinear(&gaussian_blur(prev, sigma), level_w, level_h);
                let n = resize_bilinear(&gaussian_blur(next, sigma), level_w, level_h);
                (poly.expand(&p), poly.expand(&n))
            };

            debug!(
                "[FLOW] Level {} ({}x{}), {} iterations",
                k, level_w, level_h, cfg.iterations
            );

            let mut m = vec![0.0f32; level_w * level_h * 5];
            update_matrices(&i0, &i1, &level_flow, &mut m);
            for i in 0..cfg.iterations {
                let refresh = i + 1 < cfg.iterations;
                update_flow(&i0, &i1, &mut level_flow, &mut m, cfg.win_size as usize, refresh);
            }

            flow = Some(level_flow);
        }

        Ok(flow.unwrap_or_else(|| MotionField::zeros(width, height)))
    }

    fn identity(&self) -> String {
        let c = &self.config;
        format!(
            "farneback(pyr_scale={}, levels={}, win={}, iter={}, poly_n={}, sigma={})",
            c.pyr_scale, c.levels, c.win_size, c.iterations, c.poly_n, c.poly_sigma
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Polynomial expansion
// ─────────────────────────────────────────────────────────────────────────────

/// Separable kernels and the inverse normal-equation terms for fitting
/// `f(x) ~ x^T A x + b^T x + c` over a `(2n+1)^2` Gaussian-weighted window.
struct PolyBasis {
    n: usize,
    g: Vec<f32>,
    xg: Vec<f32>,
    xxg: Vec<f32>,
    ig11: f32,
    ig03: f32,
    ig33: f32,
    ig55: f32,
}

impl PolyBasis {
    fn new(n: usize, sigma: f64) -> Self {
        let n_i = n as i64;
        let mut g: Vec<f64> = (-n_i..=n_i)
            .map(|x| (-(x * x) as f64 / (2.0 * sigma * sigma)).exp())
            .collect();
        let sum: f64 = g.iter().sum();
        for v in g.iter_mut() {
            *v /= sum;
        }

        let at = |i: i64| g[(i + n_i) as usize];
        let (mut g00, mut g11, mut g33, mut g55) = (0.0, 0.0, 0.0, 0.0);
        for y in -n_i..=n_i {
            for x in -n_i..=n_i {
                let w = at(y) * at(x);
                let (xf, yf) = (x as f64, y as f64);
                g00 += w;
                g11 += w * xf * xf;
                g33 += w * xf * xf * xf * xf;
                g55 += w * xf * xf * yf * yf;
            }
        }

        // The 6x6 normal matrix is block-diagonal: indices 1, 2, 5 stand
        // alone, and {0, 3, 4} form [[g00 g11 g11] [g11 g33 g55] [g11 g55 g33]].
        let inv = invert3([[g00, g11, g11], [g11, g33, g55], [g11, g55, g33]]);

        Self {
            n,
            g: (0..=n).map(|k| at(k as i64) as f32).collect(),
            xg: (0..=n).map(|k| (k as f64 * at(k as i64)) as f32).collect(),
            xxg: (0..=n).map(|k| ((k * k) as f64 * at(k as i64)) as f32).collect(),
            ig11: (1.0 / g11) as f32,
            ig03: inv[0][1] as f32,
            ig33: inv[1][1] as f32,
            ig55: (1.0 / g55) as f32,
        }
    }

    /// Five coefficients per pixel: `[b_y, b_x, a_yy, a_xx, a_xy]`.
    fn expand(&self, src: &GrayFrame) -> Vec<f32> {
        let (width, height, n) = (src.width, src.height, self.n);
        let mut out = vec![0.0f32; width * height * 5];

        out.par_chunks_mut(width * 5)
            .enumerate()
            .for_each(|(y, out_row)| {
                // Vertical pass: zeroth, first and second moments along y.
                let mut row = vec![0.0f32; width * 3];
                let center = &src.data[y * width..(y + 1) * width];
                for x in 0..width {
                    row[x * 3] = center[x] * self.g[0];
                }
                for k in 1..=n {
                    let y0 = y.saturating_sub(k);
                    let y1 = (y + k).min(height - 1);
                    let s0 = &src.data[y0 * width..(y0 + 1) * width];
                    let s1 = &src.data[y1 * width..(y1 + 1) * width];
                    for x in 0..width {
                        let p = s0[x] + s1[x];
                        row[x * 3] += self.g[k] * p;
                        row[x * 3 + 1] += self.xg[k] * (s1[x] - s0[x]);
                        row[x * 3 + 2] += self.xxg[k] * p;
                    }
                }

                // Horizontal pass.
                for x in 0..width {
                    let mut b1 = row[x * 3] * self.g[0];
                    let mut b2 = 0.0;
                    let mut b3 = row[x * 3 + 1] * self.g[0];
                    let mut b4 = 0.0;
                    let mut b5 = row[x * 3 + 2] * self.g[0];
                    let mut b6 = 0.0;

                    for k in 1..=n {
                        let l = x.saturating_sub(k) * 3;
                        let r = (x + k).min(width - 1) * 3;
                        let tg = row[r] + row[l];
                        let tgx = row[r] - row[l];
                        b1 += tg * self.g[k];
                        b4 += tg * self.xxg[k];
                        b2 += tgx * self.xg[k];
                        b3 += (row[r + 1] + row[l + 1]) * self.g[k];
                        b6 += (row[r + 1] - row[l + 1]) * self.xg[k];
                        b5 += (row[r + 2] + row[l + 2]) * self.g[k];
                    }

                    let o = &mut out_row[x * 5..x * 5 + 5];
                    o[0] = b3 * self.ig11;
                    o[1] = b2 * self.ig11;
                    o[2] = b1 * self.ig03 + b5 * self.ig33;
                    o[3] = b1 * self.ig03 + b4 * self.ig33;
                    o[4] = b6 * self.ig55;
                }
            });

        out
    }
}

fn invert3(m: [[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let cof = |r0: usize, r1: usize, c0: usize, c1: usize| m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0];
    let det = m[0][0] * cof(1, 2, 1, 2) - m[0][1] * cof(1, 2, 0, 2) + m[0][2] * cof(1, 2, 0, 1);
    let inv_det = 1.0 / det;
    [
        [
            cof(1, 2, 1, 2) * inv_det,
            -cof(0, 2, 1, 2) * inv_det,
            cof(0, 1, 1, 2) * inv_det,
        ],
        [
            -cof(1, 2, 0, 2) * inv_det,
            cof(0, 2, 0, 2) * inv_det,
            -cof(0, 1, 0, 2) * inv_det,
        ],
        [
            cof(1, 2, 0, 1) * inv_det,
            -cof(0, 2, 0, 1) * inv_det,
            cof(0, 1, 0, 1) * inv_det,
        ],
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Flow refinement
// ─────────────────────────────────────────────────────────────────────────────

/// Build the per-pixel normal equations `[g11 g12 g22 h1 h2]` from the
/// polynomial coefficients of both frames under the current flow.
fn update_matrices(r0: &[f32], r1: &[f32], flow: &MotionField, m: &mut [f32]) {
    let (width, height) = (flow.width, flow.height);

    m.par_chunks_mut(width * 5)
        .enumerate()
        .for_each(|(y, m_row)| {
            for x in 0..width {
                let (dx, dy) = flow.get(x, y);
                let p0 = &r0[(y * width + x) * 5..(y * width + x) * 5 + 5];

                let fx = x as f32 + dx;
                let fy = y as f32 + dy;
                let x1 = fx.floor();
                let y1 = fy.floor();
                let (ax, ay) = (fx - x1, fy - y1);
                let (x1, y1) = (x1 as i64, y1 as i64);

                let inside = x1 >= 0 && y1 >= 0 && x1 < width as i64 - 1 && y1 < height as i64 - 1;
                let (mut r2, mut r3, mut r4, mut r5, mut r6) = if inside {
                    let a00 = (1.0 - ax) * (1.0 - ay);
                    let a01 = ax * (1.0 - ay);
                    let a10 = (1.0 - ax) * ay;
                    let a11 = ax * ay;
                    let base = (y1 as usize * width + x1 as usize) * 5;
                    let below = base + width * 5;
                    let sample = |c: usize| {
                        a00 * r1[base + c]
                            + a01 * r1[base + 5 + c]
                            + a10 * r1[below + c]
                            + a11 * r1[below + 5 + c]
                    };
                    (
                        sample(0),
                        sample(1),
                        (p0[2] + sample(2)) * 0.5,
                        (p0[3] + sample(3)) * 0.5,
                        (p0[4] + sample(4)) * 0.25,
                    )
                } else {
                    (0.0, 0.0, p0[2], p0[3], p0[4] * 0.5)
                };

                r2 = (p0[0] - r2) * 0.5;
                r3 = (p0[1] - r3) * 0.5;
                r2 += r4 * dy + r6 * dx;
                r3 += r6 * dy + r5 * dx;

                let edge = border_weight(x, width) * border_weight(y, height);
                if edge != 1.0 {
                    r2 *= edge;
                    r3 *= edge;
                    r4 *= edge;
                    r5 *= edge;
                    r6 *= edge;
                }

                let o = &mut m_row[x * 5..x * 5 + 5];
                o[0] = r4 * r4 + r6 * r6;
                o[1] = (r4 + r5) * r6;
                o[2] = r5 * r5 + r6 * r6;
                o[3] = r4 * r2 + r6 * r3;
                o[4] = r6 * r2 + r5 * r3;
            }
        });
}

fn border_weight(pos: usize, len: usize) -> f32 {
    let mut w = 1.0;
    if pos < BORDER {
        w *= BORDER_WEIGHTS[pos];
    }
    if pos + BORDER >= len {
        w *= BORDER_WEIGHTS[len - pos - 1];
    }
    w
}

/// Average the normal equations over a box window, solve for the flow,
/// and optionally rebuild the equations for the next iteration.
fn update_flow(
    r0: &[f32],
    r1: &[f32],
    flow: &mut MotionField,
    m: &mut [f32],
    win_size: usize,
    refresh: bool,
) {
    let (width, height) = (flow.width, flow.height);
    let averaged = box_filter5(m, width, height, win_size / 2);

    flow.data
        .par_chunks_mut(width * 2)
        .enumerate()
        .for_each(|(y, flow_row)| {
            for x in 0..width {
                let s = &averaged[(y * width + x) * 5..(y * width + x) * 5 + 5];
                let (g11, g12, g22, h1, h2) = (s[0], s[1], s[2], s[3], s[4]);
                let idet = 1.0 / (g11 * g22 - g12 * g12 + 1e-3);
                flow_row[x * 2] = (g11 * h2 - g12 * h1) * idet;
                flow_row[x * 2 + 1] = (g22 * h1 - g12 * h2) * idet;
            }
        });

    if refresh {
        update_matrices(r0, r1, flow, m);
    }
}

/// Normalized `(2r+1)^2` box filter over a 5-channel plane, edge-replicated.
fn box_filter5(src: &[f32], width: usize, height: usize, r: usize) -> Vec<f32> {
    let norm = 1.0 / ((2 * r + 1) * (2 * r + 1)) as f32;

    let mut vertical = vec![0.0f32; src.len()];
    vertical
        .par_chunks_mut(width * 5)
        .enumerate()
        .for_each(|(y, out_row)| {
            for dy in -(r as i64)..=(r as i64) {
                let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as usize;
                let in_row = &src[sy * width * 5..(sy + 1) * width * 5];
                for (o, v) in out_row.iter_mut().zip(in_row) {
                    *o += *v;
                }
            }
        });

    let mut out = vec![0.0f32; src.len()];
    out.par_chunks_mut(width * 5)
        .enumerate()
        .for_each(|(y, out_row)| {
            let in_row = &vertical[y * width * 5..(y + 1) * width * 5];
            for x in 0..width {
                let mut acc = [0.0f32; 5];
                for dx in -(r as i64)..=(r as i64) {
                    let sx = (x as i64 + dx).clamp(0, width as i64 - 1) as usize;
                    for c in 0..5 {
                        acc[c] += in_row[sx * 5 + c];
                    }
                }
                for c in 0..5 {
                    out_row[x * 5 + c] = acc[c] * norm;
                }
            }
        });

    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Pyramid helpers
// ─────────────────────────────────────────────────────────────────────────────

fn gaussian_blur(src: &GrayFrame, sigma: f64) -> GrayFrame {
    if sigma <= 0.0 {
        return src.clone();
    }
    let ksize = (((sigma * 5.0).round() as usize) | 1).max(3);
    let half = (ksize / 2) as i64;
    let mut kernel: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f64) / (2.0 * sigma * sigma)).exp() as f32)
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);

    let (w, h) = (src.width, src.height);
    let mut tmp = vec![0.0f32; w * h];
    tmp.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let src_row = &src.data[y * w..(y + 1) * w];
        for (x, o) in row.iter_mut().enumerate() {
            *o = kernel
                .iter()
                .enumerate()
                .map(|(i, k)| {
                    let sx = (x as i64 + i as i64 - half).clamp(0, w as i64 - 1) as usize;
                    k * src_row[sx]
                })
                .sum();
        }
    });

    let mut data = vec![0.0f32; w * h];
    data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, o) in row.iter_mut().enumerate() {
            *o = kernel
                .iter()
                .enumerate()
                .map(|(i, k)| {
                    let sy = (y as i64 + i as i64 - half).clamp(0, h as i64 - 1) as usize;
                    k * tmp[sy * w + x]
                })
                .sum();
        }
    });

    GrayFrame {
        width: w,
        height: h,
        data,
    }
}

/// Pixel-center aligned source coordinate and blend weight for bilinear resize.
#[inline]
fn resize_coord(dst: usize, ratio: f64, src_len: usize) -> (usize, usize, f32) {
    let pos = ((dst as f64 + 0.5) * ratio - 0.5).max(0.0);
    let i0 = (pos.floor() as usize).min(src_len - 1);
    let i1 = (i0 + 1).min(src_len - 1);
    (i0, i1, (pos - i0 as f64).clamp(0.0, 1.0) as f32)
}

fn resize_bilinear(src: &GrayFrame, width: usize, height: usize) -> GrayFrame {
    let rx = src.width as f64 / width as f64;
    let ry = src.height as f64 / height as f64;
    let mut data = vec![0.0f32; width * height];
    data.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        let (y0, y1, fy) = resize_coord(y, ry, src.height);
        for (x, o) in row.iter_mut().enumerate() {
            let (x0, x1, fx) = resize_coord(x, rx, src.width);
            let top = src.get(x0, y0) * (1.0 - fx) + src.get(x1, y0) * fx;
            let bottom = src.get(x0, y1) * (1.0 - fx) + src.get(x1, y1) * fx;
            *o = top * (1.0 - fy) + bottom * fy;
        }
    });
    GrayFrame {
        width,
        height,
        data,
    }
}

/// Resize a coarse flow to the next pyramid level and rescale its vectors.
fn upscale_flow(src: &MotionField, width: usize, height: usize, factor: f64) -> MotionField {
    let rx = src.width as f64 / width as f64;
    let ry = src.height as f64 / height as f64;
    let factor = factor as f32;
    let mut out = MotionField::zeros(width, height);
    out.data
        .par_chunks_mut(width * 2)
        .enumerate()
        .for_each(|(y, row)| {
            let (y0, y1, fy) = resize_coord(y, ry, src.height);
            for x in 0..width {
                let (x0, x1, fx) = resize_coord(x, rx, src.width);
                for c in 0..2 {
                    let at = |sx: usize, sy: usize| src.data[(sy * src.width + sx) * 2 + c];
                    let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
                    let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
                    row[x * 2 + c] = (top * (1.0 - fy) + bottom * fy) * factor;
                }
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(x: f32, y: f32) -> f32 {
        128.0 + 40.0 * (0.30 * x + 0.10 * y).sin() + 40.0 * (0.25 * y - 0.05 * x).cos()
    }

    fn shifted_pair(w: usize, h: usize, dx: f32, dy: f32) -> (GrayFrame, GrayFrame) {
        let a = GrayFrame::from_fn(w, h, |x, y| texture(x as f32, y as f32));
        let b = GrayFrame::from_fn(w, h, |x, y| texture(x as f32 - dx, y as f32 - dy));
        (a, b)
    }

    #[test]
    fn test_identical_frames_have_zero_flow() {
        // 60px keeps a single pyramid level; the right/bottom edge terms only
        // reach 3 * win/2 pixels inward.
        let (a, _) = shifted_pair(60, 60, 0.0, 0.0);
        let flow = FarnebackEstimator::default().estimate(&a, &a).unwrap();
        assert_eq!(flow.dimensions(), (60, 60));
        for y in 0..30 {
            for x in 0..30 {
                let (dx, dy) = flow.get(x, y);
                assert!(dx.abs() < 1e-6 && dy.abs() < 1e-6, "({}, {}) = ({}, {})", x, y, dx, dy);
            }
        }
    }

    #[test]
    fn test_recovers_global_translation() {
        let (a, b) = shifted_pair(96, 96, 2.0, 1.0);
        let flow = FarnebackEstimator::default().estimate(&a, &b).unwrap();

        let (mx, my) = flow.mean_in(20, 20, 76, 76);
        assert!((mx - 2.0).abs() < 0.5, "mean dx = {}", mx);
        assert!((my - 1.0).abs() < 0.5, "mean dy = {}", my);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let a = GrayFrame::from_fn(8, 8, |_, _| 0.0);
        let b = GrayFrame::from_fn(8, 6, |_, _| 0.0);
        let err = FarnebackEstimator::default().estimate(&a, &b).unwrap_err();
        assert!(matches!(
            err,
            InterpError::ShapeMismatch {
                expected: (8, 8),
                found: (8, 6),
                ..
            }
        ));
    }

    #[test]
    fn test_deterministic() {
        let (a, b) = shifted_pair(48, 40, 1.0, -0.5);
        let est = FarnebackEstimator::default();
        assert_eq!(est.estimate(&a, &b).unwrap(), est.estimate(&a, &b).unwrap());
    }

    #[test]
    fn test_small_frames_skip_pyramid() {
        let est = FarnebackEstimator::default();
        assert_eq!(est.effective_levels(40, 40), 0);
        assert_eq!(est.effective_levels(96, 96), 1);
        assert_eq!(est.effective_levels(1920, 1080), 3);

        // Tiny frames still produce a field of the right size.
        let a = GrayFrame::from_fn(3, 2, |x, y| (x + y) as f32);
        let flow = est.estimate(&a, &a).unwrap();
        assert_eq!(flow.dimensions(), (3, 2));
    }

    #[test]
    fn test_invert3() {
        let m = [[4.0, 1.0, 1.0], [1.0, 3.0, 0.5], [1.0, 0.5, 3.0]];
        let inv = invert3(m);
        for i in 0..3 {
            for j in 0..3 {
                let v: f64 = (0..3).map(|k| m[i][k] * inv[k][j]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((v - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_uniform_field_helpers() {
        let field = MotionField::uniform(4, 3, 3.0, 4.0);
        assert_eq!(field.get(2, 1), (3.0, 4.0));
        assert_eq!(field.max_magnitude(), 5.0);
        assert_eq!(field.mean_in(0, 0, 4, 3), (3.0, 4.0));
    }
}
