// SYNOID Warp Sampler
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Backward warping: every destination pixel looks up where it came from.
// The motion field points prev -> next, so a frame at time `alpha` between
// them samples prev at `p - alpha * flow(p)`.

use crate::config::{BorderMode, WarpConfig};
use crate::engine::flow::MotionField;
use crate::error::{InterpError, Result};
use image::RgbImage;
use rayon::prelude::*;

/// Motion-compensated resampler with a fixed out-of-bounds policy.
#[derive(Debug, Clone, Default)]
pub struct WarpSampler {
    border: BorderMode,
}

impl WarpSampler {
    pub fn new(config: &WarpConfig) -> Self {
        Self {
            border: config.border,
        }
    }

    pub fn border(&self) -> BorderMode {
        self.border
    }

    /// Synthesize the frame at fractional time `alpha` after `source`.
    ///
    /// A zero field reproduces `source` exactly at any alpha.
    pub fn warp(&self, source: &RgbImage, field: &MotionField, alpha: f32) -> Result<RgbImage> {
        if source.dimensions() != field.dimensions() {
            return Err(InterpError::ShapeMismatch {
                pair_index: None,
                expected: source.dimensions(),
                found: field.dimensions(),
            });
        }

        let (width, height) = (field.width, field.height);
        let mut out = RgbImage::new(width as u32, height as u32);
        if width == 0 || height == 0 {
            return Ok(out);
        }

        let src = source.as_raw();
        let scale = -alpha;

        let rows: &mut [u8] = &mut out;
        rows.par_chunks_mut(width * 3)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..width {
                    let (dx, dy) = field.get(x, y);
                    let sx = x as f32 + dx * scale;
                    let sy = y as f32 + dy * scale;
                    let px = self.sample(src, width, height, sx, sy);
                    row[x * 3..x * 3 + 3].copy_from_slice(&px);
                }
            });

        Ok(out)
    }

    /// Bilinear lookup at a non-integer coordinate.
    #[inline]
    fn sample(&self, src: &[u8], width: usize, height: usize, sx: f32, sy: f32) -> [u8; 3] {
        let x0 = sx.floor();
        let y0 = sy.floor();
        let fx = sx - x0;
        let fy = sy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let taps = [
            (x0, y0, (1.0 - fx) * (1.0 - fy)),
            (x0 + 1, y0, fx * (1.0 - fy)),
            (x0, y0 + 1, (1.0 - fx) * fy),
            (x0 + 1, y0 + 1, fx * fy),
        ];

        let mut acc = [0.0f32; 3];
        for (tx, ty, w) in taps {
            if w == 0.0 {
                continue;
            }
            let Some(i) = self.texel(tx, ty, width, height) else {
                continue;
            };
            for c in 0..3 {
                acc[c] += w * src[i + c] as f32;
            }
        }

        [
            acc[0].round().clamp(0.0, 255.0) as u8,
            acc[1].round().clamp(0.0, 255.0) as u8,
            acc[2].round().clamp(0.0, 255.0) as u8,
        ]
    }

    /// Byte offset of a texel, or `None` when the border policy yields black.
    #[inline]
    fn texel(&self, x: i64, y: i64, width: usize, height: usize) -> Option<usize> {
        let inside = x >= 0 && y >= 0 && x < width as i64 && y < height as i64;
        let (x, y) = match (self.border, inside) {
            (_, true) => (x as usize, y as usize),
            (BorderMode::Clamp, false) => (
                x.clamp(0, width as i64 - 1) as usize,
                y.clamp(0, height as i64 - 1) as usize,
            ),
            (BorderMode::Zero, false) => return None,
        };
        Some((y * width + x) * 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 20) as u8, (y * 30) as u8, ((x + y) * 7) as u8])
        })
    }

    #[test]
    fn test_zero_field_is_identity() {
        let img = gradient(9, 7);
        let field = MotionField::zeros(9, 7);
        let sampler = WarpSampler::default();
        for alpha in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert_eq!(sampler.warp(&img, &field, alpha).unwrap(), img);
        }
    }

    #[test]
    fn test_integer_translation() {
        // Content moves +2 in x between prev and next; halfway it has moved +1.
        let img = gradient(10, 4);
        let field = MotionField::uniform(10, 4, 2.0, 0.0);
        let mid = WarpSampler::default().warp(&img, &field, 0.5).unwrap();

        for y in 0..4 {
            for x in 1..10 {
                assert_eq!(mid.get_pixel(x, y), img.get_pixel(x - 1, y));
            }
            // Left edge clamps to column 0.
            assert_eq!(mid.get_pixel(0, y), img.get_pixel(0, y));
        }
    }

    #[test]
    fn test_subpixel_translation_blends() {
        let mut img = RgbImage::new(4, 1);
        img.put_pixel(1, 0, Rgb([100, 100, 100]));
        img.put_pixel(2, 0, Rgb([200, 200, 200]));

        // alpha 0.5 of a -1px field samples at x + 0.5.
        let field = MotionField::uniform(4, 1, -1.0, 0.0);
        let out = WarpSampler::default().warp(&img, &field, 0.5).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgb([50, 50, 50]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([150, 150, 150]));
        assert_eq!(out.get_pixel(2, 0), &Rgb([100, 100, 100]));
    }

    #[test]
    fn test_zero_border_fills_black() {
        let img = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let field = MotionField::uniform(4, 4, 4.0, 0.0);
        let sampler = WarpSampler::new(&WarpConfig {
            border: BorderMode::Zero,
        });
        let out = sampler.warp(&img, &field, 0.5).unwrap();
        // Columns 0 and 1 look up x - 2 < 0.
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(1, 2), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(3, 3), &Rgb([255, 255, 255]));

        let clamped = WarpSampler::default().warp(&img, &field, 0.5).unwrap();
        assert!(clamped.pixels().all(|p| p == &Rgb([255, 255, 255])));
    }

    #[test]
    fn test_field_size_must_match() {
        let img = gradient(4, 4);
        let field = MotionField::zeros(4, 3);
        let err = WarpSampler::default().warp(&img, &field, 0.5).unwrap_err();
        assert!(matches!(err, InterpError::ShapeMismatch { .. }));
    }
}
