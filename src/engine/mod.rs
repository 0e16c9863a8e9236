// SYNOID Engine Module
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Frame types and the motion-compensated interpolation pipeline.

pub mod flow;
pub mod scheduler;
pub mod sequencer;
pub mod warp;

use image::RgbImage;

/// Where a frame in the output sequence came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOrigin {
    /// Read from the source; `source_index` is its 0-based position in the input.
    Original { source_index: u64 },
    /// Warped from the first frame of pair `pair_index` at temporal offset `alpha`.
    Synthesized { pair_index: u64, alpha: f32 },
}

/// Represents a single video frame flowing through the SYNOID pipeline.
/// This is the fundamental data unit passed from source to sink.
#[derive(Debug, Clone)]
pub struct SynoidFrame {
    /// Packed RGB pixels, 8 bits per channel
    pub image: RgbImage,
    /// Presentation timestamp in seconds
    pub pts: f64,
    /// Frame index in the sequence this frame currently belongs to
    pub index: u64,
    pub origin: FrameOrigin,
}

impl SynoidFrame {
    /// Create a new black frame with given dimensions
    pub fn new(width: u32, height: u32) -> Self {
        Self::original(RgbImage::new(width, height), 0, 0.0)
    }

    /// Wrap a decoded source image.
    pub fn original(image: RgbImage, source_index: u64, pts: f64) -> Self {
        Self {
            image,
            pts,
            index: source_index,
            origin: FrameOrigin::Original { source_index },
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(self.origin, FrameOrigin::Synthesized { .. })
    }

    /// Raw RGB24 bytes, row-major with no padding.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Luminance view used for motion estimation.
    pub fn to_gray(&self) -> GrayFrame {
        GrayFrame::from_rgb(&self.image)
    }
}

/// Single-channel f32 luminance plane (0.0–255.0).
#[derive(Debug, Clone, PartialEq)]
pub struct GrayFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl GrayFrame {
    /// BT.601 luma, matching the usual BGR→GRAY conversion of video tooling.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let data = image
            .pixels()
            .map(|p| 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32)
            .collect();
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data,
        }
    }

    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
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
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_new_frame_is_black() {
        let frame = SynoidFrame::new(4, 3);
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.as_bytes().len(), 4 * 3 * 3);
        assert!(frame.as_bytes().iter().all(|&b| b == 0));
        assert!(!frame.is_synthesized());
    }

    #[test]
    fn test_gray_uses_bt601_weights() {
        let mut img = RgbImage::new(3, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(2, 0, Rgb([255, 255, 255]));

        let gray = GrayFrame::from_rgb(&img);
        assert!((gray.get(0, 0) - 76.245).abs() < 1e-3);
        assert!((gray.get(1, 0) - 149.685).abs() < 1e-3);
        assert!((gray.get(2, 0) - 255.0).abs() < 1e-3);
    }
}
