// SYNOID Interpolation Errors
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use thiserror::Error;

/// Boxed error produced by frame source / sink capabilities.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, InterpError>;

/// Everything that can end an interpolation run early.
///
/// Pair-level failures abort the whole run: skipping a pair would shift every
/// later frame off the declared output rate.
#[derive(Debug, Error)]
pub enum InterpError {
    /// Two frames (or a frame and its motion field) disagree on geometry.
    #[error("shape mismatch{}: expected {}, found {}", pair_suffix(.pair_index), dims(.expected), dims(.found))]
    ShapeMismatch {
        pair_index: Option<u64>,
        expected: (u32, u32),
        found: (u32, u32),
    },

    /// Interpolation only ever raises the frame rate.
    #[error("output rate {output_fps} fps must exceed input rate {input_fps} fps")]
    RateNotIncreasing { input_fps: f64, output_fps: f64 },

    #[error("invalid frame rate: {0}")]
    InvalidRate(f64),

    /// The source failed before end-of-stream. Output up to this point was
    /// flushed and finalized.
    #[error("source failed reading frame {frame_index}; output truncated after {frames_written} frames")]
    SourceRead {
        frame_index: u64,
        frames_written: u64,
        #[source]
        source: BoxError,
    },

    #[error("sink rejected output frame {output_index}{}", pair_suffix(.pair_index))]
    SinkWrite {
        output_index: u64,
        pair_index: Option<u64>,
        #[source]
        source: BoxError,
    },

    #[error("sink failed to finalize")]
    SinkFinalize {
        #[source]
        source: BoxError,
    },

    #[error("cancelled after {pairs_done} pairs ({frames_written} frames written)")]
    Cancelled { pairs_done: u64, frames_written: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl InterpError {
    /// True when the sink holds a valid, finalized (but shortened) output.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::SourceRead { .. } | Self::Cancelled { .. })
    }

    /// Attach a pair index to a shape mismatch raised below the scheduler.
    pub(crate) fn at_pair(self, pair: u64) -> Self {
        match self {
            Self::ShapeMismatch {
                pair_index: None,
                expected,
                found,
            } => Self::ShapeMismatch {
                pair_index: Some(pair),
                expected,
                found,
            },
            other => other,
        }
    }
}

fn pair_suffix(pair_index: &Option<u64>) -> String {
    match pair_index {
        Some(pair) => format!(" in pair {}", pair),
        None => String::new(),
    }
}

fn dims(size: &(u32, u32)) -> String {
    format!("{}x{}", size.0, size.1)
}
