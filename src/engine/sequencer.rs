// SYNOID Frame Sequencer
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Source/sink capabilities and the ordered, streaming hand-off between the
// scheduler and whatever consumes the output. Frames are written the moment
// they are final; nothing is buffered beyond the pair being processed.

use crate::engine::SynoidFrame;
use crate::error::{BoxError, InterpError, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What a frame source knows about its stream before the first read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second of the input.
    pub fps: f64,
    /// Total frames, when the container reports or implies it.
    pub frame_count: Option<u64>,
}

/// Yields original frames in display order.
pub trait FrameSource {
    fn stream_info(&self) -> StreamInfo;

    /// Next frame, `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> std::result::Result<Option<SynoidFrame>, BoxError>;
}

/// Accepts output frames in strict order.
pub trait FrameSink {
    fn write(&mut self, frame: &SynoidFrame) -> std::result::Result<(), BoxError>;

    /// Flush and close the output. Called once, after the last write.
    fn finalize(&mut self) -> std::result::Result<(), BoxError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn stream_info(&self) -> StreamInfo {
        (**self).stream_info()
    }

    fn next_frame(&mut self) -> std::result::Result<Option<SynoidFrame>, BoxError> {
        (**self).next_frame()
    }
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn write(&mut self, frame: &SynoidFrame) -> std::result::Result<(), BoxError> {
        (**self).write(frame)
    }

    fn finalize(&mut self) -> std::result::Result<(), BoxError> {
        (**self).finalize()
    }
}

/// Snapshot handed to the progress callback after every pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub pairs_done: u64,
    pub total_pairs: Option<u64>,
    pub frames_written: u64,
    /// 0–100, never decreasing within a run.
    pub percent: f64,
}

/// Stamps output order and timing onto frames and streams them to a sink.
pub struct FrameSequencer<'a, K: FrameSink + ?Sized> {
    sink: &'a mut K,
    output_fps: f64,
    total_pairs: Option<u64>,
    frames_written: u64,
    pairs_done: u64,
    percent: f64,
}

impl<'a, K: FrameSink + ?Sized> FrameSequencer<'a, K> {
    pub fn new(sink: &'a mut K, output_fps: f64, input_frames: Option<u64>) -> Self {
        Self {
            sink,
            output_fps,
            total_pairs: input_frames.map(|n| n.saturating_sub(1)),
            frames_written: 0,
            pairs_done: 0,
            percent: 0.0,
        }
    }

    /// Assign the next output position to `frame` and write it.
    pub fn emit(&mut self, frame: &mut SynoidFrame, pair_index: Option<u64>) -> Result<()> {
        frame.index = self.frames_written;
        frame.pts = self.frames_written as f64 / self.output_fps;

        self.sink
            .write(frame)
            .map_err(|source| InterpError::SinkWrite {
                output_index: self.frames_written,
                pair_index,
                source,
            })?;

        self.frames_written += 1;
        Ok(())
    }

    /// Record a finished pair and compute the new progress value.
    pub fn pair_done(&mut self) -> Progress {
        self.pairs_done += 1;
        if let Some(total) = self.total_pairs.filter(|t| *t > 0) {
            let pct = (self.pairs_done as f64 / total as f64 * 100.0).min(100.0);
            self.percent = self.percent.max(pct);
        }
        self.progress()
    }

    /// Final progress report of a successful run.
    pub fn complete(&mut self) -> Progress {
        self.percent = 100.0;
        self.progress()
    }

    pub fn finalize(&mut self) -> Result<()> {
        self.sink
            .finalize()
            .map_err(|source| InterpError::SinkFinalize { source })
    }

    pub fn progress(&self) -> Progress {
        Progress {
            pairs_done: self.pairs_done,
            total_pairs: self.total_pairs,
            frames_written: self.frames_written,
            percent: self.percent,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn pairs_done(&self) -> u64 {
        self.pairs_done
    }
}

/// In-memory output sequence. Keeps every frame in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Vec<SynoidFrame>,
    finalized: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[SynoidFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<SynoidFrame> {
        self.frames
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &SynoidFrame) -> std::result::Result<(), BoxError> {
        if self.finalized {
            return Err("write after finalize".into());
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finalize(&mut self) -> std::result::Result<(), BoxError> {
        self.finalized = true;
        Ok(())
    }
}

/// Frame source over decoded images already in memory.
pub struct MemorySource {
    info: StreamInfo,
    frames: VecDeque<RgbImage>,
    next_index: u64,
}

impl MemorySource {
    /// Dimensions are taken from the first image (0x0 when empty).
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        Self {
            info: StreamInfo {
                width,
                height,
                fps,
                frame_count: Some(frames.len() as u64),
            },
            frames: frames.into(),
            next_index: 0,
        }
    }

    /// Hide the frame count, as a live or unindexed stream would.
    pub fn without_frame_count(mut self) -> Self {
        self.info.frame_count = None;
        self
    }
}

impl FrameSource for MemorySource {
    fn stream_info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> std::result::Result<Option<SynoidFrame>, BoxError> {
        Ok(self.frames.pop_front().map(|image| {
            let index = self.next_index;
            self.next_index += 1;
            SynoidFrame::original(image, index, index as f64 / self.info.fps)
        }))
    }
}
