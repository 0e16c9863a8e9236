// SYNOID Interpolation Scheduler
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Walks consecutive frame pairs, estimates motion once per pair and emits
// `count` warped intermediates between the two originals. Pairs run strictly
// in order; parallelism lives inside a pair.

use crate::config::InterpolatorConfig;
use crate::engine::flow::{FarnebackEstimator, MotionEstimator};
use crate::engine::sequencer::{FrameSequencer, FrameSink, FrameSource, Progress};
use crate::engine::warp::WarpSampler;
use crate::engine::{FrameOrigin, SynoidFrame};
use crate::error::{InterpError, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ratios needing more intermediates than this per pair are rejected.
pub const MAX_FRAMES_PER_PAIR: u32 = u16::MAX as u32;

/// Number of frames to synthesize between each original pair.
///
/// `round(output / input - 1)` with ties to even, never negative.
pub fn plan(input_fps: f64, output_fps: f64) -> Result<u32> {
    InterpolationPlan::new(input_fps, output_fps).map(|p| p.count())
}

/// Fixed per-run schedule: how many frames go between each pair and where.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InterpolationPlan {
    input_fps: f64,
    output_fps: f64,
    count: u32,
}

impl InterpolationPlan {
    pub fn new(input_fps: f64, output_fps: f64) -> Result<Self> {
        for rate in [input_fps, output_fps] {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(InterpError::InvalidRate(rate));
            }
        }
        if input_fps >= output_fps {
            return Err(InterpError::RateNotIncreasing {
                input_fps,
                output_fps,
            });
        }

        let count = (output_fps / input_fps - 1.0).round_ties_even().max(0.0);
        if count > MAX_FRAMES_PER_PAIR as f64 {
            return Err(InterpError::InvalidRate(output_fps));
        }
        Ok(Self {
            input_fps,
            output_fps,
            count: count as u32,
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn input_fps(&self) -> f64 {
        self.input_fps
    }

    pub fn output_fps(&self) -> f64 {
        self.output_fps
    }

    /// Temporal positions `i / (count + 1)` for `i = 1..=count`.
    pub fn offsets(&self) -> Vec<f32> {
        let step = self.count as f64 + 1.0;
        (1..=self.count).map(|i| (i as f64 / step) as f32).collect()
    }

    /// Output length for `input_frames` originals.
    pub fn output_len(&self, input_frames: u64) -> u64 {
        if input_frames == 0 {
            return 0;
        }
        input_frames + (input_frames - 1) * self.count as u64
    }
}

/// Cooperative cancellation flag, checked between pairs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts for a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    pub input_frames: u64,
    pub output_frames: u64,
    pub pairs: u64,
    pub per_pair: u32,
}

/// Frame-rate converter. Owns the estimator, the sampler and a worker pool.
pub struct Interpolator<E: MotionEstimator = FarnebackEstimator> {
    estimator: E,
    sampler: WarpSampler,
    parallel_warp: bool,
    pool: rayon::ThreadPool,
}

impl Interpolator<FarnebackEstimator> {
    pub fn new(config: &InterpolatorConfig) -> Result<Self> {
        Self::with_estimator(FarnebackEstimator::new(config.flow.clone()), config)
    }
}

impl<E: MotionEstimator> Interpolator<E> {
    /// Use a custom motion estimator; flow settings in `config` are ignored.
    pub fn with_estimator(estimator: E, config: &InterpolatorConfig) -> Result<Self> {
        config.validate()?;
        let threads = config.worker_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("synoid-interp-{}", i))
            .build()
            .map_err(|e| InterpError::Config(format!("worker pool: {}", e)))?;

        debug!(
            "[INTERP] {} with {} worker(s), border {:?}",
            estimator.identity(),
            threads,
            config.warp.border
        );

        Ok(Self {
            estimator,
            sampler: WarpSampler::new(&config.warp),
            parallel_warp: config.parallel_warp,
            pool,
        })
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Convert `source` to `output_fps`, streaming every frame to `sink`.
    ///
    /// The rate is validated before the first read. On a source failure the
    /// frames produced so far are finalized and `SourceRead` is returned;
    /// cancellation behaves the same way with `Cancelled`. Shape and sink
    /// write errors abort without finalizing.
    pub fn run<S, K, P>(
        &self,
        source: &mut S,
        sink: &mut K,
        output_fps: f64,
        mut on_progress: P,
        cancel: &CancelToken,
    ) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
        P: FnMut(&Progress),
    {
        let info = source.stream_info();
        let plan = InterpolationPlan::new(info.fps, output_fps)?;
        let offsets = plan.offsets();

        info!(
            "[INTERP] {:.3} fps -> {:.3} fps: {} intermediate frame(s) per pair",
            plan.input_fps(),
            plan.output_fps(),
            plan.count()
        );
        if plan.count() == 0 {
            warn!("[INTERP] Rate ratio rounds to zero extra frames; originals are copied through");
        }

        let mut seq = FrameSequencer::new(sink, output_fps, info.frame_count);
        let mut frames_read = 0u64;

        let mut prev = match read_next(source, &mut frames_read, &mut seq)? {
            Some(frame) => frame,
            None => {
                seq.finalize()?;
                on_progress(&seq.complete());
                return Ok(summary(&seq, frames_read, plan.count()));
            }
        };

        let expected = (info.width, info.height);
        if expected != (0, 0) && prev.dimensions() != expected {
            return Err(InterpError::ShapeMismatch {
                pair_index: None,
                expected,
                found: prev.dimensions(),
            });
        }
        let expected = prev.dimensions();
        seq.emit(&mut prev, None)?;

        loop {
            if cancel.is_cancelled() {
                let (pairs_done, frames_written) = (seq.pairs_done(), seq.frames_written());
                seq.finalize()?;
                warn!(
                    "[INTERP] Cancelled after {} pairs, {} frames written",
                    pairs_done, frames_written
                );
                return Err(InterpError::Cancelled {
                    pairs_done,
                    frames_written,
                });
            }

            let mut next = match read_next(source, &mut frames_read, &mut seq)? {
                Some(frame) => frame,
                None => break,
            };

            let pair = seq.pairs_done();
            if next.dimensions() != expected {
                return Err(InterpError::ShapeMismatch {
                    pair_index: Some(pair),
                    expected,
                    found: next.dimensions(),
                });
            }

            if !offsets.is_empty() {
                for mut frame in self.interpolate_pair(&prev, &next, pair, &offsets)? {
                    seq.emit(&mut frame, Some(pair))?;
                }
            }
            seq.emit(&mut next, Some(pair))?;
            prev = next;

            let progress = seq.pair_done();
            debug!(
                "[INTERP] Pair {} done ({} frames written)",
                pair, progress.frames_written
            );
            on_progress(&progress);
        }

        seq.finalize()?;
        on_progress(&seq.complete());

        let done = summary(&seq, frames_read, plan.count());
        info!(
            "[INTERP] Done: {} input frames -> {} output frames",
            done.input_frames, done.output_frames
        );
        Ok(done)
    }

    /// Synthesized frames of one pair, in increasing alpha order.
    pub fn interpolate_pair(
        &self,
        prev: &SynoidFrame,
        next: &SynoidFrame,
        pair: u64,
        offsets: &[f32],
    ) -> Result<Vec<SynoidFrame>> {
        self.pool.install(|| {
            let (a, b) = rayon::join(|| prev.to_gray(), || next.to_gray());
            let field = self
                .estimator
                .estimate(&a, &b)
                .map_err(|e| e.at_pair(pair))?;
            debug!("[FLOW] Pair {}: max motion {:.2}px", pair, field.max_magnitude());

            let warp_at = |&alpha: &f32| -> Result<SynoidFrame> {
                let image = self
                    .sampler
                    .warp(&prev.image, &field, alpha)
                    .map_err(|e| e.at_pair(pair))?;
                Ok(SynoidFrame {
                    image,
                    pts: 0.0,
                    index: 0,
                    origin: FrameOrigin::Synthesized {
                        pair_index: pair,
                        alpha,
                    },
                })
            };

            if self.parallel_warp {
                offsets.par_iter().map(warp_at).collect()
            } else {
                offsets.iter().map(warp_at).collect()
            }
        })
    }
}

/// Pull one frame. A source failure finalizes what was written so far.
fn read_next<S, K>(
    source: &mut S,
    frames_read: &mut u64,
    seq: &mut FrameSequencer<'_, K>,
) -> Result<Option<SynoidFrame>>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    match source.next_frame() {
        Ok(Some(frame)) => {
            *frames_read += 1;
            Ok(Some(frame))
        }
        Ok(None) => Ok(None),
        Err(source_err) => {
            let frames_written = seq.frames_written();
            warn!(
                "[INTERP] Source failed at frame {}: {}; finalizing {} frames",
                frames_read, source_err, frames_written
            );
            seq.finalize()?;
            Err(InterpError::SourceRead {
                frame_index: *frames_read,
                frames_written,
                source: source_err,
            })
        }
    }
}

fn summary<K: FrameSink + ?Sized>(seq: &FrameSequencer<'_, K>, input_frames: u64, per_pair: u32) -> RunSummary {
    RunSummary {
        input_frames,
        output_frames: seq.frames_written(),
        pairs: seq.pairs_done(),
        per_pair,
    }
}
