// SYNOID FPS Library
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Motion-compensated frame-rate up-conversion: dense optical flow between
// consecutive frames, backward warping to fractional time positions and an
// ordered, streaming hand-off to an encoder.

pub mod config;
pub mod engine;
pub mod error;
pub mod media;

pub use config::{BorderMode, EncodeConfig, FlowConfig, InterpolatorConfig, WarpConfig};
pub use engine::flow::{FarnebackEstimator, MotionEstimator, MotionField};
pub use engine::scheduler::{plan, CancelToken, InterpolationPlan, Interpolator, RunSummary};
pub use engine::sequencer::{FrameSink, FrameSource, MemorySink, MemorySource, Progress, StreamInfo};
pub use engine::warp::WarpSampler;
pub use engine::{FrameOrigin, GrayFrame, SynoidFrame};
pub use error::{BoxError, InterpError};
