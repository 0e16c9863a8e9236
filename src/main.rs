// SYNOID FPS Main Entry Point
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use synoid_fps::engine::scheduler::{CancelToken, InterpolationPlan, Interpolator};
use synoid_fps::media::{probe_video, FfmpegSink, FfmpegSource};
use synoid_fps::{FrameSource, InterpolatorConfig};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "synoid-fps")]
#[command(about = "SYNOID motion-compensated frame-rate converter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Raise a video's frame rate with optical-flow interpolation
    Convert {
        /// Path to input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Target frame rate (60, 90 and 120 are typical)
        #[arg(short, long, default_value_t = 60.0)]
        fps: f64,

        /// Path to output video file (default: <input>_<fps>fps.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON file with flow, warp and encoder settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show how many frames would be synthesized per pair
    Plan {
        #[arg(long)]
        input_fps: f64,

        #[arg(long)]
        output_fps: f64,
    },

    /// Print stream info of a video as JSON
    Probe {
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = Cli::parse();

    match args.command {
        Commands::Convert {
            input,
            fps,
            output,
            config,
        } => {
            let config = match config {
                Some(path) => InterpolatorConfig::load(&path)?,
                None => InterpolatorConfig::default(),
            };
            let output = output.unwrap_or_else(|| default_output_path(&input, fps));
            convert(input, output, fps, config).await?;
        }
        Commands::Plan {
            input_fps,
            output_fps,
        } => {
            let plan = InterpolationPlan::new(input_fps, output_fps)?;
            println!("frames per pair: {}", plan.count());
            println!("offsets: {:?}", plan.offsets());
        }
        Commands::Probe { input } => {
            let info = probe_video(&input)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

async fn convert(input: PathBuf, output: PathBuf, fps: f64, config: InterpolatorConfig) -> Result<()> {
    info!("--- SYNOID FPS ---");

    let cancel = CancelToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("[INTERP] Ctrl-C received, stopping after the current pair");
            on_ctrl_c.cancel();
        }
    });

    let task = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut source = FfmpegSource::open(&input)?;
        let info = source.stream_info();

        // Reject before the encoder creates an output file.
        InterpolationPlan::new(info.fps, fps)?;

        let interpolator = Interpolator::new(&config)?;
        let mut sink = FfmpegSink::create(&output, info.width, info.height, fps, &config.encode)?;

        let mut last_logged = -1.0;
        let result = interpolator.run(
            &mut source,
            &mut sink,
            fps,
            |p| {
                if p.percent - last_logged >= 1.0 || p.percent >= 100.0 {
                    last_logged = p.percent;
                    info!("[INTERP] Processing... {:.2}%", p.percent);
                }
            },
            &cancel,
        );

        match result {
            Ok(summary) => {
                info!(
                    "[INTERP] Saved {} ({} -> {} frames)",
                    output.display(),
                    summary.input_frames,
                    summary.output_frames
                );
                Ok(())
            }
            Err(e) if e.is_truncation() => {
                error!("[INTERP] {}; partial output kept at {}", e, output.display());
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    });

    task.await.context("Interpolation worker panicked")?
}

/// `<dir>/<stem>_<fps>fps.mp4` next to the input.
fn default_output_path(input: &Path, fps: f64) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_{}fps.mp4", stem, fps))
}
