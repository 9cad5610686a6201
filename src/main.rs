//! Frame recorder: synthetic frames, bounded hand-off, parallel image writers

use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use frame_recorder::capture::NoiseSource;
use frame_recorder::sink::{ImageFileSink, OutputFormat};
use frame_recorder::utils;
use frame_recorder::{Config, Pipeline, QueuePolicy};

/// Generate frames at a fixed rate and write them to disk with a pool of writers
#[derive(Parser, Debug)]
#[command(name = "frame-recorder", version, about)]
struct Args {
    /// TOML configuration file, applied over the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target frames per second
    #[arg(short, long)]
    fps: Option<u32>,

    /// Run duration in seconds
    #[arg(short, long = "time", value_name = "SECONDS")]
    time: Option<u64>,

    /// Number of writer threads
    #[arg(short, long)]
    writers: Option<usize>,

    /// Output directory
    #[arg(short, long)]
    dir: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Image format: jpg, png, bmp, tiff or ppm
    #[arg(long)]
    format: Option<OutputFormat>,

    /// JPEG quality (1-100)
    #[arg(long)]
    quality: Option<u8>,

    /// Queue capacity in frames
    #[arg(long)]
    capacity: Option<usize>,

    /// Full-queue behaviour: block or drop_oldest
    #[arg(long)]
    policy: Option<QueuePolicy>,

    /// Seed for reproducible frame content
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(fps) = self.fps {
            config.source.fps = fps;
        }
        if let Some(time) = self.time {
            config.pipeline.duration_secs = time;
        }
        if let Some(writers) = self.writers {
            config.pipeline.writers = writers;
        }
        if let Some(dir) = self.dir {
            config.output.dir = dir;
        }
        if let Some(width) = self.width {
            config.source.width = width;
        }
        if let Some(height) = self.height {
            config.source.height = height;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(quality) = self.quality {
            config.output.quality = quality;
        }
        if let Some(capacity) = self.capacity {
            config.pipeline.queue_capacity = capacity;
        }
        if let Some(policy) = self.policy {
            config.pipeline.policy = policy;
        }
        if self.seed.is_some() {
            config.source.seed = self.seed;
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("frame_recorder=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    utils::ensure_output_dir(&config.output.dir)?;

    info!("=== Configuration ===");
    info!("FPS: {}", config.source.fps);
    info!("Duration: {} s", config.pipeline.duration_secs);
    info!("Writers: {}", config.pipeline.writers);
    info!("Resolution: {}x{}", config.source.width, config.source.height);
    info!(
        "Queue: {} frames ({:?})",
        config.pipeline.queue_capacity, config.pipeline.policy
    );
    info!(
        "Output: {} ({}, prefix '{}')",
        config.output.dir.display(),
        config.output.format,
        config.output.prefix
    );

    let source = NoiseSource::new(config.source.seed);
    let sink = ImageFileSink::new(
        &config.output.dir,
        &config.output.prefix,
        config.output.format,
        config.output.quality,
    );

    let report = Pipeline::new(config.run_settings())?.run(source, sink)?;
    println!("{report}");

    info!("Frame recorder shutting down");
    Ok(())
}
