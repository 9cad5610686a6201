//! Serial image-write benchmark

use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use frame_recorder::bench::DiskBench;
use frame_recorder::capture::NoiseSource;
use frame_recorder::sink::OutputFormat;
use frame_recorder::utils;

/// Write random images one after another and report per-image write times
#[derive(Parser, Debug)]
#[command(name = "disk-bench", version, about)]
struct Args {
    /// Number of images to write
    #[arg(short, long, default_value_t = 1000)]
    count: usize,

    #[arg(short, long, default_value_t = 1920)]
    width: u32,

    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Image format: jpg, png, bmp, tiff or ppm
    #[arg(short, long = "ext", default_value = "jpg")]
    ext: OutputFormat,

    /// JPEG quality (1-100)
    #[arg(short, long, default_value_t = 90)]
    quality: u8,

    #[arg(short, long, default_value = "./tests_output")]
    output: PathBuf,

    #[arg(short, long, default_value = "img")]
    prefix: String,

    /// Seed for reproducible image content
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("frame_recorder=info,disk_bench=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let args = Args::parse();
    let bench = DiskBench {
        count: args.count,
        width: args.width,
        height: args.height,
        format: args.ext,
        quality: args.quality,
        dir: args.output,
        prefix: args.prefix,
    };
    bench.validate()?;
    utils::ensure_output_dir(&bench.dir)?;

    info!("=== Configuration ===");
    info!("Images: {}", bench.count);
    info!("Resolution: {}x{}", bench.width, bench.height);
    info!("Format: {}", bench.format);
    info!("Directory: {}", bench.dir.display());
    info!("Prefix: {}", bench.prefix);

    let report = bench.run(&mut NoiseSource::new(args.seed))?;
    println!("{report}");
    Ok(())
}
