pub mod bench;
pub mod capture;
pub mod error;
pub mod pipeline;
pub mod sink;
pub mod utils;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use capture::{Frame, FrameSource};
pub use error::{ConfigError, PipelineError, SinkError};
pub use pipeline::{BoundedQueue, Pipeline, QueuePolicy, RunReport, RunSettings};
pub use sink::{FrameSink, OutputFormat, OutputId};

/// Prefix for environment overrides, e.g. `FRAME_RECORDER__PIPELINE__WRITERS=2`
pub const ENV_PREFIX: &str = "FRAME_RECORDER";

/// System configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Fixed RNG seed for reproducible frames
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub duration_secs: u64,
    pub writers: usize,
    pub queue_capacity: usize,
    pub policy: QueuePolicy,
    pub join_grace_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub prefix: String,
    pub format: OutputFormat,
    /// JPEG quality, ignored by lossless formats
    pub quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                width: 1920,
                height: 1280,
                fps: 50,
                seed: None,
            },
            pipeline: PipelineConfig {
                duration_secs: 300, // 5 minutes
                writers: 4,
                queue_capacity: 100,
                policy: QueuePolicy::Block,
                join_grace_secs: 60,
            },
            output: OutputConfig {
                dir: PathBuf::from("output"),
                prefix: "img".into(),
                format: OutputFormat::Bmp,
                quality: 90,
            },
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file, then `FRAME_RECORDER__*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(
        path: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }

        let settings = builder
            .add_source(env.separator("__").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run_settings().validate()?;
        if !(1..=100).contains(&self.output.quality) {
            return Err(ConfigError::InvalidQuality(self.output.quality));
        }
        Ok(())
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            width: self.source.width,
            height: self.source.height,
            target_fps: self.source.fps,
            duration: Duration::from_secs(self.pipeline.duration_secs),
            writers: self.pipeline.writers,
            queue_capacity: self.pipeline.queue_capacity,
            policy: self.pipeline.policy,
            join_grace: Duration::from_secs(self.pipeline.join_grace_secs),
        }
    }
}
