//! Error types for the recorder pipeline.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Invalid or unloadable configuration. Detected before any task starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("target fps must be greater than 0 (got {0})")]
    InvalidFps(u32),

    #[error("run duration must be greater than 0")]
    InvalidDuration,

    #[error("writer count must be between 1 and {max} (got {value})")]
    InvalidWriters { value: usize, max: usize },

    #[error("join grace period must be greater than 0")]
    InvalidJoinGrace,

    #[error("queue capacity must be greater than 0")]
    InvalidCapacity,

    #[error("frame dimensions must be positive (got {width}x{height})")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("JPEG quality must be between 1 and 100 (got {0})")]
    InvalidQuality(u8),

    #[error("unknown queue policy '{0}' (expected 'block' or 'drop_oldest')")]
    UnknownPolicy(String),

    #[error("unsupported output format '{0}'")]
    UnsupportedFormat(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Per-item failure reported by a frame sink. Never fatal to the pipeline.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("frame {sequence} has {actual} bytes, expected {expected}")]
    FrameSize {
        sequence: u64,
        expected: usize,
        actual: usize,
    },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures of a whole pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to spawn pipeline thread: {0}")]
    Spawn(#[source] io::Error),

    /// A task did not observe queue shutdown in time. This is a missed
    /// termination signal, not a slow disk.
    #[error("tasks still running {grace:?} after shutdown: {}", pending.join(", "))]
    JoinTimeout {
        pending: Vec<String>,
        grace: Duration,
    },

    #[error("task '{0}' panicked")]
    TaskPanicked(String),
}

/// Failures of the single-threaded disk benchmark.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("image count must be greater than 0")]
    InvalidCount,

    #[error("no image could be written ({attempted} attempted)")]
    NothingWritten { attempted: usize },
}

/// Why a timed pop returned without an item.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopError {
    #[error("queue is finished and drained")]
    Finished,

    #[error("timed out waiting for an item")]
    Timeout,
}
