//! Frame sinks: encode a frame and persist it

use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::capture::Frame;
use crate::error::{ConfigError, SinkError};

/// Unique name for one written frame, derived from the frame's sequence
/// number and the writer that popped it. Writers never share a naming counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId {
    pub sequence: u64,
    pub worker: usize,
}

impl OutputId {
    pub fn new(sequence: u64, worker: usize) -> Self {
        Self { sequence, worker }
    }

    /// `<prefix>_<sequence:08>_t<worker>.<ext>`
    pub fn file_name(&self, prefix: &str, format: OutputFormat) -> String {
        format!(
            "{}_{:08}_t{}.{}",
            prefix,
            self.sequence,
            self.worker,
            format.extension()
        )
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}_t{}", self.sequence, self.worker)
    }
}

/// Persists frames. Called concurrently from every writer thread with distinct
/// [`OutputId`]s; implementations keep no mutable state across calls.
///
/// Returns the number of bytes persisted. An error drops that one frame only.
pub trait FrameSink: Send + Sync {
    fn write(&self, frame: &Frame, id: OutputId) -> Result<u64, SinkError>;
}

impl<F> FrameSink for F
where
    F: Fn(&Frame, OutputId) -> Result<u64, SinkError> + Send + Sync,
{
    fn write(&self, frame: &Frame, id: OutputId) -> Result<u64, SinkError> {
        self(frame, id)
    }
}

/// Encodings the file sink can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
    Png,
    Bmp,
    #[serde(alias = "tif")]
    Tiff,
    #[serde(alias = "pnm")]
    Ppm,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Ppm => "ppm",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Bmp => ImageFormat::Bmp,
            OutputFormat::Tiff => ImageFormat::Tiff,
            OutputFormat::Ppm => ImageFormat::Pnm,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "bmp" => Ok(Self::Bmp),
            "tif" | "tiff" => Ok(Self::Tiff),
            "ppm" | "pnm" => Ok(Self::Ppm),
            _ => Err(ConfigError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encode a packed RGB24 frame into memory
fn encode(
    frame: &Frame,
    format: OutputFormat,
    quality: u8,
    path: &Path,
) -> Result<Vec<u8>, SinkError> {
    let meta = &frame.meta;
    let expected = meta.format.frame_len(meta.width, meta.height);
    if frame.data.len() != expected {
        return Err(SinkError::FrameSize {
            sequence: meta.sequence,
            expected,
            actual: frame.data.len(),
        });
    }

    let mut out = Cursor::new(Vec::with_capacity(expected / 2));
    let result = match format {
        OutputFormat::Jpeg => JpegEncoder::new_with_quality(&mut out, quality).encode(
            &frame.data,
            meta.width,
            meta.height,
            ExtendedColorType::Rgb8,
        ),
        _ => image::write_buffer_with_format(
            &mut out,
            &frame.data,
            meta.width,
            meta.height,
            ExtendedColorType::Rgb8,
            format.image_format(),
        ),
    };
    result.map_err(|source| SinkError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(out.into_inner())
}

/// Writes each frame to its own image file
#[derive(Debug, Clone)]
pub struct ImageFileSink {
    dir: PathBuf,
    prefix: String,
    format: OutputFormat,
    quality: u8,
}

impl ImageFileSink {
    pub fn new(
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        format: OutputFormat,
        quality: u8,
    ) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            format,
            quality,
        }
    }

    pub fn path_for(&self, id: OutputId) -> PathBuf {
        self.dir.join(id.file_name(&self.prefix, self.format))
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Encode `frame` to an explicit path; returns the size of the file on disk
    pub fn write_to_path(&self, frame: &Frame, path: &Path) -> Result<u64, SinkError> {
        let encoded = encode(frame, self.format, self.quality, path)?;
        let io_err = |source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        };

        fs::write(path, &encoded).map_err(io_err)?;
        let size = fs::metadata(path).map_err(io_err)?.len();
        trace!("Wrote {} ({} bytes)", path.display(), size);
        Ok(size)
    }
}

impl FrameSink for ImageFileSink {
    fn write(&self, frame: &Frame, id: OutputId) -> Result<u64, SinkError> {
        self.write_to_path(frame, &self.path_for(id))
    }
}

/// Encodes frames and discards the output. Isolates encoder cost from disk I/O.
#[derive(Debug, Clone, Copy)]
pub struct MemorySink {
    format: OutputFormat,
    quality: u8,
}

impl MemorySink {
    pub fn new(format: OutputFormat, quality: u8) -> Self {
        Self { format, quality }
    }
}

impl FrameSink for MemorySink {
    fn write(&self, frame: &Frame, id: OutputId) -> Result<u64, SinkError> {
        let label = PathBuf::from(id.to_string());
        let encoded = encode(frame, self.format, self.quality, &label)?;
        Ok(encoded.len() as u64)
    }
}
