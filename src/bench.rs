//! Serial disk-write benchmark
//!
//! Generates frames one at a time on the calling thread and writes each to its
//! own file, timing only the encode-and-write step. Used to size the writer
//! pool before a real run.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::capture::{Frame, FrameSource};
use crate::error::{BenchError, ConfigError};
use crate::sink::{ImageFileSink, OutputFormat};
use crate::utils::format_byte_size;

/// Minimum number of images between progress lines
const MIN_PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskBench {
    pub count: usize,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: u8,
    pub dir: PathBuf,
    pub prefix: String,
}

impl Default for DiskBench {
    fn default() -> Self {
        Self {
            count: 1000,
            width: 1920,
            height: 1080,
            format: OutputFormat::Jpeg,
            quality: 90,
            dir: PathBuf::from("./tests_output"),
            prefix: "img".into(),
        }
    }
}

/// Write-time summary, in milliseconds per image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteTimes {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

impl WriteTimes {
    fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let ms: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1e3).collect();
        let min_ms = ms.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = ms.iter().copied().fold(0.0, f64::max);
        let avg_ms = ms.iter().sum::<f64>() / ms.len() as f64;
        Some(Self {
            min_ms,
            avg_ms,
            max_ms,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DiskBenchReport {
    pub attempted: usize,
    pub written: usize,
    /// Wall time for the whole loop, generation included
    pub total: Duration,
    pub times: WriteTimes,
    /// Size of the first image written in this run, used to approximate the
    /// total on disk
    pub first_file_size: Option<u64>,
}

impl DiskBenchReport {
    /// Images written per second of wall time
    pub fn images_per_second(&self) -> f64 {
        let secs = self.total.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.written as f64 / secs
    }

    pub fn approx_total_size(&self) -> Option<u64> {
        self.first_file_size.map(|size| size * self.written as u64)
    }
}

impl fmt::Display for DiskBenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Results ===")?;
        writeln!(f, "Images written: {}/{}", self.written, self.attempted)?;
        writeln!(f, "Total time: {:.2} s", self.total.as_secs_f64())?;
        writeln!(f, "Write time min: {:.2} ms", self.times.min_ms)?;
        writeln!(f, "Write time avg: {:.2} ms", self.times.avg_ms)?;
        writeln!(f, "Write time max: {:.2} ms", self.times.max_ms)?;
        writeln!(f, "Throughput: {:.2} images/s", self.images_per_second())?;
        if let (Some(first), Some(total)) = (self.first_file_size, self.approx_total_size()) {
            writeln!(f, "Approx. size per image: {}", format_byte_size(first))?;
            writeln!(f, "Approx. total size: {}", format_byte_size(total))?;
        }
        write!(f, "===============")
    }
}

impl DiskBench {
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.count == 0 {
            return Err(BenchError::InvalidCount);
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            }
            .into());
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::InvalidQuality(self.quality).into());
        }
        Ok(())
    }

    /// `<dir>/<prefix>_<index>.<ext>`, index starting at 1
    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("{}_{}.{}", self.prefix, index, self.format.extension()))
    }

    /// Run the benchmark. Failed writes are logged and skipped; the run fails
    /// only when nothing could be written.
    pub fn run<S: FrameSource>(&self, source: &mut S) -> Result<DiskBenchReport, BenchError> {
        self.validate()?;

        let sink = ImageFileSink::new(&self.dir, &self.prefix, self.format, self.quality);
        let interval = MIN_PROGRESS_INTERVAL.max(self.count / 10);
        let mut samples = Vec::with_capacity(self.count);
        let mut first_file_size = None;

        let start = Instant::now();
        for index in 1..=self.count {
            let data = source.generate(self.width, self.height);
            let frame = Frame::new(index as u64, self.width, self.height, data);
            let path = self.path_for(index);

            let write_start = Instant::now();
            match sink.write_to_path(&frame, &path) {
                Ok(size) => {
                    samples.push(write_start.elapsed());
                    first_file_size.get_or_insert(size);
                }
                Err(e) => error!("Failed to write image {}: {}", index, e),
            }

            if index % interval == 0 || index == self.count {
                info!(
                    "Progress: {}/{} ({:.1}%)",
                    index,
                    self.count,
                    index as f64 * 100.0 / self.count as f64
                );
            }
        }
        let total = start.elapsed();

        let times = WriteTimes::from_samples(&samples).ok_or(BenchError::NothingWritten {
            attempted: self.count,
        })?;

        Ok(DiskBenchReport {
            attempted: self.count,
            written: samples.len(),
            total,
            times,
            first_file_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::NoiseSource;
    use std::fs;

    fn bench_in(dir: &std::path::Path, count: usize, format: OutputFormat) -> DiskBench {
        DiskBench {
            count,
            width: 32,
            height: 24,
            format,
            dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let bench = DiskBench::default();
        assert_eq!(bench.count, 1000);
        assert_eq!((bench.width, bench.height), (1920, 1080));
        assert_eq!(bench.format, OutputFormat::Jpeg);
        assert_eq!(bench.path_for(1), PathBuf::from("./tests_output/img_1.jpg"));
    }

    #[test]
    fn test_writes_numbered_files() {
        let tmp = tempfile::tempdir().unwrap();
        let bench = bench_in(tmp.path(), 5, OutputFormat::Png);
        let report = bench.run(&mut NoiseSource::new(Some(3))).unwrap();

        assert_eq!(report.written, 5);
        assert_eq!(report.attempted, 5);
        for i in 1..=5 {
            assert!(tmp.path().join(format!("img_{i}.png")).exists());
        }
        assert!(!tmp.path().join("img_0.png").exists());

        assert!(report.times.min_ms <= report.times.avg_ms);
        assert!(report.times.avg_ms <= report.times.max_ms);

        let first = fs::metadata(tmp.path().join("img_1.png")).unwrap().len();
        assert_eq!(report.first_file_size, Some(first));
        assert_eq!(report.approx_total_size(), Some(first * 5));
        assert!(report.to_string().contains("Images written: 5/5"));
    }

    #[test]
    fn test_nothing_written_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let bench = bench_in(&tmp.path().join("missing"), 3, OutputFormat::Bmp);
        let err = bench.run(&mut NoiseSource::new(None)).unwrap_err();
        assert!(matches!(err, BenchError::NothingWritten { attempted: 3 }));
    }

    #[test]
    fn test_size_estimate_ignores_failed_first_write() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory in place of image 1 makes that write fail
        fs::create_dir(tmp.path().join("img_1.png")).unwrap();

        let bench = bench_in(tmp.path(), 3, OutputFormat::Png);
        let report = bench.run(&mut NoiseSource::new(Some(5))).unwrap();

        assert_eq!(report.written, 2);
        let second = fs::metadata(tmp.path().join("img_2.png")).unwrap().len();
        assert_eq!(report.first_file_size, Some(second));
        assert_eq!(report.approx_total_size(), Some(second * 2));
    }

    #[test]
    fn test_zero_count_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let bench = bench_in(tmp.path(), 0, OutputFormat::Bmp);
        assert!(matches!(bench.validate(), Err(BenchError::InvalidCount)));
    }

    #[test]
    fn test_write_time_summary() {
        let times = WriteTimes::from_samples(&[
            Duration::from_millis(2),
            Duration::from_millis(4),
            Duration::from_millis(6),
        ])
        .unwrap();
        assert!((times.min_ms - 2.0).abs() < 1e-9);
        assert!((times.avg_ms - 4.0).abs() < 1e-9);
        assert!((times.max_ms - 6.0).abs() < 1e-9);
        assert!(WriteTimes::from_samples(&[]).is_none());
    }
}
