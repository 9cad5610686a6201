//! Run statistics shared by the producer and the writer pool.
//!
//! Counters are bumped with relaxed atomics while the run is live and only
//! read for reporting after every task has joined.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam::utils::CachePadded;

use crate::utils::format_byte_size;

/// Aggregate counters for one pipeline run
#[derive(Default)]
pub struct RunStatistics {
    generated: CachePadded<AtomicU64>,
    enqueued: CachePadded<AtomicU64>,
    written: CachePadded<AtomicU64>,
    bytes_written: CachePadded<AtomicU64>,
    write_failures: CachePadded<AtomicU64>,
}

/// Point-in-time copy of [`RunStatistics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub generated: u64,
    pub enqueued: u64,
    pub written: u64,
    pub bytes_written: u64,
    pub write_failures: u64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_generated(&self) {
        self.generated.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("frames_generated").increment(1);
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("frames_enqueued").increment(1);
    }

    pub fn record_written(&self, bytes: u64) {
        self.written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        metrics::counter!("frames_written").increment(1);
        metrics::counter!("bytes_written").increment(bytes);
    }

    pub fn record_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("write_failures").increment(1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            generated: self.generated.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Totals for a single writer, returned when its task terminates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// 1-based writer id, also embedded in output names
    pub worker_id: usize,
    pub written: u64,
    pub bytes_written: u64,
    pub failures: u64,
}

/// Totals for the producer task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    pub generated: u64,
    pub enqueued: u64,
    /// Set when a push was refused because the queue had already finished
    pub stopped_early: bool,
}

/// Final statistics of a joined run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Run clock: start until the queue was finished
    pub run_time: Duration,
    /// Start until every task joined, including the backlog drain
    pub elapsed: Duration,
    pub totals: StatsSnapshot,
    /// Items evicted by a drop-oldest queue
    pub evicted: u64,
    pub producer: ProducerReport,
    pub workers: Vec<WorkerReport>,
}

impl RunReport {
    /// Average generation rate in frames per second
    pub fn average_fps(&self) -> f64 {
        per_second(self.totals.generated, self.run_time)
    }

    /// Average written frames per second
    pub fn write_rate(&self) -> f64 {
        per_second(self.totals.written, self.elapsed)
    }

    /// Bytes persisted per second
    pub fn throughput(&self) -> f64 {
        per_second(self.totals.bytes_written, self.elapsed)
    }

    /// Frames accepted by the queue that were neither written nor reported as failed
    pub fn unaccounted(&self) -> u64 {
        self.totals
            .enqueued
            .saturating_sub(self.totals.written + self.totals.write_failures + self.evicted)
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    count as f64 / secs
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Final Results ===")?;
        writeln!(f, "Run time: {:.2} s", self.run_time.as_secs_f64())?;
        writeln!(f, "Elapsed (with drain): {:.2} s", self.elapsed.as_secs_f64())?;
        writeln!(f, "Frames generated: {}", self.totals.generated)?;
        writeln!(f, "Frames enqueued: {}", self.totals.enqueued)?;
        writeln!(f, "Frames written: {}", self.totals.written)?;
        if self.totals.write_failures > 0 {
            writeln!(f, "Write failures: {}", self.totals.write_failures)?;
        }
        if self.evicted > 0 {
            writeln!(f, "Frames evicted: {}", self.evicted)?;
        }
        writeln!(f, "Average rate: {:.2} FPS", self.average_fps())?;
        writeln!(
            f,
            "Data written: {}",
            format_byte_size(self.totals.bytes_written)
        )?;
        writeln!(
            f,
            "Write throughput: {}/s",
            format_byte_size(self.throughput() as u64)
        )?;
        for worker in &self.workers {
            writeln!(
                f,
                "  writer #{}: {} frames, {}",
                worker.worker_id,
                worker.written,
                format_byte_size(worker.bytes_written)
            )?;
        }
        write!(f, "=====================")
    }
}
