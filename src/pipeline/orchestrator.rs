//! End-to-end run: one producer, N writers, one queue, one clock

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use super::producer::{ProducerSettings, RateLimitedProducer};
use super::queue::{BoundedQueue, QueuePolicy};
use super::stats::{RunReport, RunStatistics};
use super::worker::{writer_task_name, WorkerPool};
use crate::capture::{Frame, FrameSource};
use crate::error::{ConfigError, PipelineError};
use crate::sink::FrameSink;

/// Upper bound on concurrent writers
pub const MAX_WRITERS: usize = 7;

const PRODUCER_TASK: &str = "producer";

/// Announces a task's exit to the orchestrator when dropped, which also
/// covers a task that unwinds from a panic.
pub(crate) struct ExitSignal {
    name: String,
    tx: flume::Sender<String>,
}

impl ExitSignal {
    pub(crate) fn new(name: String, tx: flume::Sender<String>) -> Self {
        Self { name, tx }
    }
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        // The orchestrator may already have given up on us
        let _ = self.tx.send(std::mem::take(&mut self.name));
    }
}

/// Everything the orchestrator needs for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// Authoritative run clock; the queue is finished when it elapses
    pub duration: Duration,
    pub writers: usize,
    pub queue_capacity: usize,
    pub policy: QueuePolicy,
    /// How long tasks get to terminate after the queue is finished
    pub join_grace: Duration,
}

impl RunSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_fps == 0 {
            return Err(ConfigError::InvalidFps(self.target_fps));
        }
        if self.duration.is_zero() {
            return Err(ConfigError::InvalidDuration);
        }
        if self.writers == 0 || self.writers > MAX_WRITERS {
            return Err(ConfigError::InvalidWriters {
                value: self.writers,
                max: MAX_WRITERS,
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        if self.join_grace.is_zero() {
            return Err(ConfigError::InvalidJoinGrace);
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn producer_settings(&self) -> ProducerSettings {
        ProducerSettings {
            width: self.width,
            height: self.height,
            target_fps: self.target_fps,
            duration: self.duration,
        }
    }
}

/// Owns one run of the frame pipeline
pub struct Pipeline {
    settings: RunSettings,
}

impl Pipeline {
    /// Rejects invalid settings before anything is spawned
    pub fn new(settings: RunSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run the producer and the writer pool for the configured duration,
    /// finish the queue, and wait for every task to terminate.
    ///
    /// Fails with [`PipelineError::JoinTimeout`] if any task is still running
    /// `join_grace` after the queue was finished.
    #[instrument(name = "pipeline", skip_all)]
    pub fn run<S, K>(&self, source: S, sink: K) -> Result<RunReport, PipelineError>
    where
        S: FrameSource + 'static,
        K: FrameSink + 'static,
    {
        let settings = &self.settings;
        let queue = Arc::new(BoundedQueue::<Frame>::with_policy(
            settings.queue_capacity,
            settings.policy,
        ));
        let stats = Arc::new(RunStatistics::new());
        let (exit_tx, exit_rx) = flume::unbounded();

        info!(
            "Starting pipeline: {} writers, queue capacity {} ({:?})",
            settings.writers, settings.queue_capacity, settings.policy
        );
        let start = Instant::now();

        let producer = RateLimitedProducer::new(
            source,
            Arc::clone(&queue),
            Arc::clone(&stats),
            settings.producer_settings(),
        );
        let signal = ExitSignal::new(PRODUCER_TASK.to_string(), exit_tx.clone());
        let producer = thread::Builder::new()
            .name(PRODUCER_TASK.to_string())
            .spawn(move || {
                let _signal = signal;
                producer.run()
            })
            .map_err(PipelineError::Spawn)?;

        let workers = match WorkerPool::spawn_notifying(
            settings.writers,
            Arc::clone(&queue),
            Arc::new(sink),
            Arc::clone(&stats),
            exit_tx,
        ) {
            Ok(workers) => workers,
            Err(e) => {
                // Release whatever did start
                queue.finish();
                return Err(e);
            }
        };

        thread::sleep(settings.duration.saturating_sub(start.elapsed()));
        let run_time = start.elapsed();
        info!(
            "Run time complete, finishing queue ({} pending)",
            queue.size()
        );
        queue.finish();

        let mut pending: Vec<String> = std::iter::once(PRODUCER_TASK.to_string())
            .chain((1..=settings.writers).map(writer_task_name))
            .collect();
        await_exits(&exit_rx, &mut pending, settings.join_grace)?;

        let producer = producer
            .join()
            .map_err(|_| PipelineError::TaskPanicked(PRODUCER_TASK.to_string()))?;
        let workers = workers.join()?;
        let elapsed = start.elapsed();

        let report = RunReport {
            run_time,
            elapsed,
            totals: stats.snapshot(),
            evicted: queue.counters().evicted,
            producer,
            workers,
        };
        if report.unaccounted() > 0 {
            warn!("{} enqueued frames unaccounted for", report.unaccounted());
        }
        Ok(report)
    }
}

/// Wait until every named task has announced its exit or the grace period runs out
fn await_exits(
    exits: &flume::Receiver<String>,
    pending: &mut Vec<String>,
    grace: Duration,
) -> Result<(), PipelineError> {
    let deadline = Instant::now() + grace;
    while !pending.is_empty() {
        match exits.recv_deadline(deadline) {
            Ok(name) => pending.retain(|task| *task != name),
            Err(_) => {
                return Err(PipelineError::JoinTimeout {
                    pending: std::mem::take(pending),
                    grace,
                })
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::PatternSource;
    use crate::error::SinkError;
    use crate::sink::OutputId;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn settings() -> RunSettings {
        RunSettings {
            width: 16,
            height: 8,
            target_fps: 200,
            duration: Duration::from_millis(300),
            writers: 3,
            queue_capacity: 5,
            policy: QueuePolicy::Block,
            join_grace: Duration::from_secs(5),
        }
    }

    fn rejected(bad: RunSettings) -> ConfigError {
        Pipeline::new(bad).err().expect("settings should be rejected")
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let fps = rejected(RunSettings {
            target_fps: 0,
            ..settings()
        });
        assert!(matches!(fps, ConfigError::InvalidFps(0)));

        let duration = rejected(RunSettings {
            duration: Duration::ZERO,
            ..settings()
        });
        assert!(matches!(duration, ConfigError::InvalidDuration));

        let none = rejected(RunSettings {
            writers: 0,
            ..settings()
        });
        assert!(matches!(none, ConfigError::InvalidWriters { value: 0, .. }));

        let too_many = rejected(RunSettings {
            writers: MAX_WRITERS + 1,
            ..settings()
        });
        assert!(matches!(
            too_many,
            ConfigError::InvalidWriters { value: 8, max: 7 }
        ));

        let capacity = rejected(RunSettings {
            queue_capacity: 0,
            ..settings()
        });
        assert!(matches!(capacity, ConfigError::InvalidCapacity));

        // Tasks cannot report their exit in zero time
        let grace = rejected(RunSettings {
            join_grace: Duration::ZERO,
            ..settings()
        });
        assert!(matches!(grace, ConfigError::InvalidJoinGrace));

        let dims = rejected(RunSettings {
            height: 0,
            ..settings()
        });
        assert!(matches!(dims, ConfigError::InvalidDimensions { .. }));

        assert!(Pipeline::new(settings()).is_ok());
    }

    #[test]
    fn test_every_enqueued_frame_is_written_once() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&written);
        let sink = move |frame: &Frame, id: OutputId| -> Result<u64, SinkError> {
            log.lock().push(id);
            Ok(frame.data.len() as u64)
        };

        let report = Pipeline::new(settings())
            .unwrap()
            .run(PatternSource::new(), sink)
            .unwrap();

        let totals = report.totals;
        assert!(totals.generated > 0);
        assert_eq!(totals.written, totals.enqueued);
        assert_eq!(
            totals.generated,
            totals.enqueued + u64::from(report.producer.stopped_early)
        );
        assert_eq!(totals.bytes_written, totals.written * 16 * 8 * 3);
        assert_eq!(
            report.workers.iter().map(|w| w.written).sum::<u64>(),
            totals.written
        );
        assert_eq!(report.unaccounted(), 0);

        let ids = written.lock();
        let sequences: HashSet<u64> = ids.iter().map(|id| id.sequence).collect();
        assert_eq!(sequences.len(), ids.len(), "a frame was written twice");
        assert_eq!(sequences, (0..totals.enqueued).collect::<HashSet<u64>>());
    }

    #[test]
    fn test_slow_writer_drains_backlog_after_finish() {
        let sink = |frame: &Frame, _id: OutputId| -> Result<u64, SinkError> {
            thread::sleep(Duration::from_millis(10));
            Ok(frame.data.len() as u64)
        };
        let run = RunSettings {
            writers: 1,
            queue_capacity: 50,
            duration: Duration::from_millis(200),
            ..settings()
        };

        let report = Pipeline::new(run).unwrap().run(PatternSource::new(), sink).unwrap();

        assert_eq!(report.totals.written, report.totals.enqueued);
        assert!(report.elapsed >= report.run_time);
        assert!(report.run_time >= Duration::from_millis(200));
    }

    #[test]
    fn test_sink_failures_are_counted_not_fatal() {
        let sink = |frame: &Frame, id: OutputId| -> Result<u64, SinkError> {
            if frame.sequence() % 5 == 0 {
                return Err(SinkError::Io {
                    path: PathBuf::from(id.to_string()),
                    source: std::io::Error::other("injected"),
                });
            }
            Ok(1)
        };

        let report = Pipeline::new(settings())
            .unwrap()
            .run(PatternSource::new(), sink)
            .unwrap();

        let totals = report.totals;
        assert!(totals.write_failures > 0);
        assert_eq!(totals.written + totals.write_failures, totals.enqueued);
        assert!(totals.written <= totals.generated);
    }

    #[test]
    fn test_drop_oldest_accounts_for_evictions() {
        let sink = |_frame: &Frame, _id: OutputId| -> Result<u64, SinkError> {
            thread::sleep(Duration::from_millis(20));
            Ok(1)
        };
        let run = RunSettings {
            writers: 1,
            queue_capacity: 2,
            target_fps: 500,
            policy: QueuePolicy::DropOldest,
            ..settings()
        };

        let report = Pipeline::new(run).unwrap().run(PatternSource::new(), sink).unwrap();

        assert!(report.evicted > 0);
        assert_eq!(
            report.totals.written + report.evicted,
            report.totals.enqueued
        );
    }

    #[test]
    fn test_stuck_writer_is_reported() {
        let sink = |_frame: &Frame, _id: OutputId| -> Result<u64, SinkError> {
            thread::sleep(Duration::from_millis(1_500));
            Ok(1)
        };
        let run = RunSettings {
            writers: 1,
            queue_capacity: 1,
            duration: Duration::from_millis(50),
            join_grace: Duration::from_millis(100),
            ..settings()
        };

        let err = Pipeline::new(run)
            .unwrap()
            .run(PatternSource::new(), sink)
            .unwrap_err();
        match err {
            PipelineError::JoinTimeout { pending, .. } => {
                assert_eq!(pending, vec!["writer-1".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_panicking_writer_is_reported() {
        let sink = |_frame: &Frame, _id: OutputId| -> Result<u64, SinkError> {
            panic!("sink exploded");
        };
        let run = RunSettings {
            writers: 1,
            duration: Duration::from_millis(50),
            ..settings()
        };

        let err = Pipeline::new(run)
            .unwrap()
            .run(PatternSource::new(), sink)
            .unwrap_err();
        assert!(matches!(err, PipelineError::TaskPanicked(name) if name == "writer-1"));
    }

    #[test]
    fn test_await_exits_times_out_with_pending_names() {
        let (tx, rx) = flume::unbounded();
        tx.send("writer-1".to_string()).unwrap();

        let mut pending = vec!["writer-1".to_string(), "writer-2".to_string()];
        let err = await_exits(&rx, &mut pending, Duration::from_millis(20)).unwrap_err();
        assert!(
            matches!(err, PipelineError::JoinTimeout { pending, .. } if pending == vec!["writer-2".to_string()])
        );
    }
}
