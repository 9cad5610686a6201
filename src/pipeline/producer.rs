//! Rate-limited frame producer

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use super::queue::BoundedQueue;
use super::stats::{ProducerReport, RunStatistics};
use crate::capture::{Frame, FrameSource};

/// Pacing and frame geometry for one producer run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerSettings {
    pub width: u32,
    pub height: u32,
    /// Frames per second, must be non-zero
    pub target_fps: u32,
    pub duration: Duration,
}

impl ProducerSettings {
    /// Nominal time budget per frame
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}

/// Drives a [`FrameSource`] at a target cadence for a bounded wall-clock
/// duration, pushing every frame into the queue.
///
/// Pacing is best effort: when generating and pushing a frame takes longer
/// than the budget the producer simply runs slower. It never finishes the
/// queue itself; shutdown belongs to whoever owns the queue.
pub struct RateLimitedProducer<S> {
    source: S,
    queue: Arc<BoundedQueue<Frame>>,
    stats: Arc<RunStatistics>,
    settings: ProducerSettings,
}

impl<S: FrameSource> RateLimitedProducer<S> {
    pub fn new(
        source: S,
        queue: Arc<BoundedQueue<Frame>>,
        stats: Arc<RunStatistics>,
        settings: ProducerSettings,
    ) -> Self {
        Self {
            source,
            queue,
            stats,
            settings,
        }
    }

    #[instrument(name = "producer", skip_all)]
    pub fn run(mut self) -> ProducerReport {
        let ProducerSettings {
            width,
            height,
            target_fps,
            duration,
        } = self.settings;
        let budget = self.settings.frame_budget();

        info!(
            "Starting generator at {} FPS for {:.1} s ({}x{})",
            target_fps,
            duration.as_secs_f64(),
            width,
            height
        );

        let start = Instant::now();
        let mut report = ProducerReport::default();
        let mut sequence = 0u64;
        let mut last_logged_second = 0;

        while start.elapsed() < duration {
            let frame_start = Instant::now();

            let data = self.source.generate(width, height);
            let frame = Frame::new(sequence, width, height, data);
            sequence += 1;
            report.generated += 1;
            self.stats.record_generated();

            if !self.queue.push(frame) {
                debug!(
                    "Queue finished, stopping after {} frames",
                    report.generated
                );
                report.stopped_early = true;
                break;
            }
            report.enqueued += 1;
            self.stats.record_enqueued();

            // Never sleep past the end of the run
            if let Some(rest) = budget.checked_sub(frame_start.elapsed()) {
                thread::sleep(rest.min(duration.saturating_sub(start.elapsed())));
            }

            let elapsed = start.elapsed();
            if elapsed.as_secs() > last_logged_second {
                last_logged_second = elapsed.as_secs();
                info!(
                    "Generating: {:.2} FPS (queue: {})",
                    report.generated as f64 / elapsed.as_secs_f64(),
                    self.queue.size()
                );
            }
        }

        info!(
            "Generator done: {} generated, {} enqueued",
            report.generated, report.enqueued
        );
        report
    }
}
