//! Fixed pool of writer threads draining the frame queue

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, info, instrument};

use super::orchestrator::ExitSignal;
use super::queue::BoundedQueue;
use super::stats::{RunStatistics, WorkerReport};
use crate::capture::Frame;
use crate::error::PipelineError;
use crate::sink::{FrameSink, OutputId};

/// Successful writes between per-writer progress lines
const PROGRESS_INTERVAL: u64 = 100;

pub(crate) fn writer_task_name(worker_id: usize) -> String {
    format!("writer-{worker_id}")
}

/// Writer threads, each looping `pop()` until the queue is finished and
/// drained. Writer ids start at 1.
pub struct WorkerPool {
    handles: Vec<(usize, JoinHandle<WorkerReport>)>,
}

impl WorkerPool {
    pub fn spawn(
        count: usize,
        queue: Arc<BoundedQueue<Frame>>,
        sink: Arc<dyn FrameSink>,
        stats: Arc<RunStatistics>,
    ) -> Result<Self, PipelineError> {
        Self::spawn_inner(count, queue, sink, stats, None)
    }

    /// Like [`spawn`](Self::spawn), but every writer announces its exit on
    /// `exits` (also when it panics).
    pub(crate) fn spawn_notifying(
        count: usize,
        queue: Arc<BoundedQueue<Frame>>,
        sink: Arc<dyn FrameSink>,
        stats: Arc<RunStatistics>,
        exits: flume::Sender<String>,
    ) -> Result<Self, PipelineError> {
        Self::spawn_inner(count, queue, sink, stats, Some(exits))
    }

    fn spawn_inner(
        count: usize,
        queue: Arc<BoundedQueue<Frame>>,
        sink: Arc<dyn FrameSink>,
        stats: Arc<RunStatistics>,
        exits: Option<flume::Sender<String>>,
    ) -> Result<Self, PipelineError> {
        let mut handles = Vec::with_capacity(count);

        for worker_id in 1..=count {
            let name = writer_task_name(worker_id);
            let signal = exits
                .as_ref()
                .map(|tx| ExitSignal::new(name.clone(), tx.clone()));
            let queue = Arc::clone(&queue);
            let sink = Arc::clone(&sink);
            let stats = Arc::clone(&stats);

            let handle = thread::Builder::new()
                .name(name)
                .spawn(move || {
                    let _signal = signal;
                    run_writer(worker_id, &queue, sink.as_ref(), &stats)
                })
                .map_err(PipelineError::Spawn)?;
            handles.push((worker_id, handle));
        }

        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every writer and collect its totals, ordered by writer id
    pub fn join(self) -> Result<Vec<WorkerReport>, PipelineError> {
        self.handles
            .into_iter()
            .map(|(worker_id, handle)| {
                handle
                    .join()
                    .map_err(|_| PipelineError::TaskPanicked(writer_task_name(worker_id)))
            })
            .collect()
    }
}

#[instrument(name = "writer", skip(queue, sink, stats))]
fn run_writer(
    worker_id: usize,
    queue: &BoundedQueue<Frame>,
    sink: &dyn FrameSink,
    stats: &RunStatistics,
) -> WorkerReport {
    info!("Writer #{} started", worker_id);
    let mut report = WorkerReport {
        worker_id,
        ..Default::default()
    };

    while let Some(frame) = queue.pop() {
        let id = OutputId::new(frame.sequence(), worker_id);
        match sink.write(&frame, id) {
            Ok(bytes) => {
                report.written += 1;
                report.bytes_written += bytes;
                stats.record_written(bytes);

                if report.written % PROGRESS_INTERVAL == 0 {
                    info!("Writer #{} has written {} frames", worker_id, report.written);
                }
            }
            Err(e) => {
                report.failures += 1;
                stats.record_failure();
                error!("Writer #{} dropped frame {}: {}", worker_id, id, e);
            }
        }
    }

    info!(
        "Writer #{} finished. Total: {} frames",
        worker_id, report.written
    );
    report
}
