//! Producer -> bounded queue -> writer pool
//!
//! Data flows from the [`RateLimitedProducer`] through the [`BoundedQueue`]
//! to the [`WorkerPool`]. Shutdown flows the other way: the [`Pipeline`]
//! finishes the queue, which wakes every blocked push and pop.

pub mod orchestrator;
pub mod producer;
pub mod queue;
pub mod stats;
pub mod worker;

pub use orchestrator::{Pipeline, RunSettings, MAX_WRITERS};
pub use producer::{ProducerSettings, RateLimitedProducer};
pub use queue::{BoundedQueue, QueueCounters, QueuePolicy};
pub use stats::{ProducerReport, RunReport, RunStatistics, StatsSnapshot, WorkerReport};
pub use worker::WorkerPool;
