//! Task schedulers
//!
//! This module provides:
//! - [`FixedPoolScheduler`] - `worker_count` carriers draining one shared FIFO queue
//! - [`WorkStealingScheduler`] - `worker_count` carriers with local queues and stealing
//! - [`SchedulerFactory`] - builds either from a [`Strategy`]
//!
//! # Architecture
//!
//! ```text
//!            FixedPool                          WorkStealing
//! ┌───────────────────────────────┐  ┌───────────────────────────────┐
//! │   submit ──▶ [ FIFO queue ]   │  │  submit ──▶ [ inject queue ]  │
//! │          ┌─────┼─────┐        │  │        ┌─────┼─────┐          │
//! │          ▼     ▼     ▼        │  │        ▼     ▼     ▼          │
//! │        [c0]  [c1] ..[cN]      │  │     [c0|q] [c1|q]..[cN|q]     │
//! │   woken tasks re-enter the    │  │     idle carriers steal from  │
//! │   back of the shared queue    │  │     their neighbours' queues  │
//! └───────────────────────────────┘  └───────────────────────────────┘
//! ```
//!
//! Tasks are futures, so a task waiting on the network releases its
//! carrier instead of blocking it.

mod fixed;
mod stealing;

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tracing::debug;

pub use fixed::FixedPoolScheduler;
pub use stealing::WorkStealingScheduler;

use crate::config::Strategy;
use crate::error::HarnessError;

/// A unit of work handed to a scheduler
pub type Task = BoxFuture<'static, ()>;

/// An executor of lightweight tasks over a fixed set of carrier threads
pub trait TaskScheduler: Send + Sync {
    /// Strategy this scheduler implements
    fn strategy(&self) -> Strategy;

    /// Number of carrier threads
    fn worker_count(&self) -> usize;

    /// Admit one task. Fails once the scheduler has been shut down.
    fn submit(&self, task: Task) -> Result<(), HarnessError>;

    /// Whether the scheduler still accepts tasks
    fn is_running(&self) -> bool;

    /// Stop accepting tasks and join every carrier. Idempotent.
    ///
    /// Must not be called from inside an async context.
    fn shutdown(&self);
}

/// Builds schedulers from a strategy selector
pub struct SchedulerFactory;

impl SchedulerFactory {
    /// Reject worker counts no scheduler can honor
    pub fn validate(worker_count: usize) -> Result<(), HarnessError> {
        if worker_count < 1 {
            return Err(HarnessError::SchedulerInit(format!(
                "worker count must be at least 1, got {}",
                worker_count
            )));
        }
        Ok(())
    }

    /// Build a scheduler
    ///
    /// `io` is the runtime whose I/O and timer drivers serve carriers that
    /// have none of their own (the fixed pool).
    pub fn build(
        strategy: Strategy,
        worker_count: usize,
        io: &Handle,
    ) -> Result<Box<dyn TaskScheduler>, HarnessError> {
        Self::validate(worker_count)?;

        let scheduler: Box<dyn TaskScheduler> = match strategy {
            Strategy::FixedPool => Box::new(FixedPoolScheduler::new(worker_count, io.clone())?),
            Strategy::WorkStealing => Box::new(WorkStealingScheduler::new(worker_count)?),
        };

        debug!(%strategy, worker_count, "built scheduler");
        Ok(scheduler)
    }
}
