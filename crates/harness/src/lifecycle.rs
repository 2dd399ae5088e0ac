//! Invocation lifecycle
//!
//! One call to [`InvocationLifecycle::run`] is one measured unit:
//!
//! ```text
//! Idle ─▶ PoolOpening ─▶ SchedulerBuilding ─▶ Dispatching ─▶ TearingDown ─▶ Done
//!   │          │                 │                  │              │
//!   └──────────┴─────────────────┴──────────────────┴──────────────┴──▶ Failed
//! ```
//!
//! Everything the invocation creates (control runtime, pool, scheduler)
//! is owned by the call and gone before it returns.

use std::fmt;

use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::{debug, instrument, warn};

use crate::config::HarnessConfig;
use crate::dispatch::{BatchResult, TaskDispatcher};
use crate::error::HarnessError;
use crate::pool::{ConnectionPool, ConnectionPoolManager};
use crate::scheduler::{SchedulerFactory, TaskScheduler};

/// Stages of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    PoolOpening,
    SchedulerBuilding,
    Dispatching,
    TearingDown,
    Done,
    Failed,
}

impl LifecycleState {
    /// Whether the invocation has finished
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::PoolOpening => write!(f, "pool_opening"),
            Self::SchedulerBuilding => write!(f, "scheduler_building"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::TearingDown => write!(f, "tearing_down"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Orchestrates setup, dispatch and teardown for one invocation
///
/// # Example
///
/// ```ignore
/// use dispatchbench_harness::{HarnessConfig, InvocationLifecycle, Strategy};
///
/// let config = HarnessConfig::from_env()?
///     .with_strategy(Strategy::WorkStealing)
///     .with_worker_count(100);
///
/// let batch = InvocationLifecycle::run(&config)?;
/// println!("{} ok, {} failed in {:?}", batch.succeeded, batch.failed, batch.elapsed);
/// ```
pub struct InvocationLifecycle {
    config: HarnessConfig,
    trail: Vec<LifecycleState>,
    scheduler_hook: Option<SchedulerHook>,
}

/// Builds the scheduler in place of [`SchedulerFactory`]
type SchedulerHook =
    Box<dyn FnOnce(&ConnectionPool) -> Result<Box<dyn TaskScheduler>, HarnessError> + Send>;

impl InvocationLifecycle {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            trail: vec![LifecycleState::Idle],
            scheduler_hook: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_scheduler_hook<H>(mut self, hook: H) -> Self
    where
        H: FnOnce(&ConnectionPool) -> Result<Box<dyn TaskScheduler>, HarnessError> + Send + 'static,
    {
        self.scheduler_hook = Some(Box::new(hook));
        self
    }

    /// Run one complete invocation with a fresh lifecycle
    pub fn run(config: &HarnessConfig) -> Result<BatchResult, HarnessError> {
        Self::new(config.clone()).execute()
    }

    /// Current stage
    pub fn state(&self) -> LifecycleState {
        self.trail
            .last()
            .copied()
            .unwrap_or(LifecycleState::Idle)
    }

    /// Every stage visited, in order
    pub fn trail(&self) -> &[LifecycleState] {
        &self.trail
    }

    /// Drive the invocation to a terminal state
    ///
    /// Blocks the calling thread. Must not be called from inside an async
    /// context. A lifecycle executes once; later calls fail fast.
    #[instrument(skip(self), fields(
        strategy = %self.config.strategy,
        requests = self.config.request_count,
        workers = self.config.worker_count,
    ))]
    pub fn execute(&mut self) -> Result<BatchResult, HarnessError> {
        if self.state() != LifecycleState::Idle {
            return Err(HarnessError::Config(format!(
                "lifecycle already ran (state: {})",
                self.state()
            )));
        }

        let result = self.drive();
        match &result {
            Ok(batch) => {
                self.transition(LifecycleState::Done);
                debug!(
                    succeeded = batch.succeeded,
                    failed = batch.failed,
                    elapsed_us = batch.elapsed.as_micros() as u64,
                    "invocation complete"
                );
            }
            Err(e) => {
                self.transition(LifecycleState::Failed);
                warn!(error = %e, "invocation failed");
            }
        }
        result
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!(from = %self.state(), to = %next, "lifecycle transition");
        self.trail.push(next);
    }

    fn drive(&mut self) -> Result<BatchResult, HarnessError> {
        self.config.validate()?;

        let control = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let manager = ConnectionPoolManager::new(self.config.pool.clone());

        self.transition(LifecycleState::PoolOpening);
        let pool = control.block_on(manager.open(&self.config.target))?;

        self.transition(LifecycleState::SchedulerBuilding);
        let built = match self.scheduler_hook.take() {
            Some(hook) => hook(&pool),
            None => SchedulerFactory::build(
                self.config.strategy,
                self.config.worker_count,
                control.handle(),
            ),
        };
        let scheduler = match built {
            Ok(scheduler) => scheduler,
            Err(e) => {
                self.transition(LifecycleState::TearingDown);
                if let Err(teardown) = close_pool(&control, &manager, pool) {
                    warn!(error = %teardown, "pool teardown failed after scheduler init error");
                }
                return Err(e);
            }
        };

        self.transition(LifecycleState::Dispatching);
        let dispatched = control.block_on(
            TaskDispatcher::new(scheduler.as_ref(), &pool).run_batch(self.config.request_count),
        );

        self.transition(LifecycleState::TearingDown);
        let torn_down = teardown(&control, &manager, pool, scheduler);
        drop(control);

        let mut batch = dispatched?;
        if let Err(e) = torn_down {
            batch.teardown_error = Some(e.to_string());
        }
        Ok(batch)
    }
}

/// Close the pool, then stop the scheduler
///
/// The pool closes first: connections opened on work-stealing carriers are
/// driven by that scheduler's runtime until it stops.
fn teardown(
    control: &Runtime,
    manager: &ConnectionPoolManager,
    pool: ConnectionPool,
    scheduler: Box<dyn TaskScheduler>,
) -> Result<(), HarnessError> {
    let closed = close_pool(control, manager, pool);
    scheduler.shutdown();
    if let Err(e) = &closed {
        warn!(error = %e, "pool teardown reported an error");
    }
    closed
}

fn close_pool(
    control: &Runtime,
    manager: &ConnectionPoolManager,
    pool: ConnectionPool,
) -> Result<(), HarnessError> {
    control.block_on(manager.close(pool))
}
