//! Work-stealing carrier pool
//!
//! Backed by a dedicated multi-thread tokio runtime: each carrier owns a
//! local run queue and idle carriers steal from busy ones.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::{Task, TaskScheduler};
use crate::config::Strategy;
use crate::error::HarnessError;

/// How long shutdown waits for carriers to park before detaching them
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Work-stealing scheduler with `worker_count` carriers
pub struct WorkStealingScheduler {
    worker_count: usize,
    runtime: Mutex<Option<Runtime>>,
}

impl WorkStealingScheduler {
    pub fn new(worker_count: usize) -> Result<Self, HarnessError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_count)
            .thread_name("steal-carrier")
            .enable_all()
            .build()
            .map_err(|e| HarnessError::SchedulerInit(format!("failed to start runtime: {}", e)))?;

        Ok(Self {
            worker_count,
            runtime: Mutex::new(Some(runtime)),
        })
    }
}

impl TaskScheduler for WorkStealingScheduler {
    fn strategy(&self) -> Strategy {
        Strategy::WorkStealing
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn submit(&self, task: Task) -> Result<(), HarnessError> {
        match self.runtime.lock().as_ref() {
            Some(runtime) => {
                // Outcomes are reported by the task itself; the handle is not needed
                drop(runtime.spawn(task));
                Ok(())
            }
            None => Err(HarnessError::Dispatch {
                submitted: 0,
                reason: "work-stealing pool is shut down".to_string(),
            }),
        }
    }

    fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }

    fn shutdown(&self) {
        let Some(runtime) = self.runtime.lock().take() else {
            return;
        };

        if tokio::runtime::Handle::try_current().is_ok() {
            warn!("work-stealing pool shut down from async context; detaching carriers");
            runtime.shutdown_background();
        } else {
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }

        debug!(worker_count = self.worker_count, "work-stealing pool stopped");
    }
}

impl Drop for WorkStealingScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
