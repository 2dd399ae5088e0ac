//! Batch fan-out and join
//!
//! [`TaskDispatcher`] turns a request count into that many lightweight
//! tasks, submits all of them to the active scheduler at once, and waits
//! for every one to report a terminal outcome.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;
use sqlx::Row;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::error::{HarnessError, TaskError};
use crate::pool::ConnectionPool;
use crate::scheduler::TaskScheduler;

/// Full-table scan each task executes
pub const USERS_QUERY: &str = "SELECT id, username, email FROM users";

/// Scalar fields read from the first returned row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Result of one task that reached the database and got a response
pub type TaskResult = Result<Option<UserRecord>, TaskError>;

/// Aggregate outcome of one batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    /// Tasks that completed their query
    pub succeeded: usize,

    /// Tasks that reached a failed terminal state
    pub failed: usize,

    /// Every captured task failure, in completion order
    pub failures: Vec<TaskError>,

    /// First decoded row seen by any task
    pub sample: Option<UserRecord>,

    /// Dispatch window: first submit to last outcome, excluding lease return
    #[serde(rename = "elapsed_micros", serialize_with = "micros")]
    pub elapsed: Duration,

    /// Pool teardown problem reported after the batch completed
    pub teardown_error: Option<String>,
}

impl BatchResult {
    /// Number of terminal outcomes observed
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    fn record(&mut self, result: TaskResult) {
        match result {
            Ok(row) => {
                self.succeeded += 1;
                if self.sample.is_none() {
                    self.sample = row;
                }
            }
            Err(error) => {
                debug!(%error, "task failed");
                self.failed += 1;
                self.failures.push(error);
            }
        }
    }
}

fn micros<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_micros() as u64)
}

/// Fans a batch of query tasks out over a scheduler
pub struct TaskDispatcher<'a> {
    scheduler: &'a dyn TaskScheduler,
    pool: &'a ConnectionPool,
}

impl<'a> TaskDispatcher<'a> {
    pub fn new(scheduler: &'a dyn TaskScheduler, pool: &'a ConnectionPool) -> Self {
        Self { scheduler, pool }
    }

    /// Run `request_count` copies of the users query
    pub async fn run_batch(&self, request_count: usize) -> Result<BatchResult, HarnessError> {
        self.run_batch_with(request_count, fetch_first_user).await
    }

    /// Run `request_count` tasks, each executing `work` against the pool
    ///
    /// Panics inside `work` are caught and recorded as [`TaskError::Panicked`].
    /// If the scheduler rejects a task, every task already admitted is still
    /// awaited before the error is returned.
    #[instrument(skip(self, work), fields(strategy = %self.scheduler.strategy(), workers = self.scheduler.worker_count()))]
    pub async fn run_batch_with<F, Fut>(
        &self,
        request_count: usize,
        work: F,
    ) -> Result<BatchResult, HarnessError>
    where
        F: Fn(ConnectionPool) -> Fut,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<TaskResult>();
        let start = Instant::now();
        let mut submitted = 0usize;
        let mut rejection = None;

        for _ in 0..request_count {
            let body = work(self.pool.clone());
            let outcome_tx = outcome_tx.clone();

            let task = async move {
                let result = match AssertUnwindSafe(body).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(TaskError::Panicked(panic_message(panic))),
                };
                let _ = outcome_tx.send(result);
            };

            match self.scheduler.submit(Box::pin(task)) {
                Ok(()) => submitted += 1,
                Err(HarnessError::Dispatch { reason, .. }) => {
                    rejection = Some(reason);
                    break;
                }
                Err(other) => {
                    rejection = Some(other.to_string());
                    break;
                }
            }
        }
        drop(outcome_tx);

        let mut batch = BatchResult::default();
        while let Some(result) = outcome_rx.recv().await {
            batch.record(result);
        }

        // Senders only vanish without reporting when a scheduler drops a task
        for _ in batch.total()..submitted {
            batch.record(Err(TaskError::Abandoned));
        }

        batch.elapsed = start.elapsed();

        // Outside the timed window
        self.pool.released().await;

        if let Some(reason) = rejection {
            warn!(submitted, request_count, %reason, "scheduler rejected task admission");
            return Err(HarnessError::Dispatch { submitted, reason });
        }

        debug!(
            succeeded = batch.succeeded,
            failed = batch.failed,
            elapsed_us = batch.elapsed.as_micros() as u64,
            "batch complete"
        );
        Ok(batch)
    }
}

/// Lease a connection, scan the users table, and decode the first row
pub async fn fetch_first_user(pool: ConnectionPool) -> TaskResult {
    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| TaskError::Acquire(e.to_string()))?;

    let rows = sqlx::query(USERS_QUERY)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| TaskError::Query(e.to_string()))?;

    let Some(row) = rows.first() else {
        return Ok(None);
    };

    let decode = |e: sqlx::Error| TaskError::Decode(e.to_string());
    Ok(Some(UserRecord {
        id: row.try_get("id").map_err(decode)?,
        username: row.try_get("username").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
    }))
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
