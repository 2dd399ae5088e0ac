//! # Dispatch Harness
//!
//! Measures how long a burst of concurrent database queries takes to
//! dispatch and complete under two task-scheduling strategies.
//!
//! ## Features
//!
//! - **Per-invocation resources**: every call opens its own connection pool and
//!   scheduler and tears both down before returning
//! - **Two strategies**: fixed carriers over a shared FIFO queue, or work-stealing
//!   carriers with local queues
//! - **Partial-failure batches**: task failures are recorded in the result, never
//!   propagated
//! - **Measurement driver**: warmup/measurement iterations across a configuration matrix
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    InvocationLifecycle                       │
//! │  (Idle → PoolOpening → SchedulerBuilding → Dispatching →    │
//! │   TearingDown → Done | Failed)                              │
//! └─────────────────────────────────────────────────────────────┘
//!            │                     │                    │
//!            ▼                     ▼                    ▼
//! ┌────────────────────┐ ┌──────────────────┐ ┌───────────────────┐
//! │ConnectionPoolManager│ │ SchedulerFactory │ │  TaskDispatcher   │
//! │  (sqlx Any pool)    │ │ (fixed/stealing) │ │ (fan out + join)  │
//! └────────────────────┘ └──────────────────┘ └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use dispatchbench_harness::prelude::*;
//!
//! let config = HarnessConfig::new(ConnectionTarget::new("mysql://localhost:3306/testdb")
//!     .with_credentials("root", "secret"))
//!     .with_strategy(Strategy::FixedPool)
//!     .with_request_count(100)
//!     .with_worker_count(10);
//!
//! let batch = InvocationLifecycle::run(&config)?;
//! assert_eq!(batch.succeeded + batch.failed, 100);
//! ```

pub mod bench;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod scheduler;

/// Prelude for common imports
pub mod prelude {
    pub use crate::bench::{MatrixRunner, MeasurementPlan, Scenario, ScenarioReport};
    pub use crate::config::{ConnectionTarget, HarnessConfig, PoolSettings, Strategy};
    pub use crate::dispatch::{BatchResult, TaskDispatcher, UserRecord};
    pub use crate::error::{HarnessError, TaskError};
    pub use crate::lifecycle::{InvocationLifecycle, LifecycleState};
    pub use crate::pool::{ConnectionPool, ConnectionPoolManager};
    pub use crate::scheduler::{SchedulerFactory, TaskScheduler};
}

// Re-export key types at crate root
pub use config::{ConnectionTarget, DatabaseDriver, HarnessConfig, PoolSettings, Strategy};
pub use dispatch::{BatchResult, TaskDispatcher, TaskResult, UserRecord, USERS_QUERY};
pub use error::{HarnessError, TaskError};
pub use lifecycle::{InvocationLifecycle, LifecycleState};
pub use pool::{ConnectionPool, ConnectionPoolManager};
pub use scheduler::{
    FixedPoolScheduler, SchedulerFactory, Task, TaskScheduler, WorkStealingScheduler,
};
