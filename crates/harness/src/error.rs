//! Harness and per-task error types

use serde::Serialize;

/// Errors that abort an invocation
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Pool could not be opened (target unreachable, bad URL, rejected credentials)
    #[error("failed to open connection pool for {target}: {reason}")]
    PoolInit { target: String, reason: String },

    /// Pool still held live connections after closing
    #[error("connection pool teardown left {remaining} connection(s) open")]
    PoolTeardown { remaining: u32 },

    /// Scheduler could not be built
    #[error("scheduler init error: {0}")]
    SchedulerInit(String),

    /// Scheduler refused admission of a task
    #[error("dispatch error after {submitted} submitted task(s): {reason}")]
    Dispatch { submitted: usize, reason: String },

    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// The per-invocation control runtime could not start
    #[error("control runtime error: {0}")]
    ControlRuntime(#[from] std::io::Error),
}

/// Terminal failure of a single task, recorded in the batch result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TaskError {
    /// No connection could be leased from the pool
    #[error("connection acquire failed: {0}")]
    Acquire(String),

    /// The query itself failed
    #[error("query failed: {0}")]
    Query(String),

    /// A returned row could not be decoded
    #[error("row decode failed: {0}")]
    Decode(String),

    /// The task body panicked
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The scheduler dropped the task before it reported an outcome
    #[error("task was dropped without reporting an outcome")]
    Abandoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = HarnessError::PoolInit {
            target: "mysql://localhost:3306/testdb".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to open connection pool for mysql://localhost:3306/testdb: connection refused"
        );

        let err = HarnessError::Dispatch {
            submitted: 3,
            reason: "scheduler is shut down".to_string(),
        };
        assert!(err.to_string().contains("3 submitted"));
    }

    #[test]
    fn test_task_error_serializes_with_kind() {
        let json = serde_json::to_value(TaskError::Query("no such table: users".into())).unwrap();
        assert_eq!(json["kind"], "query");
        assert_eq!(json["message"], "no such table: users");

        let json = serde_json::to_value(TaskError::Abandoned).unwrap();
        assert_eq!(json["kind"], "abandoned");
    }
}
