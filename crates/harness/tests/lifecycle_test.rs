//! End-to-end invocation tests against a seeded SQLite database
//!
//! Run with: cargo test -p dispatchbench-harness --test lifecycle_test

mod common;

use common::{unreachable_target, TestDatabase};
use dispatchbench_harness::{
    HarnessConfig, HarnessError, InvocationLifecycle, LifecycleState, Strategy,
};

// ============================================
// Matrix scenarios
// ============================================

#[test]
fn test_fixed_pool_completes_every_request() {
    let db = TestDatabase::seeded(25);
    let config = db.config(Strategy::FixedPool, 100, 10);

    let batch = InvocationLifecycle::run(&config).unwrap();

    assert_eq!(batch.succeeded, 100);
    assert_eq!(batch.failed, 0);
    assert!(batch.failures.is_empty());
    assert!(batch.teardown_error.is_none());

    let sample = batch.sample.expect("a row should have been decoded");
    assert_eq!(sample.id, 1);
    assert_eq!(sample.username, "user1");
    assert_eq!(sample.email, "user1@example.com");
}

#[test]
fn test_work_stealing_matches_fixed_pool_correctness() {
    let db = TestDatabase::seeded(25);

    let fixed = InvocationLifecycle::run(&db.config(Strategy::FixedPool, 100, 10)).unwrap();
    let stealing = InvocationLifecycle::run(&db.config(Strategy::WorkStealing, 100, 1000)).unwrap();

    assert_eq!(stealing.succeeded, fixed.succeeded);
    assert_eq!(stealing.failed, 0);
}

#[test]
fn test_every_matrix_cell_accounts_for_every_request() {
    let db = TestDatabase::seeded(5);

    for strategy in Strategy::ALL {
        for workers in [1, 10, 100] {
            let batch = InvocationLifecycle::run(&db.config(strategy, 40, workers)).unwrap();
            assert_eq!(batch.total(), 40, "{} with {} workers", strategy, workers);
            assert_eq!(batch.succeeded, 40, "{} with {} workers", strategy, workers);
        }
    }
}

#[test]
fn test_zero_requests_is_an_empty_batch() {
    let db = TestDatabase::seeded(1);

    for strategy in Strategy::ALL {
        let batch = InvocationLifecycle::run(&db.config(strategy, 0, 4)).unwrap();
        assert_eq!(batch.succeeded, 0);
        assert_eq!(batch.failed, 0);
        assert!(batch.sample.is_none());
    }
}

#[test]
fn test_empty_table_succeeds_without_sample() {
    let db = TestDatabase::seeded(0);

    let batch = InvocationLifecycle::run(&db.config(Strategy::FixedPool, 20, 4)).unwrap();

    assert_eq!(batch.succeeded, 20);
    assert!(batch.sample.is_none());
}

// ============================================
// Failure paths
// ============================================

#[test]
fn test_unreachable_target_fails_with_pool_init() {
    let dir = tempfile::tempdir().unwrap();
    let config = HarnessConfig::new(unreachable_target(dir.path()));
    let mut lifecycle = InvocationLifecycle::new(config);

    let result = lifecycle.execute();

    assert!(
        matches!(result, Err(HarnessError::PoolInit { .. })),
        "unexpected result: {:?}",
        result
    );
    assert_eq!(
        lifecycle.trail(),
        &[
            LifecycleState::Idle,
            LifecycleState::PoolOpening,
            LifecycleState::Failed
        ]
    );
}

#[test]
fn test_zero_workers_never_opens_the_pool() {
    // An unreachable target would fail with PoolInit if the pool were opened first
    let dir = tempfile::tempdir().unwrap();
    let config = HarnessConfig::new(unreachable_target(dir.path())).with_worker_count(0);
    let mut lifecycle = InvocationLifecycle::new(config);

    let result = lifecycle.execute();

    assert!(matches!(result, Err(HarnessError::SchedulerInit(_))));
    assert!(!lifecycle.trail().contains(&LifecycleState::PoolOpening));
}

#[test]
fn test_query_failures_are_recorded_not_raised() {
    let db = TestDatabase::empty();

    for strategy in Strategy::ALL {
        let batch = InvocationLifecycle::run(&db.config(strategy, 30, 5)).unwrap();

        assert_eq!(batch.succeeded, 0);
        assert_eq!(batch.failed, 30);
        assert_eq!(batch.failures.len(), 30);
        assert!(batch
            .failures
            .iter()
            .all(|f| matches!(f, dispatchbench_harness::TaskError::Query(_))));
    }
}

// ============================================
// Lifecycle guarantees
// ============================================

#[test]
fn test_successful_run_visits_every_stage() {
    let db = TestDatabase::seeded(3);
    let mut lifecycle = InvocationLifecycle::new(db.config(Strategy::WorkStealing, 10, 2));

    lifecycle.execute().unwrap();

    assert_eq!(
        lifecycle.trail(),
        &[
            LifecycleState::Idle,
            LifecycleState::PoolOpening,
            LifecycleState::SchedulerBuilding,
            LifecycleState::Dispatching,
            LifecycleState::TearingDown,
            LifecycleState::Done,
        ]
    );
}

#[test]
fn test_sequential_runs_are_independent() {
    let db = TestDatabase::seeded(10);

    for strategy in Strategy::ALL {
        let config = db.config(strategy, 50, 8);
        let results: Vec<_> = (0..3)
            .map(|_| InvocationLifecycle::run(&config).unwrap())
            .collect();

        for batch in &results {
            assert_eq!(batch.succeeded, 50);
            assert_eq!(batch.failed, 0);
        }
    }
}
