//! Dispatch latency benchmark
//!
//! Measures the dispatch window of one invocation (submit 100 queries,
//! wait for all of them) for each strategy across worker counts. Pool and
//! scheduler setup/teardown are excluded from the measurement.
//!
//! Targets `DATABASE_URL` when set, otherwise a seeded SQLite file.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tempfile::TempDir;
use tokio::runtime::Runtime;

use dispatchbench_harness::{ConnectionTarget, HarnessConfig, InvocationLifecycle, Strategy};

const REQUEST_COUNT: usize = 100;
const SEED_ROWS: i64 = 100;

/// Resolve the benchmark target, seeding a local database if needed
fn target() -> (ConnectionTarget, Option<TempDir>) {
    let _ = dotenvy::dotenv();

    if let Ok(url) = std::env::var("DATABASE_URL") {
        let target = match (
            std::env::var("DATABASE_USERNAME"),
            std::env::var("DATABASE_PASSWORD"),
        ) {
            (Ok(user), Ok(password)) => ConnectionTarget::new(url).with_credentials(user, password),
            _ => ConnectionTarget::new(url),
        };
        return (target, None);
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db");

    Runtime::new().unwrap().block_on(async {
        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();

        sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT, email TEXT)")
            .execute(&mut conn)
            .await
            .unwrap();

        for i in 1..=SEED_ROWS {
            sqlx::query("INSERT INTO users (id, username, email) VALUES (?, ?, ?)")
                .bind(i)
                .bind(format!("user{}", i))
                .bind(format!("user{}@example.com", i))
                .execute(&mut conn)
                .await
                .unwrap();
        }

        conn.close().await.unwrap();
    });

    let target = ConnectionTarget::new(format!("sqlite://{}", path.display()));
    (target, Some(dir))
}

fn bench_dispatch(c: &mut Criterion) {
    // Keep the temp dir alive for the whole run
    let (target, _dir) = target();
    let base = HarnessConfig::new(target).with_request_count(REQUEST_COUNT);

    for strategy in Strategy::ALL {
        let mut group = c.benchmark_group(format!("dispatch/{}", strategy));
        group.throughput(Throughput::Elements(REQUEST_COUNT as u64));
        group.sample_size(20);
        group.warm_up_time(Duration::from_secs(3));
        group.measurement_time(Duration::from_secs(5));

        for workers in [1000, 100, 10] {
            let config = base
                .clone()
                .with_strategy(strategy)
                .with_worker_count(workers);

            group.bench_with_input(
                BenchmarkId::new("workers", workers),
                &config,
                |b, config| {
                    b.iter_custom(|iters| {
                        let mut total = Duration::ZERO;
                        for _ in 0..iters {
                            let batch = InvocationLifecycle::run(config).unwrap();
                            assert_eq!(batch.failed, 0, "benchmark batch had failures");
                            total += batch.elapsed;
                        }
                        total
                    });
                },
            );
        }

        group.finish();
    }
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
