//! Shared fixtures: seeded SQLite databases in temporary directories

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tempfile::TempDir;

use dispatchbench_harness::{ConnectionTarget, HarnessConfig, PoolSettings, Strategy};

/// A temporary database; the directory is removed on drop
pub struct TestDatabase {
    pub dir: TempDir,
    pub target: ConnectionTarget,
}

impl TestDatabase {
    /// Database with a `users` table holding `rows` rows
    pub fn seeded(rows: usize) -> Self {
        Self::create(Some(rows))
    }

    /// Database file with no tables at all
    pub fn empty() -> Self {
        Self::create(None)
    }

    /// Configuration for this database with short timeouts
    pub fn config(&self, strategy: Strategy, request_count: usize, worker_count: usize) -> HarnessConfig {
        HarnessConfig::new(self.target.clone())
            .with_strategy(strategy)
            .with_request_count(request_count)
            .with_worker_count(worker_count)
            .with_pool(PoolSettings {
                max_connections: 4,
                acquire_timeout: Duration::from_secs(10),
            })
    }

    fn create(rows: Option<usize>) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("users.db");

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build seeding runtime");
        rt.block_on(seed(&path, rows));

        let target = ConnectionTarget::new(format!("sqlite://{}", path.display()));
        Self { dir, target }
    }
}

/// Target whose file cannot be opened
pub fn unreachable_target(dir: &Path) -> ConnectionTarget {
    ConnectionTarget::new(format!(
        "sqlite://{}?mode=ro",
        dir.join("missing").join("users.db").display()
    ))
}

async fn seed(path: &Path, rows: Option<usize>) {
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .connect()
        .await
        .expect("failed to create sqlite database");

    if let Some(rows) = rows {
        sqlx::query(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT NOT NULL, email TEXT NOT NULL)",
        )
        .execute(&mut conn)
        .await
        .expect("failed to create users table");

        for i in 1..=rows {
            sqlx::query("INSERT INTO users (id, username, email) VALUES (?, ?, ?)")
                .bind(i as i64)
                .bind(format!("user{}", i))
                .bind(format!("user{}@example.com", i))
                .execute(&mut conn)
                .await
                .expect("failed to insert user");
        }
    }

    conn.close().await.expect("failed to close seeding connection");
}
