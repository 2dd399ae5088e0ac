//! Connection pool lifecycle
//!
//! One [`ConnectionPool`] exists per invocation. [`ConnectionPoolManager::open`]
//! proves the target is reachable by establishing a first connection;
//! [`ConnectionPoolManager::close`] waits for every lease to come back and
//! closes the underlying connections.

use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool};
use tracing::{debug, instrument, warn};

use crate::config::{ConnectionTarget, PoolSettings};
use crate::error::HarnessError;

/// Yields before `released` falls back to timed polling
const RELEASE_SPIN_LIMIT: u32 = 4096;
const RELEASE_POLL_INTERVAL: Duration = Duration::from_micros(200);

/// A bounded pool of connections to one target
///
/// Cloning is cheap and shares the same underlying pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: AnyPool,
    target: String,
}

impl ConnectionPool {
    /// Lease a connection, waiting while the pool is exhausted
    ///
    /// The connection returns to the pool when the guard is dropped.
    pub async fn acquire(&self) -> Result<PoolConnection<Any>, sqlx::Error> {
        self.inner.acquire().await
    }

    /// Connections currently leased to tasks
    pub fn leased(&self) -> u32 {
        self.inner
            .size()
            .saturating_sub(self.inner.num_idle() as u32)
    }

    /// Wait until every leased connection is back in the pool
    ///
    /// sqlx hands a dropped lease to a background task that pings the
    /// connection before it becomes idle again, so a lease is not returned
    /// at the instant its guard drops. Yielding first lets the return task
    /// run on the current runtime without waiting for a timer tick.
    pub async fn released(&self) {
        let mut spins = 0;
        while self.leased() > 0 && !self.is_closed() {
            if spins < RELEASE_SPIN_LIMIT {
                spins += 1;
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(RELEASE_POLL_INTERVAL).await;
            }
        }
    }

    /// Live connections, leased or idle
    pub fn size(&self) -> u32 {
        self.inner.size()
    }

    /// Whether the pool has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Redacted target this pool connects to
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Opens and closes per-invocation pools
#[derive(Debug, Clone, Default)]
pub struct ConnectionPoolManager {
    settings: PoolSettings,
}

impl ConnectionPoolManager {
    pub fn new(settings: PoolSettings) -> Self {
        Self { settings }
    }

    /// Open a pool and establish its first connection
    #[instrument(skip(self, target), fields(target = %target.redacted()))]
    pub async fn open(&self, target: &ConnectionTarget) -> Result<ConnectionPool, HarnessError> {
        let redacted = target.redacted();
        let init_error = |reason: String| HarnessError::PoolInit {
            target: redacted.clone(),
            reason,
        };

        target.driver().map_err(|e| init_error(e.to_string()))?;
        let url = target.connect_url().map_err(init_error)?;

        sqlx::any::install_default_drivers();

        let inner = AnyPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .acquire_timeout(self.settings.acquire_timeout)
            .connect(&url)
            .await
            .map_err(|e| init_error(e.to_string()))?;

        debug!(
            max_connections = self.settings.max_connections,
            "opened connection pool"
        );

        Ok(ConnectionPool {
            inner,
            target: redacted,
        })
    }

    /// Close a pool, waiting for outstanding leases to be returned
    #[instrument(skip(self, pool), fields(target = %pool.target))]
    pub async fn close(&self, pool: ConnectionPool) -> Result<(), HarnessError> {
        pool.inner.close().await;

        let remaining = pool.inner.size();
        if remaining > 0 {
            warn!(remaining, "connections still open after pool close");
            return Err(HarnessError::PoolTeardown { remaining });
        }

        debug!("closed connection pool");
        Ok(())
    }
}
