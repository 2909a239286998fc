//! Bounded pool of raw database connections.
//!
//! A semaphore sized to the pool caps leased connections. Idle connections
//! are checked with [`Connector::is_valid`] before reuse; a failed check
//! discards the connection and a fresh one is opened in its place, with a
//! bounded number of connect attempts. Connections are opened lazily, so a
//! pool can be built while the database is still down.

mod connector;
mod error;
mod mysql;
mod slot;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use jxreport_shared::DatabaseConfig;

pub use connector::Connector;
pub use error::PoolError;
pub use mysql::MySqlConnector;
pub use slot::ConnectionSlot;

/// Sizing and timing of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum leased connections.
    pub max_size: usize,
    /// Longest wait for a free slot.
    pub acquire_timeout: Duration,
    /// Longest wait for one connect attempt.
    pub connect_timeout: Duration,
    /// Connect attempts per acquire, at least one.
    pub connect_attempts: u32,
}

impl PoolOptions {
    /// Options from the database configuration.
    #[must_use]
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            max_size: config.pool_size,
            acquire_timeout: config.acquire_timeout(),
            connect_timeout: config.connect_timeout(),
            connect_attempts: config.connect_attempts,
        }
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 20,
            acquire_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            connect_attempts: 2,
        }
    }
}

/// Pool occupancy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Configured maximum.
    pub max_size: usize,
    /// Connections currently leased.
    pub leased: usize,
    /// Open connections waiting for reuse.
    pub idle: usize,
    /// Slots free to lease.
    pub available: usize,
    /// Callers waiting for a slot.
    pub waiting: usize,
    /// Whether the pool has been shut down.
    pub closed: bool,
}

pub(crate) struct IdleConnection<T> {
    pub(crate) id: u64,
    pub(crate) conn: T,
    pub(crate) created_at: Instant,
}

pub(crate) struct PoolInner<C: Connector> {
    connector: C,
    options: PoolOptions,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<IdleConnection<C::Connection>>>,
    pub(crate) leased: AtomicUsize,
    waiting: AtomicUsize,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl<C: Connector> PoolInner<C> {
    pub(crate) fn idle(&self) -> MutexGuard<'_, Vec<IdleConnection<C::Connection>>> {
        // The list stays consistent even if a holder panicked.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Shared, cloneable handle to a bounded connection pool.
pub struct ConnectionPool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Creates an empty pool; no connection is opened until first use.
    ///
    /// # Panics
    ///
    /// Panics if `options.max_size` or `options.connect_attempts` is zero.
    pub fn new(connector: C, options: PoolOptions) -> Self {
        assert!(options.max_size > 0, "pool max_size must be > 0");
        assert!(
            options.connect_attempts > 0,
            "pool connect_attempts must be > 0"
        );

        Self {
            inner: Arc::new(PoolInner {
                connector,
                options,
                semaphore: Arc::new(Semaphore::new(options.max_size)),
                idle: Mutex::new(Vec::with_capacity(options.max_size)),
                leased: AtomicUsize::new(0),
                waiting: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Leases a healthy connection.
    ///
    /// Waits up to the acquire timeout for a free slot, then reuses a valid
    /// idle connection or opens a new one. Cancelling the returned future
    /// releases everything taken so far.
    pub async fn acquire(&self) -> Result<ConnectionSlot<C>, PoolError> {
        if self.inner.is_closed() {
            return Err(PoolError::Closed);
        }

        let started = Instant::now();
        let permit = {
            let _waiting = WaitingGuard::new(&self.inner.waiting);
            let acquire = Arc::clone(&self.inner.semaphore).acquire_owned();
            match tokio::time::timeout(self.inner.options.acquire_timeout, acquire).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(PoolError::Closed),
                Err(_) => {
                    let waited = started.elapsed();
                    warn!(
                        waited_ms = waited.as_millis(),
                        max_size = self.inner.options.max_size,
                        "Timed out waiting for a database connection"
                    );
                    return Err(PoolError::Timeout { waited });
                }
            }
        };

        let (id, conn, created_at) = match self.reuse_idle().await {
            Some(idle) => (idle.id, idle.conn, idle.created_at),
            None => {
                let conn = self.open().await?;
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                debug!(connection = id, "Opened database connection");
                (id, conn, Instant::now())
            }
        };

        let leased = self.inner.leased.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            connection = id,
            leased,
            waited_ms = started.elapsed().as_millis(),
            "Database connection leased"
        );
        Ok(ConnectionSlot::new(
            id,
            conn,
            created_at,
            permit,
            Arc::clone(&self.inner),
        ))
    }

    /// Returns a slot's connection to the pool.
    pub fn release(&self, slot: ConnectionSlot<C>) {
        slot.release();
    }

    /// Occupancy snapshot.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            max_size: self.inner.options.max_size,
            leased: self.inner.leased.load(Ordering::SeqCst),
            idle: self.inner.idle().len(),
            available: self.inner.semaphore.available_permits(),
            waiting: self.inner.waiting.load(Ordering::SeqCst),
            closed: self.inner.is_closed(),
        }
    }

    /// Stops leasing and closes idle connections.
    ///
    /// Waiting callers fail with [`PoolError::Closed`]. Connections still
    /// leased are closed when their slot is released.
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.semaphore.close();

        let idle: Vec<_> = self.inner.idle().drain(..).collect();
        let count = idle.len();
        for entry in idle {
            self.inner.connector.close(entry.conn).await;
        }
        info!(
            closed_idle = count,
            still_leased = self.inner.leased.load(Ordering::SeqCst),
            "Connection pool shut down"
        );
    }

    async fn reuse_idle(&self) -> Option<IdleConnection<C::Connection>> {
        loop {
            // Lock released before awaiting the check.
            let candidate = self.inner.idle().pop();
            let mut idle = candidate?;
            if self.inner.connector.is_valid(&mut idle.conn).await {
                return Some(idle);
            }
            warn!(
                connection = idle.id,
                age_s = idle.created_at.elapsed().as_secs(),
                "Discarding dead idle connection"
            );
            self.inner.connector.close(idle.conn).await;
        }
    }

    async fn open(&self) -> Result<C::Connection, PoolError> {
        let attempts = self.inner.options.connect_attempts;
        let timeout = self.inner.options.connect_timeout;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(timeout, self.inner.connector.connect()).await {
                Ok(Ok(conn)) => return Ok(conn),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = format!("connect timed out after {timeout:?}"),
            }
            warn!(attempt, attempts, error = %last_error, "Database connect attempt failed");
        }

        Err(PoolError::ConnectionUnavailable {
            attempts,
            message: last_error,
        })
    }
}
