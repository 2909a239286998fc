//! Leased connections.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{Connector, IdleConnection, PoolInner};

/// Exclusive lease on one pooled connection.
///
/// Dropping the slot returns the connection to the pool, unless it was
/// marked broken or the pool has shut down, in which case it is discarded.
/// The slot's capacity is freed either way.
pub struct ConnectionSlot<C: Connector> {
    id: u64,
    conn: Option<C::Connection>,
    created_at: Instant,
    acquired_at: Instant,
    broken: bool,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<PoolInner<C>>,
}

impl<C: Connector> ConnectionSlot<C> {
    pub(crate) fn new(
        id: u64,
        conn: C::Connection,
        created_at: Instant,
        permit: OwnedSemaphorePermit,
        pool: Arc<PoolInner<C>>,
    ) -> Self {
        Self {
            id,
            conn: Some(conn),
            created_at,
            acquired_at: Instant::now(),
            broken: false,
            permit: Some(permit),
            pool,
        }
    }

    /// Connection id, stable across leases of the same connection.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Time since this lease began.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Age of the underlying connection.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Flags the connection as unusable so it is discarded on release.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Whether the connection has been flagged unusable.
    pub const fn is_broken(&self) -> bool {
        self.broken
    }

    /// Returns the connection to the pool.
    pub fn release(self) {
        drop(self);
    }

    /// Closes the connection instead of returning it to the pool.
    pub async fn discard(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.connector.close(conn).await;
        }
        debug!(connection = self.id, "Database connection discarded");
    }

    fn finish(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };

        if let Some(conn) = self.conn.take() {
            if self.broken {
                warn!(
                    connection = self.id,
                    age_s = self.age().as_secs(),
                    "Dropping broken database connection"
                );
            } else if self.pool.is_closed() {
                debug!(connection = self.id, "Pool closed, dropping connection");
            } else {
                self.pool.idle().push(IdleConnection {
                    id: self.id,
                    conn,
                    created_at: self.created_at,
                });
            }
        }

        let leased = self.pool.leased.fetch_sub(1, Ordering::SeqCst) - 1;
        // Occupancy drops before the permit so `leased` never exceeds the maximum.
        drop(permit);
        debug!(
            connection = self.id,
            leased,
            held_ms = self.acquired_at.elapsed().as_millis(),
            "Database connection released"
        );
    }
}

impl<C: Connector> Deref for ConnectionSlot<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("connection is present until the slot is released")
    }
}

impl<C: Connector> DerefMut for ConnectionSlot<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("connection is present until the slot is released")
    }
}

impl<C: Connector> Drop for ConnectionSlot<C> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionSlot<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSlot")
            .field("id", &self.id)
            .field("broken", &self.broken)
            .field("held_for", &self.held_for())
            .finish_non_exhaustive()
    }
}
