//! Counting-permit gate for report generation tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::AdmissionError;
use super::ticket::AdmissionTicket;

/// Default number of reports allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Counters shared between the controller and the tickets it hands out.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) active: AtomicUsize,
    pub(crate) waiting: AtomicUsize,
    pub(crate) admitted: AtomicU64,
    next_id: AtomicU64,
}

/// Keeps `waiting` accurate even when the waiting future is dropped.
struct PendingGuard<'a> {
    waiting: &'a AtomicUsize,
}

impl<'a> PendingGuard<'a> {
    fn enter(waiting: &'a AtomicUsize) -> Self {
        waiting.fetch_add(1, Ordering::SeqCst);
        Self { waiting }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionStatus {
    /// Configured maximum of concurrent tasks.
    pub max_concurrent: usize,
    /// Tickets currently active.
    pub active: usize,
    /// Callers currently waiting for a ticket.
    pub waiting: usize,
    /// Tickets that could be granted right now.
    pub available: usize,
    /// Tickets granted since start.
    pub admitted_total: u64,
}

/// Limits how many report tasks execute concurrently.
///
/// Waiters are served by the underlying Tokio semaphore, which is fair in
/// practice; callers must not depend on any particular order.
#[derive(Debug)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    counters: Arc<Counters>,
}

impl AdmissionController {
    /// Creates a controller admitting at most `max_concurrent` tasks.
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrent` is 0.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        assert!(max_concurrent > 0, "max_concurrent must be > 0");
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Waits until a report slot is free and returns an active ticket.
    ///
    /// Dropping the returned future while it waits consumes nothing.
    pub async fn acquire_ticket(&self) -> Result<AdmissionTicket, AdmissionError> {
        let started = Instant::now();
        let permit = {
            let _pending = PendingGuard::enter(&self.counters.waiting);
            Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| AdmissionError::Closed)?
        };
        Ok(self.admit(permit, started.elapsed()))
    }

    /// Like [`acquire_ticket`](Self::acquire_ticket), but gives up after `timeout`.
    pub async fn acquire_ticket_timeout(
        &self,
        timeout: Duration,
    ) -> Result<AdmissionTicket, AdmissionError> {
        let started = Instant::now();
        let permit = {
            let _pending = PendingGuard::enter(&self.counters.waiting);
            match tokio::time::timeout(timeout, Arc::clone(&self.semaphore).acquire_owned()).await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(AdmissionError::Closed),
                Err(_) => {
                    let waited = started.elapsed();
                    warn!(
                        max_concurrent = self.max_concurrent,
                        waited_ms = waited.as_millis(),
                        "Admission wait timed out"
                    );
                    return Err(AdmissionError::Timeout { waited });
                }
            }
        };
        Ok(self.admit(permit, started.elapsed()))
    }

    /// Returns a ticket only if a slot is free right now.
    pub fn try_acquire_ticket(&self) -> Option<AdmissionTicket> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| self.admit(permit, Duration::ZERO))
    }

    /// Releases a ticket. Equivalent to [`AdmissionTicket::release`].
    pub fn release_ticket(&self, ticket: AdmissionTicket) {
        ticket.release();
    }

    /// Stops admitting; current and future waiters get [`AdmissionError::Closed`].
    ///
    /// Tickets already granted stay valid until released.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Configured maximum of concurrent tasks.
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Tickets currently active.
    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Callers currently waiting.
    pub fn waiting(&self) -> usize {
        self.counters.waiting.load(Ordering::SeqCst)
    }

    /// Tickets that could be granted without waiting.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Snapshot of all counters.
    pub fn status(&self) -> AdmissionStatus {
        AdmissionStatus {
            max_concurrent: self.max_concurrent,
            active: self.active(),
            waiting: self.waiting(),
            available: self.available(),
            admitted_total: self.counters.admitted.load(Ordering::SeqCst),
        }
    }

    fn admit(&self, permit: OwnedSemaphorePermit, waited: Duration) -> AdmissionTicket {
        let id = self.counters.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.admitted.fetch_add(1, Ordering::SeqCst);
        debug!(
            ticket = id,
            active,
            max_concurrent = self.max_concurrent,
            waited_ms = waited.as_millis(),
            "Admission ticket granted"
        );
        AdmissionTicket::new(id, permit, Arc::clone(&self.counters), waited)
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}
