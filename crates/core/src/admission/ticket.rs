//! Admission tickets.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;
use tracing::debug;

use super::controller::Counters;

/// Lifecycle of a ticket once granted.
///
/// A caller that is still waiting holds no ticket; it is counted by
/// [`AdmissionController::waiting`](super::AdmissionController::waiting).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    /// The guarded report task may run.
    Active,
    /// Terminal; the slot has been handed back.
    Released,
}

/// Right to run one report task.
///
/// Released exactly once, either through [`release`](Self::release) or on
/// drop, so every exit path of the guarded task gives the slot back.
#[derive(Debug)]
pub struct AdmissionTicket {
    id: u64,
    state: TicketState,
    permit: Option<OwnedSemaphorePermit>,
    counters: Arc<Counters>,
    admitted_at: Instant,
    waited: Duration,
}

impl AdmissionTicket {
    pub(crate) fn new(
        id: u64,
        permit: OwnedSemaphorePermit,
        counters: Arc<Counters>,
        waited: Duration,
    ) -> Self {
        Self {
            id,
            state: TicketState::Active,
            permit: Some(permit),
            counters,
            admitted_at: Instant::now(),
            waited,
        }
    }

    /// Ticket number, unique per controller.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Current state.
    pub const fn state(&self) -> TicketState {
        self.state
    }

    /// Time spent waiting before admission.
    pub const fn waited(&self) -> Duration {
        self.waited
    }

    /// Time since admission.
    pub fn held_for(&self) -> Duration {
        self.admitted_at.elapsed()
    }

    /// Hands the slot back, waking at most one waiter.
    pub fn release(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.state == TicketState::Released {
            return;
        }
        self.state = TicketState::Released;
        let active = self.counters.active.fetch_sub(1, Ordering::SeqCst) - 1;
        // Count drops before the permit so `active` never exceeds the maximum.
        drop(self.permit.take());
        debug!(
            ticket = self.id,
            active,
            held_ms = self.admitted_at.elapsed().as_millis(),
            "Admission ticket released"
        );
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        self.finish();
    }
}
