//! Single-flight token refresh.
//!
//! The coordinator is a two-state machine, `IDLE -> REFRESHING -> IDLE`. The
//! first request that needs a refresh is admitted as the leader and performs the
//! exchange; every request that needs one while the leader is busy is parked as
//! a waiter and resumed, in arrival order, with the leader's outcome.
//!
//! The state lock is only taken for the synchronous admit and drain steps, never
//! across an await point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::session::Credential;

/// Why a refresh round failed.
///
/// Cloned to every waiter of the round, so all of them report the same cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("no credential to refresh")]
    MissingCredential,

    #[error("refresh rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("refresh response unreadable: {0}")]
    InvalidResponse(String),

    #[error("refresh did not complete within {0:?}")]
    TimedOut(Duration),

    #[error("refreshed credential could not be stored: {0}")]
    Storage(String),

    #[error("refresh abandoned before it settled")]
    Abandoned,
}

/// What every participant of a refresh round receives.
pub type RefreshOutcome = Result<Credential, RefreshFailure>;

/// A request parked while a refresh is in flight.
#[derive(Debug)]
struct PendingRequest {
    request_id: Uuid,
    resume: oneshot::Sender<RefreshOutcome>,
}

#[derive(Debug, Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<PendingRequest>,
}

/// Refresh coordinator, one per gateway.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    rounds: AtomicU64,
}

/// Result of asking the coordinator for a refresh.
#[derive(Debug)]
pub enum Admission<'a> {
    /// No refresh was running; the caller must perform it and settle the lease.
    Leader(RefreshLease<'a>),
    /// A refresh is running; await the ticket for its outcome.
    Waiter(WaitTicket),
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the current round, or start one if the coordinator is idle.
    pub fn admit(&self, request_id: Uuid) -> Admission<'_> {
        let mut state = self.lock();
        if state.refreshing {
            let (resume, parked) = oneshot::channel();
            state.waiters.push(PendingRequest { request_id, resume });
            tracing::debug!(
                name: "gateway.refresh.queued",
                request_id = %request_id,
                waiters = state.waiters.len(),
                "Request queued behind in-flight refresh"
            );
            Admission::Waiter(WaitTicket { parked })
        } else {
            state.refreshing = true;
            self.rounds.fetch_add(1, Ordering::Relaxed);
            Admission::Leader(RefreshLease {
                coordinator: self,
                request_id,
                settled: false,
            })
        }
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Requests currently parked behind the in-flight refresh.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Refresh rounds started since construction.
    #[must_use]
    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Relaxed)
    }

    // Back to IDLE; the queue is emptied under the lock, then resumed in order.
    fn settle(&self, outcome: &RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        let count = waiters.len();
        for waiter in waiters {
            if waiter.resume.send(outcome.clone()).is_err() {
                tracing::debug!(
                    name: "gateway.refresh.waiter_gone",
                    request_id = %waiter.request_id,
                    "Waiter dropped before the refresh settled"
                );
            }
        }
        count
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The leader's obligation to settle the round.
///
/// Dropping an unsettled lease (the leader's future was cancelled) settles the
/// round with [`RefreshFailure::Abandoned`] so no waiter is left parked.
#[derive(Debug)]
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    request_id: Uuid,
    settled: bool,
}

impl RefreshLease<'_> {
    /// Publish the outcome to every waiter. Returns how many were resumed.
    pub fn settle(mut self, outcome: &RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(
                name: "gateway.refresh.abandoned",
                request_id = %self.request_id,
                "Refresh leader dropped before settling"
            );
            self.coordinator.settle(&Err(RefreshFailure::Abandoned));
        }
    }
}

/// A waiter's handle on the in-flight round.
#[derive(Debug)]
pub struct WaitTicket {
    parked: oneshot::Receiver<RefreshOutcome>,
}

impl WaitTicket {
    pub async fn wait(self) -> RefreshOutcome {
        self.parked
            .await
            .unwrap_or(Err(RefreshFailure::Abandoned))
    }
}
