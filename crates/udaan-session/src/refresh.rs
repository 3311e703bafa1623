//! Single-flight refresh coordination
//!
//! The in-flight flag and the waiter queue sit behind one lock, and every
//! check-and-set happens inside a single lock scope with no `.await`. The
//! first caller to join while no refresh is running becomes the leader and
//! must start the refresh; everyone else only waits. Waiters are released in
//! arrival order, all with the same outcome.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::RefreshFailure;

/// New access token on success.
pub(crate) type RefreshOutcome = std::result::Result<String, RefreshFailure>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

#[derive(Default)]
pub(crate) struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

pub(crate) enum Ticket {
    /// No refresh was running; the holder must run one and settle the guard
    Leader {
        guard: RefreshGuard,
        outcome: oneshot::Receiver<RefreshOutcome>,
    },
    /// A refresh is already running; wait for its outcome
    Follower(oneshot::Receiver<RefreshOutcome>),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue the caller and report whether it has to start the refresh.
    pub fn join(self: &Arc<Self>) -> Ticket {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();
        state.waiters.push_back(tx);

        if state.in_flight {
            Ticket::Follower(rx)
        } else {
            state.in_flight = true;
            Ticket::Leader {
                guard: RefreshGuard {
                    coordinator: Arc::clone(self),
                    settled: false,
                },
                outcome: rx,
            }
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn pending(&self) -> usize {
        self.state.lock().waiters.len()
    }

    fn settle(&self, outcome: RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.state.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        let released = waiters.len();
        for waiter in waiters {
            // Receiver gone means the caller stopped waiting; nothing to do
            let _ = waiter.send(outcome.clone());
        }
        released
    }
}

/// Proof of leadership for one refresh. Dropping it unsettled releases every
/// waiter with [`RefreshFailure::Aborted`].
pub(crate) struct RefreshGuard {
    coordinator: Arc<RefreshCoordinator>,
    settled: bool,
}

impl RefreshGuard {
    /// Release all waiters with `outcome` and clear the in-flight flag.
    pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Token refresh ended without an outcome");
            self.coordinator.settle(Err(RefreshFailure::Aborted));
        }
    }
}

/// Await a ticket's receiver, mapping a dropped sender to `Aborted`.
pub(crate) async fn wait(outcome: oneshot::Receiver<RefreshOutcome>) -> RefreshOutcome {
    outcome.await.unwrap_or(Err(RefreshFailure::Aborted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leader(ticket: Ticket) -> (RefreshGuard, oneshot::Receiver<RefreshOutcome>) {
        match ticket {
            Ticket::Leader { guard, outcome } => (guard, outcome),
            Ticket::Follower(_) => panic!("expected leader"),
        }
    }

    fn follower(ticket: Ticket) -> oneshot::Receiver<RefreshOutcome> {
        match ticket {
            Ticket::Follower(outcome) => outcome,
            Ticket::Leader { .. } => panic!("expected follower"),
        }
    }

    #[tokio::test]
    async fn test_back_to_back_joins_elect_one_leader() {
        let coordinator = Arc::new(RefreshCoordinator::new());

        let (guard, first) = leader(coordinator.join());
        let second = follower(coordinator.join());
        let third = follower(coordinator.join());
        assert!(coordinator.is_refreshing());
        assert_eq!(coordinator.pending(), 3);

        assert_eq!(guard.settle(Ok("A2".to_string())), 3);

        for rx in [first, second, third] {
            assert_eq!(wait(rx).await, Ok("A2".to_string()));
        }
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.pending(), 0);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let coordinator = Arc::new(RefreshCoordinator::new());

        let (guard, first) = leader(coordinator.join());
        let second = follower(coordinator.join());

        guard.settle(Err(RefreshFailure::MissingRefreshToken));

        assert_eq!(wait(first).await, Err(RefreshFailure::MissingRefreshToken));
        assert_eq!(wait(second).await, Err(RefreshFailure::MissingRefreshToken));
    }

    #[tokio::test]
    async fn test_dropped_guard_aborts_waiters() {
        let coordinator = Arc::new(RefreshCoordinator::new());

        let (guard, first) = leader(coordinator.join());
        let second = follower(coordinator.join());
        drop(guard);

        assert_eq!(wait(first).await, Err(RefreshFailure::Aborted));
        assert_eq!(wait(second).await, Err(RefreshFailure::Aborted));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_new_refresh_after_settle() {
        let coordinator = Arc::new(RefreshCoordinator::new());

        let (guard, _rx) = leader(coordinator.join());
        guard.settle(Ok("A2".to_string()));

        let (guard, rx) = leader(coordinator.join());
        guard.settle(Ok("A3".to_string()));
        assert_eq!(wait(rx).await, Ok("A3".to_string()));
    }

    #[test]
    fn test_abandoned_waiter_does_not_block_release() {
        let coordinator = Arc::new(RefreshCoordinator::new());

        let (guard, _first) = leader(coordinator.join());
        drop(follower(coordinator.join()));

        assert_eq!(guard.settle(Ok("A2".to_string())), 2);
    }
}
