// Cooperative cancellation and deadlines for solves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::error::LineupError;

/// Session-wide cancellation signal. Cloning shares the same signal.
///
/// Blocking solver code polls [`CancelToken::is_cancelled`]; async code can
/// await [`CancelToken::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel()
            // cannot slip between the check and the await.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Budget for a single solve: the session's cancel signal plus an optional
/// wall-clock deadline. Checked between augmentation phases.
#[derive(Debug, Clone)]
pub struct SolveControl {
    cancel: CancelToken,
    deadline: Option<Instant>,
    limit: Option<Duration>,
}

impl SolveControl {
    /// Start the clock now; the solve must finish within `limit`.
    pub fn new(cancel: CancelToken, limit: Option<Duration>) -> Self {
        SolveControl {
            cancel,
            deadline: limit.map(|l| Instant::now() + l),
            limit,
        }
    }

    /// No deadline and a private cancel signal.
    pub fn unbounded() -> Self {
        Self::new(CancelToken::new(), None)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fail fast if the session was cancelled or the deadline has passed.
    pub fn checkpoint(&self) -> Result<(), LineupError> {
        if self.cancel.is_cancelled() {
            return Err(LineupError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(LineupError::DeadlineExceeded {
                    limit_ms: self.limit.map_or(0, |l| l.as_millis() as u64),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_control_passes() {
        assert!(SolveControl::unbounded().checkpoint().is_ok());
    }

    #[test]
    fn zero_limit_exceeds_immediately() {
        let control = SolveControl::new(CancelToken::new(), Some(Duration::ZERO));
        assert_eq!(
            control.checkpoint().unwrap_err(),
            LineupError::DeadlineExceeded { limit_ms: 0 }
        );
    }

    #[test]
    fn cancellation_wins_over_deadline() {
        let token = CancelToken::new();
        let control = SolveControl::new(token.clone(), Some(Duration::ZERO));
        token.cancel();
        assert_eq!(control.checkpoint().unwrap_err(), LineupError::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_cancel() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::task::yield_now().await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_future_resolves_if_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already-cancelled token resolves immediately");
    }
}
