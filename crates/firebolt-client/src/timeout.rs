//! Deadline tracking for multi-statement batches.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Tracks an absolute deadline across a sequence of requests.
///
/// The controller is checked before each statement of a batch; the remaining
/// time feeds per-request timeouts so a slow early statement shrinks the
/// budget of later ones.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutController {
    deadline: Option<Instant>,
}

impl TimeoutController {
    /// Start tracking now; `None` means no deadline.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// Fail with [`Error::QueryTimeout`] if the deadline has passed.
    pub fn raise_if_timeout(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() > deadline => Err(Error::QueryTimeout),
            _ => Ok(()),
        }
    }

    /// Time left until the deadline; `None` when unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_times_out() {
        let controller = TimeoutController::new(None);
        assert!(controller.raise_if_timeout().is_ok());
        assert!(controller.remaining().is_none());
    }

    #[test]
    fn test_expired_deadline_raises() {
        let controller = TimeoutController::new(Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(
            controller.raise_if_timeout(),
            Err(Error::QueryTimeout)
        ));
        assert_eq!(controller.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_remaining_decreases() {
        let controller = TimeoutController::new(Some(Duration::from_secs(60)));
        let first = controller.remaining().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = controller.remaining().unwrap();
        assert!(second < first);
        assert!(controller.raise_if_timeout().is_ok());
    }
}
