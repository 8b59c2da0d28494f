//! Polling deadline.
//!
//! The poller is bounded by an absolute deadline computed once when
//! polling starts. The backend is expected to finish the batch on its own;
//! the deadline guarantees the loop ends even when it does not.
//!
//! Uses tokio's clock so that tests can drive it with a paused runtime.

use std::time::Duration;

use tokio::time::Instant;

/// Absolute polling deadline
#[derive(Debug, Clone, Copy)]
pub struct PollingDeadline {
    deadline: Instant,
}

impl PollingDeadline {
    /// Deadline `timeout` from now
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
        }
    }

    /// True once `now >= deadline`
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expires_at_deadline() {
        let deadline = PollingDeadline::new(Duration::from_millis(1000));
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_is_immediately_expired() {
        let deadline = PollingDeadline::new(Duration::ZERO);
        assert!(deadline.is_expired());
    }
}
