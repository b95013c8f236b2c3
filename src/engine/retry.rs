//! Retry policy for transient store failures

use std::time::Duration;

/// How many extra attempts a transfer gets after a transient failure.
///
/// The default is no retry at all. Each retry runs a brand-new unit of
/// work after sleeping `backoff * attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(50);

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Self::DEFAULT_BACKOFF,
        }
    }

    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Linear backoff before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
