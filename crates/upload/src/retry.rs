//! Per-chunk retry policy with exponential backoff.

use std::time::Duration;

use tubelift_transfer::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_ATTEMPTS, TransferSpec};

/// How often a chunk is retried and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total requests allowed for one chunk, the first one included.
    pub max_attempts: u32,
    /// Backoff base in seconds.
    pub backoff_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl RetryPolicy {
    pub fn from_spec(spec: &TransferSpec) -> Self {
        Self {
            max_attempts: spec.max_attempts,
            backoff_base: spec.backoff_base,
        }
    }

    /// Delay to wait after `failed_attempts` failures of the same chunk:
    /// `base^failed_attempts` seconds.
    ///
    /// No jitter and no cap, so delays grow strictly with the attempt count.
    /// Overflow saturates at [`Duration::MAX`].
    pub fn delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        let exp = i32::try_from(failed_attempts).unwrap_or(i32::MAX);
        let secs = self.backoff_base.powi(exp);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Returns `true` if another request may be sent after `failed_attempts`
    /// failures.
    pub fn allows_retry(&self, failed_attempts: u32) -> bool {
        failed_attempts < self.max_attempts
    }
}
