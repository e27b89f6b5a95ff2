//! Bounded retry policy for API requests

use reqwest::StatusCode;

/// Attempts made before giving up, counting the first one
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Decides whether a failed attempt is tried again.
///
/// Attempts are numbered from 1. There is no delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    retryable_status: fn(StatusCode) -> bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retryable_status: |status| status.is_server_error(),
        }
    }

    /// A policy that makes exactly one attempt
    #[allow(dead_code)]
    pub fn never() -> Self {
        Self::new(1)
    }

    /// Replace the predicate deciding which statuses are worth another attempt
    #[allow(dead_code)]
    pub fn with_status_predicate(mut self, predicate: fn(StatusCode) -> bool) -> Self {
        self.retryable_status = predicate;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Retry after `attempt` ended with an HTTP response of `status`?
    pub fn should_retry_status(&self, status: StatusCode, attempt: u32) -> bool {
        attempt < self.max_attempts && (self.retryable_status)(status)
    }

    /// Retry after `attempt` failed to produce any response?
    pub fn should_retry_transport(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
