//! Method-aware retry policy.
//!
//! Only transient failures are retried: connect, timeout, send and body-read
//! errors, and the statuses `429, 500, 502, 503, 504`. Only verbs that are safe to repeat
//! (`GET`, and `PUT` by contract) get more than one attempt. Backoff is linear,
//! `attempt * step`, without jitter and without honoring `Retry-After`.

use crate::{request::Verb, Error};
use http::StatusCode;
use std::time::Duration;

/// Statuses that trigger a retry for retryable verbs.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Decides how many attempts a logical call gets and how long to wait between them.
///
/// # Examples
///
/// ```
/// use pixbank::{RetryPolicy, Verb};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts(Verb::Get), 3);
/// assert_eq!(policy.max_attempts(Verb::Post), 1);
///
/// // Linear backoff: 100ms after attempt 1, 200ms after attempt 2
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: usize, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Returns the attempt budget for a verb.
    pub fn max_attempts(&self, verb: Verb) -> usize {
        if verb.is_retryable() {
            self.max_attempts
        } else {
            1
        }
    }

    /// Returns the delay after a failed attempt (1-indexed) before the next one.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        self.backoff_step
            .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
    }

    /// Returns `true` if a failed `attempt` of `verb` should be followed by another.
    pub fn should_retry(&self, verb: Verb, error: &Error, attempt: usize) -> bool {
        attempt < self.max_attempts(verb) && is_transient(error)
    }
}

/// Returns `true` for failures a repeated attempt could plausibly fix.
pub fn is_transient(error: &Error) -> bool {
    match error {
        Error::Network(e) => e.is_connect() || e.is_timeout() || e.is_request() || e.is_body(),
        other => other
            .api_error()
            .is_some_and(|api| is_retryable_status(api.status)),
    }
}

/// Returns `true` for statuses in [`RETRYABLE_STATUSES`].
pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;

    #[test]
    fn test_linear_delays_strictly_increase() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..=4).map(|a| policy.delay_for_attempt(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300),
                Duration::from_millis(400),
            ]
        );
    }

    #[test]
    fn test_budget_per_verb() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(Verb::Get), 3);
        assert_eq!(policy.max_attempts(Verb::Put), 3);
        assert_eq!(policy.max_attempts(Verb::Post), 1);
        assert_eq!(policy.max_attempts(Verb::Patch), 1);
        assert_eq!(policy.max_attempts(Verb::Delete), 1);

        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(Verb::Get), 1);
        assert_eq!(RetryPolicy::none().max_attempts(Verb::Put), 1);
    }

    #[test]
    fn test_transient_statuses() {
        for code in RETRYABLE_STATUSES {
            let err = classify(StatusCode::from_u16(code).unwrap(), b"");
            assert!(is_transient(&err), "status {} should be transient", code);
        }
        for code in [400, 401, 404, 409, 422, 424, 501] {
            let err = classify(StatusCode::from_u16(code).unwrap(), b"");
            assert!(!is_transient(&err), "status {} should be terminal", code);
        }
        assert!(!is_transient(&Error::Cancelled));

        let builder_error = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        assert!(builder_error.is_builder());
        assert!(!is_transient(&Error::Network(builder_error)));
        assert!(!is_transient(&Error::Timeout {
            elapsed: Duration::from_secs(1)
        }));
    }

    #[test]
    fn test_should_retry_respects_budget_and_verb() {
        let policy = RetryPolicy::default();
        let err = classify(StatusCode::SERVICE_UNAVAILABLE, b"");

        assert!(policy.should_retry(Verb::Get, &err, 1));
        assert!(policy.should_retry(Verb::Put, &err, 2));
        assert!(!policy.should_retry(Verb::Get, &err, 3));
        assert!(!policy.should_retry(Verb::Post, &err, 1));
        assert!(!policy.should_retry(Verb::Delete, &err, 1));
    }
}
