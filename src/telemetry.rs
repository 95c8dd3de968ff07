//! A [`Hook`] that records attempt metrics through the `metrics` facade.
//!
//! The library installs no recorder; without one every call below is a no-op.

use crate::hooks::{AttemptEnd, AttemptStart, Hook};
use metrics::{counter, gauge, histogram};

/// Counter of completed attempts, labelled by `method` and `status`.
pub const REQUESTS_TOTAL: &str = "pixbank_requests_total";
/// Histogram of attempt durations in seconds, labelled by `method`.
pub const REQUEST_DURATION_SECONDS: &str = "pixbank_request_duration_seconds";
/// Histogram of request body sizes in bytes, labelled by `method`.
pub const REQUEST_SIZE_BYTES: &str = "pixbank_request_size_bytes";
/// Counter of failed attempts, labelled by `method` and `kind`.
pub const REQUEST_ERRORS_TOTAL: &str = "pixbank_request_errors_total";
/// Gauge of attempts currently in flight.
pub const REQUESTS_IN_FLIGHT: &str = "pixbank_requests_in_flight";

/// Records request count, duration, size, errors and an in-flight gauge.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsHook;

impl Hook for MetricsHook {
    fn before_attempt(&self, attempt: &AttemptStart<'_>) {
        gauge!(REQUESTS_IN_FLIGHT).increment(1.0);
        histogram!(REQUEST_SIZE_BYTES, "method" => attempt.verb.as_str())
            .record(attempt.body.map_or(0, <[u8]>::len) as f64);
    }

    fn after_attempt(&self, attempt: &AttemptEnd<'_>) {
        let method = attempt.verb.as_str();
        gauge!(REQUESTS_IN_FLIGHT).decrement(1.0);
        counter!(REQUESTS_TOTAL, "method" => method, "status" => attempt.status.to_string())
            .increment(1);
        histogram!(REQUEST_DURATION_SECONDS, "method" => method)
            .record(attempt.elapsed.as_secs_f64());

        if let Some(error) = attempt.error {
            counter!(REQUEST_ERRORS_TOTAL, "method" => method, "kind" => error.kind().as_str())
                .increment(1);
        }
    }
}
