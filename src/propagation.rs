//! W3C trace-context propagation.
//!
//! One [`TraceContext`] is created per logical call; each physical attempt gets
//! its own parent span id under the same trace id.

use http::{HeaderMap, HeaderValue};
use rand::Rng;

/// Name of the W3C trace-context header.
pub const TRACEPARENT: &str = "traceparent";

/// The trace identity of one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: u128,
}

impl TraceContext {
    /// Starts a new trace with a random, non-zero trace id.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let trace_id = loop {
            let id: u128 = rng.gen();
            if id != 0 {
                break id;
            }
        };
        Self { trace_id }
    }

    /// Returns the trace id as 32 lowercase hex digits.
    pub fn trace_id(&self) -> String {
        format!("{:032x}", self.trace_id)
    }

    /// Builds a `traceparent` value for one attempt with a fresh span id.
    pub fn traceparent(&self) -> String {
        let span_id: u64 = loop {
            let id: u64 = rand::thread_rng().gen();
            if id != 0 {
                break id;
            }
        };
        format!("00-{:032x}-{:016x}-01", self.trace_id, span_id)
    }

    /// Inserts a fresh `traceparent` header.
    pub fn inject(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.traceparent()) {
            headers.insert(TRACEPARENT, value);
        }
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}
