//! Successful call results.
//!
//! [`Response`] wraps the deserialized body together with what the executor
//! knows about the logical call: the final status and headers, total latency
//! across all attempts, how many attempts it took, and the idempotency key
//! that was sent.

use crate::idempotency::IdempotencyKey;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// The terminal success value of a logical call.
///
/// # Examples
///
/// ```no_run
/// use pixbank::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Balance {
///     available: f64,
/// }
///
/// # async fn example() -> Result<(), pixbank::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .api_key("secret")
///     .build()?;
///
/// let response = client.get::<Balance>("/banking/balance").await?;
/// println!("Available: {}", response.data.available);
/// println!("Took {:?} over {} attempt(s)", response.latency, response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The deserialized response data.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the start of the logical call until the terminal response,
    /// including every attempt and backoff sleep.
    pub latency: Duration,

    /// The number of physical attempts made; `1` if no retry happened.
    pub attempts: usize,

    /// The idempotency key sent with every attempt, if any.
    pub idempotency_key: Option<IdempotencyKey>,
}

impl<T> Response<T> {
    /// Maps the response data while preserving the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use pixbank::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response {
    ///     data: 42,
    ///     raw_body: "42".to_string(),
    ///     status: StatusCode::OK,
    ///     headers: HeaderMap::new(),
    ///     latency: Duration::from_millis(100),
    ///     attempts: 1,
    ///     idempotency_key: None,
    /// };
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
            idempotency_key: self.idempotency_key,
        }
    }

    /// Returns `true` if the call needed more than one attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Consumes the response, returning only the data.
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
