//! Error types for banking API calls.
//!
//! Every failed logical call produces exactly one [`Error`]. API failures are
//! split by status code into a closed set of variants (see [`crate::classify`]),
//! each carrying an [`ApiError`] with the status, the machine code, the human
//! message and any structured details the server returned. Use [`Error::kind`]
//! to branch on the failure class without looking at message text.

use http::StatusCode;
use std::fmt;

/// The main error type for banking API calls.
///
/// # Examples
///
/// ```no_run
/// use pixbank::{Client, Error, ErrorKind};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .api_key("secret")
///     .build()?;
///
/// match client.get::<serde_json::Value>("/pix/cob/abc").await {
///     Ok(response) => println!("Charge: {:?}", response.data),
///     Err(e) if e.kind() == ErrorKind::NotFound => println!("no such charge"),
///     Err(Error::BusinessRule(api)) => {
///         eprintln!("rejected with code {:?}: {}", api.code, api.message);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request failed field validation (400).
    #[error("Validation error: {error}")]
    Validation {
        /// Common error payload.
        error: ApiError,
        /// Field-level validation failures; never empty.
        fields: Vec<FieldError>,
    },

    /// The API key was missing or rejected (401).
    #[error("Unauthorized: {0}")]
    Unauthorized(ApiError),

    /// The account balance does not cover the operation (402).
    #[error("Insufficient funds: {error}")]
    InsufficientFunds {
        /// Common error payload.
        error: ApiError,
        /// Amount the operation requires, when reported.
        required: Option<f64>,
        /// Amount available, when reported.
        available: Option<f64>,
    },

    /// The caller may not perform this operation (403).
    #[error("Forbidden: {0}")]
    Forbidden(ApiError),

    /// The addressed resource does not exist (404).
    #[error("Not found: {error}")]
    NotFound {
        /// Common error payload.
        error: ApiError,
        /// Name of the missing resource, when reported.
        resource: Option<String>,
    },

    /// The method is not allowed on this path (405).
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(ApiError),

    /// A business rule rejected the operation (409). See [`ApiError::code`].
    #[error("Business rule violation: {0}")]
    BusinessRule(ApiError),

    /// A precondition header did not match (412).
    #[error("Precondition failed: {0}")]
    PreconditionFailed(ApiError),

    /// The request was well-formed but could not be processed (422).
    #[error("Unprocessable entity: {0}")]
    Unprocessable(ApiError),

    /// A downstream service the API depends on failed (424).
    #[error("Third-party failure: {error}")]
    ThirdParty {
        /// Common error payload.
        error: ApiError,
        /// The originating service, when reported.
        service: Option<String>,
    },

    /// The server raised an unhandled exception (500).
    #[error("Server exception: {0}")]
    ServerException(ApiError),

    /// An integration behind the API is unavailable (503).
    #[error("Integration unavailable: {0}")]
    Integration(ApiError),

    /// Any other non-success status. The message is the raw response body.
    #[error("HTTP error {0}")]
    Api(ApiError),

    /// A network-level error occurred and no response was received.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The call's deadline passed before a terminal outcome was reached.
    #[error("Request timed out after {elapsed:?}")]
    Timeout {
        /// Time spent in the logical call when the deadline fired.
        elapsed: std::time::Duration,
    },

    /// The call's cancellation token fired.
    #[error("Request cancelled")]
    Cancelled,

    /// A runtime fault (panic) was caught inside the call.
    #[error("Fault during request: {message}")]
    Fault {
        /// The panic message.
        message: String,
        /// Backtrace captured where the fault was recovered.
        trace: String,
    },

    /// Failed to serialize the request body. Never retried.
    #[error("Failed to serialize request: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Failed to deserialize a successful response body. Never retried.
    #[error("Failed to deserialize response (status {status}): {source}")]
    Deserialization {
        /// The HTTP status code.
        status: StatusCode,
        /// The raw response body that failed to deserialize.
        raw_response: String,
        /// The serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid client configuration, or a call on a shut-down client.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An invalid URL was provided or produced by joining base and path.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Fieldless discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 400
    Validation,
    /// 401
    Unauthorized,
    /// 402
    InsufficientFunds,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 405
    MethodNotAllowed,
    /// 409
    BusinessRule,
    /// 412
    PreconditionFailed,
    /// 422
    Unprocessable,
    /// 424
    ThirdParty,
    /// 500
    ServerException,
    /// 503
    Integration,
    /// Any other non-success status.
    GenericApi,
    /// Transport failure, no response.
    Network,
    /// Deadline exceeded.
    Timeout,
    /// Cancelled by the caller.
    Cancelled,
    /// Recovered panic.
    Fault,
    /// Request body serialization failure.
    Serialization,
    /// Response body deserialization failure.
    Deserialization,
    /// Client misconfiguration or invalid URL.
    Configuration,
}

impl ErrorKind {
    /// Returns a stable snake_case label, suitable for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::MethodNotAllowed => "method_not_allowed",
            ErrorKind::BusinessRule => "business_rule",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::ThirdParty => "third_party",
            ErrorKind::ServerException => "server_exception",
            ErrorKind::Integration => "integration",
            ErrorKind::GenericApi => "generic_api",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Fault => "fault",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Deserialization => "deserialization",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload shared by every API error variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// The HTTP status code, exactly as received.
    pub status: StatusCode,
    /// Machine-readable error code, when the server sent one.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Any additional structured fields from the error body.
    pub details: Option<serde_json::Value>,
    /// The raw response body.
    pub raw_body: String,
}

impl ApiError {
    /// Creates an error payload with no code or details.
    pub fn new(status: StatusCode, message: impl Into<String>, raw_body: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
            details: None,
            raw_body: raw_body.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status.as_u16())?;
        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// One field-level validation failure from a 400 response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct FieldError {
    /// Machine-readable code.
    #[serde(default)]
    pub code: Option<String>,
    /// The offending field; `None` for a request-wide failure.
    #[serde(default)]
    pub field: Option<String>,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            Error::BusinessRule(_) => ErrorKind::BusinessRule,
            Error::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Error::Unprocessable(_) => ErrorKind::Unprocessable,
            Error::ThirdParty { .. } => ErrorKind::ThirdParty,
            Error::ServerException(_) => ErrorKind::ServerException,
            Error::Integration(_) => ErrorKind::Integration,
            Error::Api(_) => ErrorKind::GenericApi,
            Error::Network(_) => ErrorKind::Network,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Fault { .. } => ErrorKind::Fault,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Deserialization { .. } => ErrorKind::Deserialization,
            Error::Configuration(_) | Error::InvalidUrl(_) => ErrorKind::Configuration,
        }
    }

    /// Returns the API error payload for status-derived errors.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Validation { error, .. }
            | Error::InsufficientFunds { error, .. }
            | Error::NotFound { error, .. }
            | Error::ThirdParty { error, .. } => Some(error),
            Error::Unauthorized(error)
            | Error::Forbidden(error)
            | Error::MethodNotAllowed(error)
            | Error::BusinessRule(error)
            | Error::PreconditionFailed(error)
            | Error::Unprocessable(error)
            | Error::ServerException(error)
            | Error::Integration(error)
            | Error::Api(error) => Some(error),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Deserialization { status, .. } => Some(*status),
            other => other.api_error().map(|e| e.status),
        }
    }

    /// Returns the machine-readable error code, if the server sent one.
    pub fn code(&self) -> Option<&str> {
        self.api_error()?.code.as_deref()
    }

    /// Returns structured error details, if the server sent any.
    pub fn details(&self) -> Option<&serde_json::Value> {
        self.api_error()?.details.as_ref()
    }

    /// Returns field-level validation failures for [`Error::Validation`].
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Error::Validation { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Deserialization { raw_response, .. } => Some(raw_response),
            other => other.api_error().map(|e| e.raw_body.as_str()),
        }
    }

    /// Returns `true` if no response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

/// A specialized `Result` type for banking API calls.
pub type Result<T> = std::result::Result<T, Error>;
