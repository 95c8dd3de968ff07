//! Request description types.
//!
//! A [`Verb`] is one of the five methods the banking API accepts. [`RequestSpec`]
//! is the immutable, already-serialized form of one logical call that the
//! executor's attempt loop consumes.

use crate::idempotency::IdempotencyKey;
use bytes::Bytes;
use http::Method;
use std::fmt;

/// The HTTP methods supported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Verb {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    /// Returns the equivalent [`http::Method`].
    pub fn method(&self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Patch => Method::PATCH,
            Verb::Delete => Method::DELETE,
        }
    }

    /// Returns `true` for verbs that change server state.
    ///
    /// Mutating verbs are the ones that receive an auto-generated idempotency key.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Verb::Get)
    }

    /// Returns `true` for verbs that may be repeated after a transient failure.
    ///
    /// `GET` is safe by definition and `PUT` is idempotent by contract for this API.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Verb::Get | Verb::Put)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&Method> for Verb {
    type Error = crate::Error;

    fn try_from(method: &Method) -> Result<Self, Self::Error> {
        match *method {
            Method::GET => Ok(Verb::Get),
            Method::POST => Ok(Verb::Post),
            Method::PUT => Ok(Verb::Put),
            Method::PATCH => Ok(Verb::Patch),
            Method::DELETE => Ok(Verb::Delete),
            ref other => Err(crate::Error::Configuration(format!(
                "Unsupported HTTP method: {}",
                other
            ))),
        }
    }
}

/// One logical call, fully prepared.
///
/// Built once per call after the body has been serialized and the idempotency
/// key resolved; every physical attempt reads from the same request, so the body
/// bytes and the key are identical across retries.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// The HTTP method.
    pub verb: Verb,
    /// Path relative to the client's base URL.
    pub path: String,
    /// Serialized JSON body, if any.
    pub body: Option<Bytes>,
    /// The idempotency key chosen for this call, if any.
    pub idempotency_key: Option<IdempotencyKey>,
}

impl RequestSpec {
    /// Creates a request without body or idempotency key.
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            body: None,
            idempotency_key: None,
        }
    }

    /// Sets the serialized body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the idempotency key.
    pub fn with_idempotency_key(mut self, key: Option<IdempotencyKey>) -> Self {
        self.idempotency_key = key;
        self
    }
}

/// Joins a base URL and a relative path with exactly one `/` between them.
///
/// # Examples
///
/// ```
/// use pixbank::join_url;
///
/// assert_eq!(
///     join_url("https://api.example.com/", "/v1/x"),
///     "https://api.example.com/v1/x"
/// );
/// assert_eq!(
///     join_url("https://api.example.com", "v1/x"),
///     "https://api.example.com/v1/x"
/// );
/// ```
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_slash_combinations() {
        let expected = "https://api.example.com/v1/x";
        assert_eq!(join_url("https://api.example.com/", "/v1/x"), expected);
        assert_eq!(join_url("https://api.example.com", "v1/x"), expected);
        assert_eq!(join_url("https://api.example.com/", "v1/x"), expected);
        assert_eq!(join_url("https://api.example.com", "/v1/x"), expected);
        assert_eq!(join_url("https://api.example.com//", "//v1/x"), expected);
    }

    #[test]
    fn test_join_url_keeps_base_path() {
        assert_eq!(
            join_url("https://api.example.com/banking/", "/pix/cob"),
            "https://api.example.com/banking/pix/cob"
        );
    }

    #[test]
    fn test_verb_retry_and_mutation_sets() {
        assert!(Verb::Get.is_retryable());
        assert!(Verb::Put.is_retryable());
        assert!(!Verb::Post.is_retryable());
        assert!(!Verb::Patch.is_retryable());
        assert!(!Verb::Delete.is_retryable());

        assert!(!Verb::Get.is_mutating());
        for verb in [Verb::Post, Verb::Put, Verb::Patch, Verb::Delete] {
            assert!(verb.is_mutating(), "{} should be mutating", verb);
        }
    }

    #[test]
    fn test_verb_from_method() {
        assert_eq!(Verb::try_from(&Method::PATCH).unwrap(), Verb::Patch);
        assert!(Verb::try_from(&Method::HEAD).is_err());
    }
}
