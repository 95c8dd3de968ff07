//! Idempotency keys for mutating operations.
//!
//! The server deduplicates a mutating request that carries the same key more
//! than once. The executor never persists keys; a key lives exactly as long as
//! the logical call that chose it.

use std::fmt;
use uuid::Uuid;

/// An opaque, non-empty idempotency token.
///
/// Construction goes through [`IdempotencyKey::new`], which rejects empty
/// strings, so a key that exists is always sendable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Wraps a caller-supplied token. Returns `None` for an empty string.
    ///
    /// # Examples
    ///
    /// ```
    /// use pixbank::IdempotencyKey;
    ///
    /// assert!(IdempotencyKey::new("").is_none());
    /// assert_eq!(IdempotencyKey::new("abc").unwrap().as_str(), "abc");
    /// ```
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    /// Generates a fresh random key formatted as a version-4 UUID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
