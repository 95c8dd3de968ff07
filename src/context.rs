//! Per-call context: idempotency carrier, deadline and cancellation.

use crate::idempotency::IdempotencyKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Cancellation handle for in-flight calls.
///
/// Clones share the same state; cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    notify: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            notify: Arc::new(tx),
        }
    }

    /// Cancels every call observing this token.
    pub fn cancel(&self) {
        self.notify.send_replace(true);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.notify.borrow()
    }

    /// Resolves when the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.notify.subscribe();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives as long as `self`, so this only happens if the
            // channel is torn down mid-await; never resolve in that case.
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The context of one logical call.
///
/// Carries the optional idempotency key, an absolute deadline covering every
/// attempt and backoff sleep, and an optional cancellation token. A context is
/// cheap to clone and is never shared mutably between calls.
///
/// # Examples
///
/// ```
/// use pixbank::{CallContext, IdempotencyKey};
/// use std::time::Duration;
///
/// let ctx = CallContext::new()
///     .with_idempotency_key("e2e-7f3a")
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(ctx.idempotency_key().map(IdempotencyKey::as_str), Some("e2e-7f3a"));
/// assert!(ctx.deadline().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    idempotency_key: Option<IdempotencyKey>,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl CallContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches an idempotency token. An empty token leaves the key absent.
    pub fn with_idempotency_key(mut self, token: impl Into<String>) -> Self {
        self.idempotency_key = IdempotencyKey::new(token);
        self
    }

    /// Attaches an already-built idempotency key.
    pub fn with_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    /// Returns the idempotency key, if one is present.
    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }

    /// Sets an absolute deadline for the whole logical call.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Attaches a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns the cancellation token, if one is attached.
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Returns `true` if the attached token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
