//! Attempt hooks for logging, metrics and tracing.
//!
//! A [`Hook`] observes every physical attempt of every logical call: once
//! before the request is sent and once after it completes, whether it
//! succeeded, received an error status, or failed in transport (status `0`).
//!
//! Hooks are registered on the [`ClientBuilder`](crate::ClientBuilder) and frozen
//! when the client is built. Dispatch is sequential in registration order.
//! A panicking hook does not stop the remaining hooks from running, but the
//! logical call then terminates with [`Error::Fault`].

use crate::{idempotency::IdempotencyKey, request::Verb, Error, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Information passed to [`Hook::before_attempt`].
#[derive(Debug, Clone, Copy)]
pub struct AttemptStart<'a> {
    /// The HTTP method.
    pub verb: Verb,
    /// The request path, relative to the base URL.
    pub path: &'a str,
    /// The serialized request body, if any.
    pub body: Option<&'a [u8]>,
    /// The attempt number, starting at 1.
    pub attempt: usize,
    /// The idempotency key sent with this attempt.
    pub idempotency_key: Option<&'a IdempotencyKey>,
}

/// Information passed to [`Hook::after_attempt`].
#[derive(Debug, Clone, Copy)]
pub struct AttemptEnd<'a> {
    /// The HTTP method.
    pub verb: Verb,
    /// The request path, relative to the base URL.
    pub path: &'a str,
    /// The attempt number, starting at 1.
    pub attempt: usize,
    /// The response status, or `0` if no response was received.
    pub status: u16,
    /// Time spent in this attempt.
    pub elapsed: Duration,
    /// The attempt's error, if it failed.
    pub error: Option<&'a Error>,
    /// The idempotency key sent with this attempt.
    pub idempotency_key: Option<&'a IdempotencyKey>,
}

/// An observer of physical attempts.
///
/// Both callbacks default to no-ops, so a hook implements only what it needs.
///
/// # Examples
///
/// ```
/// use pixbank::hooks::{AttemptEnd, Hook};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct FailureCounter(AtomicUsize);
///
/// impl Hook for FailureCounter {
///     fn after_attempt(&self, attempt: &AttemptEnd<'_>) {
///         if attempt.error.is_some() {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait Hook: Send + Sync {
    /// Called before each physical attempt is sent.
    fn before_attempt(&self, _attempt: &AttemptStart<'_>) {}

    /// Called exactly once after each physical attempt completes.
    fn after_attempt(&self, _attempt: &AttemptEnd<'_>) {}
}

/// The ordered, immutable hook list owned by a client.
#[derive(Clone, Default)]
pub struct Hooks {
    hooks: Arc<[Arc<dyn Hook>]>,
}

impl Hooks {
    pub(crate) fn new(hooks: Vec<Arc<dyn Hook>>) -> Self {
        Self {
            hooks: hooks.into(),
        }
    }

    /// Returns the number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns `true` if no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub(crate) fn before_attempt(&self, attempt: &AttemptStart<'_>) -> Result<()> {
        self.dispatch(|hook| hook.before_attempt(attempt))
    }

    pub(crate) fn after_attempt(&self, attempt: &AttemptEnd<'_>) -> Result<()> {
        self.dispatch(|hook| hook.after_attempt(attempt))
    }

    /// Runs `f` on every hook; the first panic is reported once all have run.
    fn dispatch<F>(&self, f: F) -> Result<()>
    where
        F: Fn(&dyn Hook),
    {
        let mut fault = None;
        for hook in self.hooks.iter() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(hook.as_ref()))) {
                tracing::warn!(
                    message = %crate::fault::panic_message(payload.as_ref()),
                    "Hook panicked"
                );
                fault.get_or_insert(payload);
            }
        }
        match fault {
            Some(payload) => Err(Error::from_panic(payload)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").field("len", &self.hooks.len()).finish()
    }
}

/// A hook that emits one structured `tracing` event per attempt start and end.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHook;

impl Hook for TracingHook {
    fn before_attempt(&self, attempt: &AttemptStart<'_>) {
        tracing::debug!(
            method = %attempt.verb,
            path = %attempt.path,
            attempt = attempt.attempt,
            body_size = attempt.body.map(<[u8]>::len),
            idempotency_key = attempt.idempotency_key.map(IdempotencyKey::as_str),
            "Attempt started"
        );
    }

    fn after_attempt(&self, attempt: &AttemptEnd<'_>) {
        match attempt.error {
            None => tracing::debug!(
                method = %attempt.verb,
                path = %attempt.path,
                attempt = attempt.attempt,
                status = attempt.status,
                elapsed_ms = attempt.elapsed.as_millis() as u64,
                "Attempt succeeded"
            ),
            Some(error) => tracing::warn!(
                method = %attempt.verb,
                path = %attempt.path,
                attempt = attempt.attempt,
                status = attempt.status,
                elapsed_ms = attempt.elapsed.as_millis() as u64,
                kind = %error.kind(),
                error = %error,
                "Attempt failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Hook for Recorder {
        fn before_attempt(&self, attempt: &AttemptStart<'_>) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:before:{}", self.name, attempt.attempt));
        }

        fn after_attempt(&self, attempt: &AttemptEnd<'_>) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:after:{}", self.name, attempt.status));
        }
    }

    struct Panicker;

    impl Hook for Panicker {
        fn before_attempt(&self, _attempt: &AttemptStart<'_>) {
            panic!("before hook failed");
        }
    }

    fn start() -> AttemptStart<'static> {
        AttemptStart {
            verb: Verb::Get,
            path: "/pix",
            body: None,
            attempt: 1,
            idempotency_key: None,
        }
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks::new(vec![
            Arc::new(Recorder { name: "a", log: log.clone() }),
            Arc::new(Recorder { name: "b", log: log.clone() }),
        ]);

        hooks.before_attempt(&start()).unwrap();
        hooks
            .after_attempt(&AttemptEnd {
                verb: Verb::Get,
                path: "/pix",
                attempt: 1,
                status: 200,
                elapsed: Duration::from_millis(3),
                error: None,
                idempotency_key: None,
            })
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:before:1", "b:before:1", "a:after:200", "b:after:200"]
        );
    }

    #[test]
    fn test_panicking_hook_does_not_stop_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks::new(vec![
            Arc::new(Panicker),
            Arc::new(Recorder { name: "after-panic", log: log.clone() }),
        ]);

        let err = hooks.before_attempt(&start()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fault);
        assert!(err.to_string().contains("before hook failed"));
        assert_eq!(*log.lock().unwrap(), vec!["after-panic:before:1"]);
    }

    #[test]
    fn test_empty_registry() {
        let hooks = Hooks::default();
        assert!(hooks.is_empty());
        assert!(hooks.before_attempt(&start()).is_ok());
    }
}
