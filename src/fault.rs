//! Conversion of caught panics into [`Error::Fault`].

use crate::Error;
use std::any::Any;
use std::backtrace::Backtrace;

/// Extracts the message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Error {
    /// Builds a [`Error::Fault`] from a panic payload, capturing a backtrace
    /// at the point of recovery.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = panic_message(payload.as_ref());
        let trace = Backtrace::force_capture().to_string();
        tracing::error!(message = %message, "Recovered fault during request");
        Error::Fault { message, trace }
    }
}
