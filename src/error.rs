//! Error handling for the router.
//!
//! Every failure is reported to the caller through the
//! [`Completion`](crate::Completion) of the request that caused it. Nothing
//! here is ever thrown across the command loop, and none of these conditions
//! stop the router.
//!
//! # Examples
//!
//! ```
//! use hybrid_navigator::NavigationError;
//!
//! let err = NavigationError::DuplicateInstance { instance_key: "d1".into() };
//! assert_eq!(err.to_string(), "Instance 'd1' is already on the stack");
//! assert_eq!(err.instance_key(), Some("d1"));
//! ```

use std::fmt;

/// Outcome type delivered by router completions.
pub type NavigationResult<T> = Result<T, NavigationError>;

/// Reasons a push, close, update or start request did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// The effective instance key is already active on the stack.
    DuplicateInstance { instance_key: String },

    /// The resolver declined the requested url.
    NoMatch { url: String },

    /// The push handler reported failure (or panicked).
    HandlerFailed { instance_key: String, reason: String },

    /// A close or update referenced a key that is not on the stack.
    UnknownInstance { instance_key: String },

    /// The embedded engine failed to initialise.
    StartupFailed { message: String },

    /// The router's command loop is no longer running.
    RouterClosed,
}

impl NavigationError {
    /// The instance key the error refers to, if any.
    pub fn instance_key(&self) -> Option<&str> {
        match self {
            NavigationError::DuplicateInstance { instance_key }
            | NavigationError::HandlerFailed { instance_key, .. }
            | NavigationError::UnknownInstance { instance_key } => Some(instance_key),
            _ => None,
        }
    }

    pub(crate) fn handler_failed(instance_key: &str, reason: impl Into<String>) -> Self {
        NavigationError::HandlerFailed {
            instance_key: instance_key.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationError::DuplicateInstance { instance_key } => {
                write!(f, "Instance '{}' is already on the stack", instance_key)
            }
            NavigationError::NoMatch { url } => {
                write!(f, "No route resolved for: {}", url)
            }
            NavigationError::HandlerFailed {
                instance_key,
                reason,
            } => {
                write!(f, "Push handler failed for '{}': {}", instance_key, reason)
            }
            NavigationError::UnknownInstance { instance_key } => {
                write!(f, "Instance '{}' is not on the stack", instance_key)
            }
            NavigationError::StartupFailed { message } => {
                write!(f, "Embedded engine failed to start: {}", message)
            }
            NavigationError::RouterClosed => write!(f, "Router is closed"),
        }
    }
}

impl std::error::Error for NavigationError {}

/// Render a caught panic payload as a message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
