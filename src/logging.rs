//! Logging abstraction layer.
//!
//! The router logs through these macros instead of naming a backend directly.
//! They dispatch to either the [`log`](https://docs.rs/log) or
//! [`tracing`](https://docs.rs/tracing) crate depending on which feature is
//! enabled. The two features are **mutually exclusive**; enable at most one.
//! With neither enabled the macros compile to nothing.
//!
//! | Feature    | Backend         | Default |
//! |------------|-----------------|---------|
//! | `log`      | `log` crate     | yes     |
//! | `tracing`  | `tracing` crate | no      |
//!
//! Every record is emitted under the [`LOG_TARGET`] target so hosts can
//! filter router output (`RUST_LOG=hybrid_navigator=debug`).
//!
//! ```ignore
//! use hybrid_navigator::{debug_log, warn_log};
//!
//! debug_log!("Resolved '{}' -> '{}'", request.url, action.url());
//! warn_log!("Rejected push for '{}': {}", key, err);
//! ```

/// Target used by every log record emitted by this crate.
pub const LOG_TARGET: &str = "hybrid_navigator";

/// Emit a **trace**-level log message.
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!(target: $crate::logging::LOG_TARGET, $($arg)*);
        #[cfg(feature = "log")]
        ::log::trace!(target: $crate::logging::LOG_TARGET, $($arg)*);
    };
}

/// Emit a **debug**-level log message.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(target: $crate::logging::LOG_TARGET, $($arg)*);
        #[cfg(feature = "log")]
        ::log::debug!(target: $crate::logging::LOG_TARGET, $($arg)*);
    };
}

/// Emit an **info**-level log message.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::info!(target: $crate::logging::LOG_TARGET, $($arg)*);
        #[cfg(feature = "log")]
        ::log::info!(target: $crate::logging::LOG_TARGET, $($arg)*);
    };
}

/// Emit a **warn**-level log message.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::warn!(target: $crate::logging::LOG_TARGET, $($arg)*);
        #[cfg(feature = "log")]
        ::log::warn!(target: $crate::logging::LOG_TARGET, $($arg)*);
    };
}

/// Emit an **error**-level log message.
#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::error!(target: $crate::logging::LOG_TARGET, $($arg)*);
        #[cfg(feature = "log")]
        ::log::error!(target: $crate::logging::LOG_TARGET, $($arg)*);
    };
}
