//! Router configuration.

/// What a result-only close does when its key is no longer on the stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanResultPolicy {
    /// Deliver to a still-pending callback (if any) and report success.
    #[default]
    Deliver,
    /// Fail with [`UnknownInstance`](crate::NavigationError::UnknownInstance).
    Reject,
}

/// Behavioural switches for a [`Router`](crate::Router).
///
/// ```
/// use hybrid_navigator::{OrphanResultPolicy, RouterConfig};
///
/// let config = RouterConfig::default()
///     .with_name("main")
///     .with_orphan_results(OrphanResultPolicy::Reject);
/// assert_eq!(config.name, "main");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Label used in log lines.
    pub name: String,
    /// Handling of result-only closes for keys no longer on the stack.
    pub orphan_results: OrphanResultPolicy,
    /// When a handler presents a destination without result support, answer
    /// the caller's result callback with "no result" right away (`true`) or
    /// only when the destination closes (`false`).
    pub immediate_no_result: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name: "router".to_string(),
            orphan_results: OrphanResultPolicy::Deliver,
            immediate_no_result: true,
        }
    }
}

impl RouterConfig {
    /// Set the log label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the orphan result policy.
    pub fn with_orphan_results(mut self, policy: OrphanResultPolicy) -> Self {
        self.orphan_results = policy;
        self
    }

    /// Choose when result-less destinations answer their callback.
    pub fn with_immediate_no_result(mut self, immediate: bool) -> Self {
        self.immediate_no_result = immediate;
        self
    }
}
