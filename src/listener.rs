//! Route listeners and their registry.
//!
//! Listeners observe navigation without taking part in it. The registry
//! holds them **weakly**: registering a listener does not keep it alive, and
//! a listener that is dropped by its owner silently stops receiving events.
//!
//! # Dispatch rules
//!
//! - Events are delivered synchronously on the router's command loop, in
//!   registration order.
//! - Every listener registered at dispatch time receives each event exactly
//!   once. Registering the same listener twice has the effect of one
//!   registration; removing an unknown listener is a no-op.
//! - A panicking listener is logged and skipped; the remaining listeners
//!   still receive the event.
//!
//! # Example
//!
//! ```
//! use hybrid_navigator::{RouteAction, RouteListener, RouteRequest};
//!
//! struct Analytics;
//!
//! impl RouteListener for Analytics {
//!     fn on_route_handled(&self, action: &RouteAction) {
//!         println!("page view: {}", action.url());
//!     }
//! }
//! ```

use crate::action::{RouteAction, RouteRequest};
use crate::error::panic_message;
use crate::{debug_log, error_log, trace_log};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

/// Observer of router events. Every method is optional.
pub trait RouteListener: Send + Sync + 'static {
    /// A push request was resolved and accepted onto the stack.
    ///
    /// `request` is what the caller asked for, `action` what the resolver
    /// produced.
    fn on_route_resolved(&self, request: &RouteRequest, action: &RouteAction) {
        let _ = (request, action);
    }

    /// The push handler presented `action`.
    fn on_route_handled(&self, action: &RouteAction) {
        let _ = action;
    }

    /// The destination tracked as `instance_key` was closed.
    fn on_route_closed(&self, instance_key: &str, action: &RouteAction) {
        let _ = (instance_key, action);
    }
}

/// Identity of a listener: the address of its shared allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ListenerId(usize);

impl ListenerId {
    pub(crate) fn of(listener: &Arc<dyn RouteListener>) -> Self {
        Self(Arc::as_ptr(listener).cast::<()>() as usize)
    }
}

struct Registration {
    id: ListenerId,
    listener: Weak<dyn RouteListener>,
}

/// Ordered, identity-keyed set of weakly held listeners.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    entries: Vec<Registration>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. Returns `false` if it was already registered.
    pub(crate) fn add(&mut self, id: ListenerId, listener: Weak<dyn RouteListener>) -> bool {
        self.prune();
        if self.entries.iter().any(|entry| entry.id == id) {
            trace_log!("Listener {:?} already registered", id);
            return false;
        }
        self.entries.push(Registration { id, listener });
        debug_log!("Listener added ({} registered)", self.entries.len());
        true
    }

    /// Unregister by identity. Returns `false` if it was not registered.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        let removed = self.entries.len() != before;
        if removed {
            debug_log!("Listener removed ({} registered)", self.entries.len());
        }
        removed
    }

    /// Number of registrations whose listener is still alive.
    pub(crate) fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.listener.strong_count() > 0)
            .count()
    }

    pub(crate) fn notify_resolved(&mut self, request: &RouteRequest, action: &RouteAction) {
        self.dispatch("on_route_resolved", |listener| {
            listener.on_route_resolved(request, action);
        });
    }

    pub(crate) fn notify_handled(&mut self, action: &RouteAction) {
        self.dispatch("on_route_handled", |listener| {
            listener.on_route_handled(action);
        });
    }

    pub(crate) fn notify_closed(&mut self, instance_key: &str, action: &RouteAction) {
        self.dispatch("on_route_closed", |listener| {
            listener.on_route_closed(instance_key, action);
        });
    }

    fn dispatch(&mut self, event: &'static str, f: impl Fn(&dyn RouteListener)) {
        self.prune();
        for entry in &self.entries {
            let Some(listener) = entry.listener.upgrade() else {
                continue;
            };
            trace_log!("Dispatching {} to listener {:?}", event, entry.id);
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))) {
                error_log!(
                    "Listener {:?} panicked in {}: {}",
                    entry.id,
                    event,
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    /// Drop registrations whose listener no longer exists.
    fn prune(&mut self) {
        self.entries
            .retain(|entry| entry.listener.strong_count() > 0);
    }
}
