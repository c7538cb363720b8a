//! Router state management: the logical navigation stack and the callbacks
//! waiting for results.
//!
//! Both containers are plain data owned by [`RouterCore`](crate::core); they
//! are only ever touched from the router's command loop.

use crate::action::RouteAction;
use crate::params::RouteParams;
use crate::trace_log;
use std::collections::HashMap;
use std::fmt;

/// Callback receiving a destination's result; `None` means "no result".
pub type ResultCallback = Box<dyn FnOnce(Option<RouteParams>) + Send + 'static>;

/// One presented destination.
#[derive(Debug, Clone)]
pub(crate) struct StackEntry {
    pub(crate) instance_key: String,
    pub(crate) action: RouteAction,
}

/// Active destinations, bottom to top, unique by instance key.
#[derive(Debug, Default)]
pub(crate) struct ActiveStack {
    entries: Vec<StackEntry>,
}

impl ActiveStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains(&self, instance_key: &str) -> bool {
        self.position(instance_key).is_some()
    }

    /// Push a new entry. Returns `false` (and changes nothing) if the key is
    /// already active.
    pub(crate) fn insert(&mut self, instance_key: String, action: RouteAction) -> bool {
        if self.contains(&instance_key) {
            return false;
        }
        self.entries.push(StackEntry {
            instance_key,
            action,
        });
        true
    }

    /// Remove an entry wherever it sits in the stack.
    pub(crate) fn remove(&mut self, instance_key: &str) -> Option<StackEntry> {
        let index = self.position(instance_key)?;
        Some(self.entries.remove(index))
    }

    pub(crate) fn get(&self, instance_key: &str) -> Option<&StackEntry> {
        self.entries
            .iter()
            .find(|entry| entry.instance_key == instance_key)
    }

    /// Swap the action of an active entry, returning the previous one.
    pub(crate) fn replace_action(
        &mut self,
        instance_key: &str,
        action: RouteAction,
    ) -> Option<RouteAction> {
        let index = self.position(instance_key)?;
        Some(std::mem::replace(&mut self.entries[index].action, action))
    }

    pub(crate) fn top(&self) -> Option<&StackEntry> {
        self.entries.last()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.instance_key.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn position(&self, instance_key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.instance_key == instance_key)
    }
}

/// One-shot result callbacks keyed by instance key.
///
/// A callback leaves the map the moment it is invoked, so it can never run
/// twice. Each registration gets its own generation number, which lets a
/// late delivery from a closed destination tell itself apart from the next
/// destination pushed under the same key.
#[derive(Default)]
pub(crate) struct PendingResults {
    callbacks: HashMap<String, PendingResult>,
    next_generation: u64,
}

struct PendingResult {
    generation: u64,
    callback: ResultCallback,
}

impl PendingResults {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a callback and return its generation. Returns `None` if one
    /// is already pending for the key; the existing callback is kept.
    pub(crate) fn register(
        &mut self,
        instance_key: String,
        callback: ResultCallback,
    ) -> Option<u64> {
        if self.callbacks.contains_key(&instance_key) {
            return None;
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.callbacks.insert(
            instance_key,
            PendingResult {
                generation,
                callback,
            },
        );
        Some(generation)
    }

    pub(crate) fn contains(&self, instance_key: &str) -> bool {
        self.callbacks.contains_key(instance_key)
    }

    /// Remove the callback without invoking it.
    pub(crate) fn discard(&mut self, instance_key: &str) -> bool {
        self.callbacks.remove(instance_key).is_some()
    }

    /// Invoke and remove the callback for `instance_key`.
    ///
    /// Returns `false` if nothing was pending; the result is then dropped.
    pub(crate) fn complete(&mut self, instance_key: &str, result: Option<RouteParams>) -> bool {
        self.complete_matching(instance_key, None, result)
    }

    /// Like [`complete`](Self::complete), but only for the registration
    /// with the given generation.
    pub(crate) fn complete_generation(
        &mut self,
        instance_key: &str,
        generation: u64,
        result: Option<RouteParams>,
    ) -> bool {
        self.complete_matching(instance_key, Some(generation), result)
    }

    fn complete_matching(
        &mut self,
        instance_key: &str,
        generation: Option<u64>,
        result: Option<RouteParams>,
    ) -> bool {
        let current = self.callbacks.get(instance_key).map(|p| p.generation);
        match (current, generation) {
            (None, _) => return false,
            (Some(current), Some(wanted)) if current != wanted => {
                trace_log!(
                    "Stale result for '{}' ignored (generation {}, current {})",
                    instance_key,
                    wanted,
                    current
                );
                return false;
            }
            _ => {}
        }
        let Some(pending) = self.callbacks.remove(instance_key) else {
            return false;
        };
        trace_log!(
            "Delivering {} result to '{}'",
            if result.is_some() { "a" } else { "no" },
            instance_key
        );
        (pending.callback)(result);
        true
    }

    /// Answer every pending callback with "no result".
    pub(crate) fn drain_without_result(&mut self) -> usize {
        let drained: Vec<_> = self.callbacks.drain().collect();
        let count = drained.len();
        for (_, pending) in drained {
            (pending.callback)(None);
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }
}

impl fmt::Debug for PendingResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResults")
            .field("keys", &self.callbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}
