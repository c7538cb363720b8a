//! Test utilities shared by the integration tests.
//!
//! Provides recording listeners, handlers and engines plus helpers for
//! spinning up a router on the test runtime.

#![allow(dead_code)]

use hybrid_navigator::*;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Route log output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Spawn a router with `handler` and the default pass-through resolver.
pub fn spawn_router(handler: impl PushHandler) -> (Router, JoinHandle<()>) {
    init_logging();
    RouterBuilder::new()
        .config(RouterConfig::default().with_name("test"))
        .push_handler(handler)
        .spawn()
}

// ============================================================================
// Listener
// ============================================================================

/// Listener that records every event as a readable line.
#[derive(Default)]
pub struct RecordingListener {
    label: &'static str,
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new(label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            label,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, line: String) {
        let line = if self.label.is_empty() {
            line
        } else {
            format!("{}:{}", self.label, line)
        };
        self.events.lock().unwrap().push(line);
    }
}

impl RouteListener for RecordingListener {
    fn on_route_resolved(&self, request: &RouteRequest, action: &RouteAction) {
        self.record(format!("resolved {} -> {}", request.url, action.url()));
    }

    fn on_route_handled(&self, action: &RouteAction) {
        self.record(format!("handled {}", action.url()));
    }

    fn on_route_closed(&self, instance_key: &str, _action: &RouteAction) {
        self.record(format!("closed {}", instance_key));
    }
}

/// Coerce for registration while keeping the concrete handle.
pub fn as_listener(listener: &Arc<RecordingListener>) -> Arc<dyn RouteListener> {
    listener.clone()
}

// ============================================================================
// Push handler
// ============================================================================

#[derive(Default)]
struct HandlerState {
    pushed: Vec<(String, String)>,
    dismissed: Vec<String>,
    updated: Vec<(String, String)>,
    sinks: HashMap<String, ResultSink>,
    rejected_urls: Vec<String>,
    without_results: bool,
}

/// Push handler that accepts everything (unless told otherwise), keeps the
/// result sinks it receives and records every call.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    state: Arc<Mutex<HandlerState>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject pushes of `url`.
    pub fn rejecting(self, url: &str) -> Self {
        self.state.lock().unwrap().rejected_urls.push(url.to_string());
        self
    }

    /// Present everything as unable to produce results.
    pub fn without_results(self) -> Self {
        self.state.lock().unwrap().without_results = true;
        self
    }

    /// `(instance key, url)` for every presented push, in order.
    pub fn pushed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().pushed.clone()
    }

    pub fn dismissed(&self) -> Vec<String> {
        self.state.lock().unwrap().dismissed.clone()
    }

    pub fn updated(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().updated.clone()
    }

    /// The result sink handed over for `instance_key`.
    pub fn take_sink(&self, instance_key: &str) -> Option<ResultSink> {
        self.state.lock().unwrap().sinks.remove(instance_key)
    }
}

impl PushHandler for RecordingHandler {
    fn push(&self, action: &RouteAction, ctx: &mut PushContext<'_>) -> PushDisposition {
        let mut state = self.state.lock().unwrap();
        if state.rejected_urls.iter().any(|url| url == action.url()) {
            return PushDisposition::rejected(format!("{} is not available", action.url()));
        }
        state
            .pushed
            .push((ctx.instance_key().to_string(), action.url().to_string()));
        if state.without_results {
            return PushDisposition::PresentedWithoutResult;
        }
        if let Some(sink) = ctx.take_result_sink() {
            state.sinks.insert(ctx.instance_key().to_string(), sink);
        }
        PushDisposition::Presented
    }

    fn dismiss(&self, _action: &RouteAction, ctx: &mut PushContext<'_>) -> bool {
        self.state
            .lock()
            .unwrap()
            .dismissed
            .push(ctx.instance_key().to_string());
        true
    }

    fn update(&self, action: &RouteAction, ctx: &mut PushContext<'_>) -> bool {
        self.state
            .lock()
            .unwrap()
            .updated
            .push((ctx.instance_key().to_string(), action.url().to_string()));
        true
    }

    fn name(&self) -> &'static str {
        "RecordingHandler"
    }
}

// ============================================================================
// Embedded engine
// ============================================================================

/// Engine that records calls; readiness is signalled by the test.
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<String>>,
    starts: Mutex<Vec<Option<Value>>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn starts(&self) -> Vec<Option<Value>> {
        self.starts.lock().unwrap().clone()
    }
}

impl EmbeddedEngine for RecordingEngine {
    fn start(&self, args: Option<&Value>) {
        self.starts.lock().unwrap().push(args.cloned());
    }

    fn create_view(&self, instance_key: &str, action: &RouteAction) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push(format!("create {} {}", instance_key, action.url()));
        true
    }

    fn update_route(&self, instance_key: &str, action: &RouteAction) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push(format!("update {} {}", instance_key, action.url()));
        true
    }

    fn close_view(&self, instance_key: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push(format!("close {}", instance_key));
        true
    }
}

/// Assert that params hold `key` as the JSON string `expected`.
pub fn assert_param_equals(params: &RouteParams, key: &str, expected: &str) {
    assert_eq!(
        params.get_str(key),
        Some(expected),
        "Parameter '{}' has wrong value",
        key
    );
}
