//! Startup handshake with the embedded engine.
//!
//! ```text
//!              start requested            engine ready
//! NotStarted ──────────────────► Starting ─────────────► Ready (terminal)
//!      ▲                            │
//!      │                            │ engine failed
//!      │                            ▼
//!      └──── start requested ─── Failed
//! ```
//!
//! Start requests made while `Starting` are queued and answered with the
//! same outcome as the first one; requests made while `Ready` are answered
//! at once. Initialisation is triggered only on the `NotStarted`/`Failed` →
//! `Starting` edge.

use crate::error::{NavigationError, NavigationResult};
use crate::{debug_log, error_log, info_log, trace_log, warn_log};
use serde_json::Value;
use tokio::sync::oneshot;

/// Router readiness as seen by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Readiness {
    /// No start has been requested yet.
    #[default]
    NotStarted,
    /// The embedded engine is initialising.
    Starting,
    /// The embedded engine signalled it is ready.
    Ready,
    /// The last initialisation attempt failed; a new start may be requested.
    Failed,
}

/// Reply channel for one `start_route` caller.
pub(crate) type StartResponder = oneshot::Sender<NavigationResult<()>>;

/// Reply channel for one engine-side request for the start arguments.
pub(crate) type ArgsResponder = oneshot::Sender<NavigationResult<Option<Value>>>;

/// What the router must do after a start request.
#[derive(Debug, PartialEq)]
pub(crate) enum StartStep {
    /// Kick off engine initialisation with these arguments.
    Begin(Option<Value>),
    /// Nothing to do; the caller was queued or already answered.
    Wait,
}

#[derive(Debug, Default)]
pub(crate) struct StartupState {
    readiness: Readiness,
    waiters: Vec<StartResponder>,
    args_waiters: Vec<ArgsResponder>,
    start_args: Option<Value>,
}

impl StartupState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// Arguments forwarded by the most recent initialisation, once start was
    /// requested.
    pub(crate) fn start_args(&self) -> Option<&Value> {
        self.start_args.as_ref()
    }

    pub(crate) fn request(
        &mut self,
        args: Option<Value>,
        responder: Option<StartResponder>,
    ) -> StartStep {
        match self.readiness {
            Readiness::Ready => {
                debug_log!("Start requested while ready; answering immediately");
                if let Some(responder) = responder {
                    let _ = responder.send(Ok(()));
                }
                StartStep::Wait
            }
            Readiness::Starting => {
                debug_log!(
                    "Start requested while starting; queued ({} waiting)",
                    self.waiters.len() + 1
                );
                self.waiters.extend(responder);
                StartStep::Wait
            }
            Readiness::NotStarted | Readiness::Failed => {
                info_log!("Starting embedded engine");
                self.readiness = Readiness::Starting;
                self.start_args = args.clone();
                self.waiters.extend(responder);
                for waiter in self.args_waiters.drain(..) {
                    let _ = waiter.send(Ok(args.clone()));
                }
                StartStep::Begin(args)
            }
        }
    }

    /// Answer with the start arguments once a start has been requested.
    pub(crate) fn wait_for_args(&mut self, responder: ArgsResponder) {
        if self.readiness == Readiness::NotStarted {
            trace_log!("Start arguments requested before start; parked");
            self.args_waiters.push(responder);
        } else {
            let _ = responder.send(Ok(self.start_args.clone()));
        }
    }

    /// Transition `Starting` → `Ready`. Returns `false` if not starting.
    pub(crate) fn mark_ready(&mut self) -> bool {
        if self.readiness != Readiness::Starting {
            warn_log!("Ready signal ignored in state {:?}", self.readiness);
            return false;
        }
        self.readiness = Readiness::Ready;
        info_log!("Router ready ({} waiting start requests)", self.waiters.len());
        self.answer(&Ok(()));
        true
    }

    /// Transition `Starting` → `Failed`. Returns `false` if not starting.
    pub(crate) fn mark_failed(&mut self, message: String) -> bool {
        if self.readiness != Readiness::Starting {
            warn_log!("Failure signal ignored in state {:?}", self.readiness);
            return false;
        }
        self.readiness = Readiness::Failed;
        error_log!("Embedded engine failed to start: {}", message);
        self.answer(&Err(NavigationError::StartupFailed { message }));
        true
    }

    fn answer(&mut self, outcome: &NavigationResult<()>) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
    }
}
