//! Push handlers: performing the navigation a resolver decided on.
//!
//! The router never renders anything itself. After resolution it hands the
//! [`RouteAction`] to the installed [`PushHandler`], which presents the
//! destination in whichever runtime the action designates and reports back
//! with a [`PushDisposition`].
//!
//! # Results
//!
//! When the caller asked for a result, the handler's [`PushContext`] carries
//! a [`ResultSink`]. The handler (or the screen it presented) may call
//! [`ResultSink::deliver`] from any thread, at any later time; the result is
//! marshalled back onto the router's command loop and handed to the caller's
//! callback exactly once. A handler that cannot produce results answers
//! [`PushDisposition::PresentedWithoutResult`] instead, and the caller is told
//! "no result". Closing the destination always settles a callback that is
//! still waiting.
//!
//! # Embedded rendering
//!
//! [`EmbeddedEngine`] is the boundary to the secondary UI engine. The
//! [`HybridPushHandler`] sends [`Renderer::Embedded`](crate::Renderer::Embedded)
//! actions to the router's engine and everything else to a native handler.
//!
//! # Example
//!
//! ```no_run
//! use hybrid_navigator::{push_handler_fn, PushDisposition};
//!
//! let native = push_handler_fn(|action, ctx| {
//!     println!("open native screen {} as {}", action.url(), ctx.instance_key());
//!     if let Some(sink) = ctx.take_result_sink() {
//!         // keep `sink` with the screen and deliver when it closes
//!         drop(sink);
//!     }
//!     PushDisposition::Presented
//! });
//! ```

use crate::action::RouteAction;
use crate::core::{Command, Mailbox};
use crate::params::RouteParams;
use crate::{debug_log, warn_log};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// PushDisposition
// ============================================================================

/// What a push handler did with an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushDisposition {
    /// The destination is shown and may deliver a result later.
    Presented,
    /// The destination is shown but will never deliver a result.
    PresentedWithoutResult,
    /// Navigation was not performed.
    Rejected { reason: String },
}

impl PushDisposition {
    /// Create a rejection with a human-readable reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// `true` unless the push was rejected.
    pub fn is_presented(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

impl From<bool> for PushDisposition {
    fn from(handled: bool) -> Self {
        if handled {
            Self::Presented
        } else {
            Self::rejected("handler declined")
        }
    }
}

// ============================================================================
// ResultSink
// ============================================================================

/// One-shot channel back to the caller waiting for a destination's result.
///
/// `deliver` consumes the sink, so a result can be sent at most once. Sinks
/// are `Send` and may be moved to whichever thread owns the presented
/// screen. Dropping a sink without delivering is allowed; the caller is then
/// answered when the destination closes.
pub struct ResultSink {
    instance_key: String,
    /// Registration this sink answers; a later push under the same key gets
    /// a different one.
    generation: u64,
    mailbox: Mailbox,
}

impl ResultSink {
    pub(crate) fn new(instance_key: String, generation: u64, mailbox: Mailbox) -> Self {
        Self {
            instance_key,
            generation,
            mailbox,
        }
    }

    /// Instance key of the destination this sink belongs to.
    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    /// Send the destination's result (`None` for "no result").
    ///
    /// Returns `false` if the router has shut down.
    pub fn deliver(self, result: Option<RouteParams>) -> bool {
        debug_log!("Result posted for '{}'", self.instance_key);
        self.mailbox.post(Command::DeliverResult {
            instance_key: self.instance_key,
            generation: self.generation,
            result,
        })
    }
}

impl fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSink")
            .field("instance_key", &self.instance_key)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PushContext
// ============================================================================

/// Per-call context handed to a [`PushHandler`].
pub struct PushContext<'a> {
    instance_key: &'a str,
    engine: Option<&'a Arc<dyn EmbeddedEngine>>,
    results: Option<ResultSink>,
}

impl<'a> PushContext<'a> {
    pub(crate) fn new(
        instance_key: &'a str,
        engine: Option<&'a Arc<dyn EmbeddedEngine>>,
        results: Option<ResultSink>,
    ) -> Self {
        Self {
            instance_key,
            engine,
            results,
        }
    }

    /// Effective instance key the destination is tracked under.
    pub fn instance_key(&self) -> &str {
        self.instance_key
    }

    /// The router's embedded engine, if one is installed.
    pub fn engine(&self) -> Option<&Arc<dyn EmbeddedEngine>> {
        self.engine
    }

    /// `true` if the caller is waiting for a result.
    pub fn expects_result(&self) -> bool {
        self.results.is_some()
    }

    /// Take the result sink, if the caller asked for a result.
    pub fn take_result_sink(&mut self) -> Option<ResultSink> {
        self.results.take()
    }
}

// ============================================================================
// PushHandler trait
// ============================================================================

/// Performs the actual navigation for resolved actions.
///
/// All methods run on the router's command loop and must return promptly;
/// anything slow (animations, view construction) should be scheduled by the
/// handler and completed asynchronously, reporting back through the
/// [`ResultSink`].
pub trait PushHandler: Send + Sync + 'static {
    /// Present `action`.
    fn push(&self, action: &RouteAction, ctx: &mut PushContext<'_>) -> PushDisposition;

    /// Dismiss the destination previously presented for `action`.
    ///
    /// Returns `false` if the UI could not be dismissed.
    fn dismiss(&self, action: &RouteAction, ctx: &mut PushContext<'_>) -> bool {
        let _ = (action, ctx);
        true
    }

    /// Apply a new url/params to a destination that is already shown.
    ///
    /// The default does not support updates.
    fn update(&self, action: &RouteAction, ctx: &mut PushContext<'_>) -> bool {
        let _ = (action, ctx);
        false
    }

    /// Handler name for logging.
    fn name(&self) -> &'static str {
        "PushHandler"
    }
}

/// Create a push handler from a function or closure.
///
/// The closure may return a [`PushDisposition`] or a plain `bool`.
pub const fn push_handler_fn<F, R>(f: F) -> FnPushHandler<F>
where
    F: Fn(&RouteAction, &mut PushContext<'_>) -> R + Send + Sync + 'static,
    R: Into<PushDisposition>,
{
    FnPushHandler { f }
}

/// Push handler created from a function or closure.
pub struct FnPushHandler<F> {
    f: F,
}

impl<F, R> PushHandler for FnPushHandler<F>
where
    F: Fn(&RouteAction, &mut PushContext<'_>) -> R + Send + Sync + 'static,
    R: Into<PushDisposition>,
{
    fn push(&self, action: &RouteAction, ctx: &mut PushContext<'_>) -> PushDisposition {
        (self.f)(action, ctx).into()
    }

    fn name(&self) -> &'static str {
        "FnPushHandler"
    }
}

// ============================================================================
// EmbeddedEngine
// ============================================================================

/// The embedded UI engine, as seen from the router.
///
/// Implemented by [`ChannelEngine`](crate::ChannelEngine), which forwards
/// each call over the cross-runtime transport.
pub trait EmbeddedEngine: Send + Sync + 'static {
    /// Begin engine initialisation, forwarding the host's start arguments.
    ///
    /// The engine answers later through
    /// [`Router::engine_ready`](crate::Router::engine_ready) or
    /// [`Router::engine_failed`](crate::Router::engine_failed).
    fn start(&self, args: Option<&Value>);

    /// Create an embedded view for `action`, tracked as `instance_key`.
    fn create_view(&self, instance_key: &str, action: &RouteAction) -> bool;

    /// Point an existing embedded view at a new url/params.
    fn update_route(&self, instance_key: &str, action: &RouteAction) -> bool;

    /// Tear down the embedded view tracked as `instance_key`.
    fn close_view(&self, instance_key: &str) -> bool {
        let _ = instance_key;
        true
    }
}

// ============================================================================
// HybridPushHandler
// ============================================================================

/// Routes embedded actions to the router's [`EmbeddedEngine`] and everything
/// else to a native handler.
///
/// ```no_run
/// use hybrid_navigator::{push_handler_fn, HybridPushHandler};
///
/// let handler = HybridPushHandler::new(push_handler_fn(|_action, _ctx| true));
/// ```
pub struct HybridPushHandler {
    native: Arc<dyn PushHandler>,
}

impl HybridPushHandler {
    /// Wrap `native`, which keeps handling [`Renderer::Native`](crate::Renderer::Native) actions.
    pub fn new(native: impl PushHandler) -> Self {
        Self {
            native: Arc::new(native),
        }
    }

    /// Wrap an already shared native handler.
    pub fn from_arc(native: Arc<dyn PushHandler>) -> Self {
        Self { native }
    }
}

impl PushHandler for HybridPushHandler {
    fn push(&self, action: &RouteAction, ctx: &mut PushContext<'_>) -> PushDisposition {
        if !action.renderer().is_embedded() {
            return self.native.push(action, ctx);
        }
        let Some(engine) = ctx.engine() else {
            warn_log!(
                "No embedded engine installed for '{}' ({})",
                ctx.instance_key(),
                action.url()
            );
            return PushDisposition::rejected("no embedded engine installed");
        };
        if engine.create_view(ctx.instance_key(), action) {
            // Embedded screens return their result through a bridge close.
            PushDisposition::Presented
        } else {
            PushDisposition::rejected("embedded engine refused to create view")
        }
    }

    fn dismiss(&self, action: &RouteAction, ctx: &mut PushContext<'_>) -> bool {
        if !action.renderer().is_embedded() {
            return self.native.dismiss(action, ctx);
        }
        ctx.engine()
            .is_some_and(|engine| engine.close_view(ctx.instance_key()))
    }

    fn update(&self, action: &RouteAction, ctx: &mut PushContext<'_>) -> bool {
        if !action.renderer().is_embedded() {
            return self.native.update(action, ctx);
        }
        ctx.engine()
            .is_some_and(|engine| engine.update_route(ctx.instance_key(), action))
    }

    fn name(&self) -> &'static str {
        "HybridPushHandler"
    }
}
