//! The public router handle and the task that runs it.
//!
//! A [`Router`] is a cheap, cloneable handle. Every method posts a command to
//! the router's queue and returns right away; the [`RouterTask`] owning the
//! state applies the commands one at a time. Methods that produce an outcome
//! return a [`Completion`] that can be awaited, or dropped for
//! fire-and-forget.
//!
//! # Example
//!
//! ```no_run
//! use hybrid_navigator::{push_handler_fn, PushRequest, RouterBuilder};
//!
//! # async fn demo() -> hybrid_navigator::NavigationResult<()> {
//! let (router, _task) = RouterBuilder::new()
//!     .push_handler(push_handler_fn(|_action, _ctx| true))
//!     .spawn();
//!
//! let (pushed, result) = router.push_for_result(PushRequest::new("/picker"));
//! pushed.await?;
//! // ... later the picker closes with a result
//! let picked = result.await;
//! # let _ = picked;
//! # Ok(())
//! # }
//! ```

use crate::action::{RouteAction, RouteRequest};
use crate::config::RouterConfig;
use crate::core::{Command, Mailbox, RouterCore};
use crate::error::{NavigationError, NavigationResult};
use crate::handler::{EmbeddedEngine, PushHandler};
use crate::listener::{ListenerId, RouteListener};
use crate::params::RouteParams;
use crate::resolver::RouteResolver;
use crate::stack::ResultCallback;
use crate::startup::Readiness;
use crate::{debug_log, info_log};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

// ============================================================================
// Requests
// ============================================================================

/// A push: the navigation request plus an optional result callback.
#[derive(Default)]
pub struct PushRequest {
    request: RouteRequest,
    on_result: Option<ResultCallback>,
}

impl PushRequest {
    /// Push `url` with no key, parameters or result callback.
    pub fn new(url: impl Into<String>) -> Self {
        Self::from(RouteRequest::new(url))
    }

    /// Set the instance key.
    pub fn with_instance_key(mut self, instance_key: impl Into<String>) -> Self {
        self.request.instance_key = instance_key.into();
        self
    }

    /// Set navigation parameters.
    pub fn with_params(mut self, params: RouteParams) -> Self {
        self.request.params = params;
        self
    }

    /// Set extension options.
    pub fn with_ext(mut self, ext: RouteParams) -> Self {
        self.request.ext = ext;
        self
    }

    /// Call `f` once with the destination's result (`None` for no result).
    ///
    /// The callback runs on the router's command loop.
    pub fn on_result<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Option<RouteParams>) + Send + 'static,
    {
        self.on_result = Some(Box::new(f));
        self
    }

    /// The underlying request.
    pub fn request(&self) -> &RouteRequest {
        &self.request
    }
}

impl From<RouteRequest> for PushRequest {
    fn from(request: RouteRequest) -> Self {
        Self {
            request,
            on_result: None,
        }
    }
}

impl From<&str> for PushRequest {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl fmt::Debug for PushRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushRequest")
            .field("request", &self.request)
            .field("on_result", &self.on_result.is_some())
            .finish()
    }
}

/// Close an active destination, optionally with a result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloseRequest {
    /// Instance key of the destination.
    pub instance_key: String,
    /// Result for the pusher's callback; `None` means "no result".
    pub result: Option<RouteParams>,
    /// Only deliver the result; leave the destination on the stack.
    pub send_result_only: bool,
}

impl CloseRequest {
    /// Close `instance_key` without a result.
    pub fn new(instance_key: impl Into<String>) -> Self {
        Self {
            instance_key: instance_key.into(),
            ..Self::default()
        }
    }

    /// Attach a result.
    pub fn with_result(mut self, result: RouteParams) -> Self {
        self.result = Some(result);
        self
    }

    /// Deliver the result without removing the destination.
    pub fn result_only(mut self) -> Self {
        self.send_result_only = true;
        self
    }
}

impl From<&str> for CloseRequest {
    fn from(instance_key: &str) -> Self {
        Self::new(instance_key)
    }
}

impl From<String> for CloseRequest {
    fn from(instance_key: String) -> Self {
        Self::new(instance_key)
    }
}

/// Point an active destination at a new url/params without changing its key.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    /// Instance key of the destination.
    pub instance_key: String,
    /// What to resolve in its place.
    pub request: RouteRequest,
}

impl UpdateRequest {
    pub fn new(instance_key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            instance_key: instance_key.into(),
            request: RouteRequest::new(url),
        }
    }

    pub fn with_params(mut self, params: RouteParams) -> Self {
        self.request.params = params;
        self
    }

    pub fn with_ext(mut self, ext: RouteParams) -> Self {
        self.request.ext = ext;
        self
    }
}

// ============================================================================
// Futures
// ============================================================================

/// Outcome of a router operation.
///
/// Resolves to [`NavigationError::RouterClosed`] if the router stopped
/// before answering. Dropping a completion does not cancel the operation.
#[must_use = "completions do nothing unless awaited; drop explicitly for fire-and-forget"]
pub struct Completion<T> {
    rx: oneshot::Receiver<NavigationResult<T>>,
}

impl<T> Completion<T> {
    fn new(rx: oneshot::Receiver<NavigationResult<T>>) -> Self {
        Self { rx }
    }

    /// Non-blocking check; `None` while the operation is still queued.
    pub fn try_take(&mut self) -> Option<NavigationResult<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(NavigationError::RouterClosed)),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = NavigationResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(NavigationError::RouterClosed)))
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Result of a destination pushed with [`Router::push_for_result`].
///
/// Resolves to `None` when the destination produced no result, when the push
/// failed, or when the router stopped first.
#[must_use = "result receivers do nothing unless awaited"]
pub struct ResultReceiver {
    rx: oneshot::Receiver<Option<RouteParams>>,
}

impl Future for ResultReceiver {
    type Output = Option<RouteParams>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|result| result.ok().flatten())
    }
}

impl fmt::Debug for ResultReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultReceiver").finish_non_exhaustive()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Handle to a running router.
///
/// All methods may be called from any thread. Operations are applied in the
/// order they were posted.
#[derive(Clone)]
pub struct Router {
    mailbox: Mailbox,
}

impl Router {
    fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            mailbox: Mailbox::new(tx),
        }
    }

    /// Push a destination.
    ///
    /// Completes with the resolved action once the push handler presented
    /// it, or with `DuplicateInstance`, `NoMatch` or `HandlerFailed`.
    pub fn push(&self, request: impl Into<PushRequest>) -> Completion<RouteAction> {
        let PushRequest { request, on_result } = request.into();
        self.call(|reply| Command::Push {
            request,
            on_result,
            reply: Some(reply),
        })
    }

    /// Push a destination and receive its result as a future.
    ///
    /// Any callback already set on `request` is replaced.
    pub fn push_for_result(
        &self,
        request: impl Into<PushRequest>,
    ) -> (Completion<RouteAction>, ResultReceiver) {
        let (tx, rx) = oneshot::channel();
        let request = request.into().on_result(move |result| {
            let _ = tx.send(result);
        });
        (self.push(request), ResultReceiver { rx })
    }

    /// Close a destination, or deliver a result to its pusher.
    pub fn close(&self, request: impl Into<CloseRequest>) -> Completion<()> {
        let CloseRequest {
            instance_key,
            result,
            send_result_only,
        } = request.into();
        self.call(|reply| Command::Close {
            instance_key,
            result,
            send_result_only,
            reply: Some(reply),
        })
    }

    /// Re-resolve an active destination in place.
    pub fn update(&self, request: UpdateRequest) -> Completion<RouteAction> {
        let UpdateRequest {
            instance_key,
            request,
        } = request;
        self.call(|reply| Command::Update {
            instance_key,
            request,
            reply: Some(reply),
        })
    }

    /// Register a listener. The router holds it weakly; keep your `Arc`.
    ///
    /// Registering the same listener twice has no further effect.
    pub fn add_listener(&self, listener: &Arc<dyn RouteListener>) -> bool {
        self.mailbox.post(Command::AddListener {
            id: ListenerId::of(listener),
            listener: Arc::downgrade(listener),
        })
    }

    /// Unregister a listener. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &Arc<dyn RouteListener>) -> bool {
        self.mailbox.post(Command::RemoveListener {
            id: ListenerId::of(listener),
        })
    }

    /// Replace the resolver.
    pub fn set_resolver(&self, resolver: impl RouteResolver) -> bool {
        self.mailbox
            .post(Command::SetResolver(Arc::new(resolver)))
    }

    /// Replace the push handler.
    pub fn set_push_handler(&self, handler: impl PushHandler) -> bool {
        self.mailbox
            .post(Command::SetPushHandler(Some(Arc::new(handler))))
    }

    /// Install, replace or remove the embedded engine.
    pub fn set_engine(&self, engine: Option<Arc<dyn EmbeddedEngine>>) -> bool {
        self.mailbox.post(Command::SetEngine(engine))
    }

    /// Request the router be started, forwarding `args` to the embedded
    /// engine.
    ///
    /// Completes once the engine signalled ready (or at once if already
    /// ready, or if no engine is installed), or with `StartupFailed`.
    pub fn start_route(&self, args: Option<Value>) -> Completion<()> {
        self.call(|reply| Command::Start {
            args,
            reply: Some(reply),
        })
    }

    /// Signal that the embedded engine finished initialising.
    pub fn engine_ready(&self) -> bool {
        self.mailbox.post(Command::EngineReady)
    }

    /// Signal that the embedded engine failed to initialise.
    pub fn engine_failed(&self, message: impl Into<String>) -> bool {
        self.mailbox.post(Command::EngineFailed {
            message: message.into(),
        })
    }

    /// The start arguments, once a start has been requested.
    pub fn wait_for_start_args(&self) -> Completion<Option<Value>> {
        self.call(|reply| Command::WaitForStartArgs { reply })
    }

    /// Active instance keys, bottom to top.
    pub fn stack(&self) -> Completion<Vec<String>> {
        self.inspect(RouterCore::stack_keys)
    }

    /// The top-most active action.
    pub fn top(&self) -> Completion<Option<RouteAction>> {
        self.inspect(RouterCore::top_action)
    }

    /// The action currently shown for `instance_key`.
    pub fn action(&self, instance_key: impl Into<String>) -> Completion<Option<RouteAction>> {
        let instance_key = instance_key.into();
        self.inspect(move |core| core.action_for(&instance_key))
    }

    /// Startup state.
    pub fn readiness(&self) -> Completion<Readiness> {
        self.inspect(RouterCore::readiness)
    }

    /// Number of result callbacks still waiting.
    pub fn pending_results(&self) -> Completion<usize> {
        self.inspect(RouterCore::pending_results)
    }

    /// Number of live registered listeners.
    pub fn listener_count(&self) -> Completion<usize> {
        self.inspect(RouterCore::listener_count)
    }

    /// Stop the router. Waiting result callbacks are answered with "no
    /// result"; later calls complete with `RouterClosed`.
    pub fn shutdown(&self) -> bool {
        self.mailbox.post(Command::Shutdown)
    }

    /// `true` once the router task has stopped.
    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<NavigationResult<T>>) -> Command,
    ) -> Completion<T> {
        let (reply, rx) = oneshot::channel();
        // A refused post drops `reply`, which completes with RouterClosed.
        self.mailbox.post(command(reply));
        Completion::new(rx)
    }

    fn inspect<T, F>(&self, f: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce(&RouterCore) -> T + Send + 'static,
    {
        self.call(|reply| {
            Command::Inspect(Box::new(move |core| {
                let _ = reply.send(Ok(f(core)));
            }))
        })
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// Builder & task
// ============================================================================

/// Configures and creates a router.
#[derive(Default)]
pub struct RouterBuilder {
    config: RouterConfig,
    resolver: Option<Arc<dyn RouteResolver>>,
    handler: Option<Arc<dyn PushHandler>>,
    engine: Option<Arc<dyn EmbeddedEngine>>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config`.
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Install a resolver (default: [`PassThroughResolver`](crate::PassThroughResolver)).
    pub fn resolver(mut self, resolver: impl RouteResolver) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Install the push handler.
    pub fn push_handler(mut self, handler: impl PushHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Install the embedded engine.
    pub fn engine(mut self, engine: Arc<dyn EmbeddedEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Create the handle and the task; the host decides where the task runs.
    pub fn build(self) -> (Router, RouterTask) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut core = RouterCore::new(self.config, tx.downgrade());
        if let Some(resolver) = self.resolver {
            core.apply(Command::SetResolver(resolver));
        }
        core.apply(Command::SetPushHandler(self.handler));
        core.apply(Command::SetEngine(self.engine));
        (Router::new(tx), RouterTask { core, rx })
    }

    /// Build and run the task on the current tokio runtime.
    pub fn spawn(self) -> (Router, JoinHandle<()>) {
        let (router, task) = self.build();
        (router, tokio::spawn(task.run()))
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("config", &self.config)
            .field("resolver", &self.resolver.as_ref().map(|r| r.name()))
            .field("handler", &self.handler.as_ref().map(|h| h.name()))
            .field("engine", &self.engine.is_some())
            .finish()
    }
}

/// The router's single execution context.
///
/// Owns all router state. Run it with [`run`](Self::run) on an executor, or
/// drive it from a host event loop with [`run_until_idle`](Self::run_until_idle).
pub struct RouterTask {
    core: RouterCore,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl RouterTask {
    /// Apply commands until shutdown or until every handle is gone.
    pub async fn run(mut self) {
        debug_log!("Router task running");
        while let Some(command) = self.rx.recv().await {
            if !self.core.apply(command) {
                break;
            }
        }
        self.stop();
    }

    /// Apply every queued command without waiting.
    ///
    /// Returns `false` once the router has stopped.
    pub fn run_until_idle(&mut self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(command) => {
                    if !self.core.apply(command) {
                        self.stop();
                        return false;
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.stop();
                    return false;
                }
            }
        }
    }

    fn stop(&mut self) {
        self.rx.close();
        let mut discarded = 0usize;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            info_log!("Discarded {} commands queued after shutdown", discarded);
        }
        self.core.finish();
    }
}

impl fmt::Debug for RouterTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterTask").finish_non_exhaustive()
    }
}
