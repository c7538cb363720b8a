//! The router state machine.
//!
//! [`RouterCore`] owns everything that must only be touched from the single
//! logical execution context: the active stack, the pending result callbacks,
//! the listener registry, the readiness state and the installed strategies.
//! It is never shared. The [`RouterTask`](crate::RouterTask) owns it and
//! feeds it one [`Command`] at a time, so no two operations interleave.
//!
//! # Push pipeline
//!
//! ```text
//! push(request)
//!   ├─► effective key active?          → DuplicateInstance
//!   ├─► resolver.resolve(request)      → None: NoMatch
//!   ├─► resolved key active?           → DuplicateInstance
//!   ├─► insert stack entry, register result callback
//!   ├─► listeners.on_route_resolved
//!   ├─► handler.push(action, ctx)
//!   │     ├─► Rejected               → remove entry + callback, HandlerFailed
//!   │     ├─► PresentedWithoutResult → callback(None)
//!   │     └─► Presented
//!   └─► listeners.on_route_handled     → Ok(action)
//! ```
//!
//! # Close pipeline
//!
//! ```text
//! close(key, result, send_result_only)
//!   ├─► result only: deliver to pending callback (orphan policy applies)
//!   └─► otherwise: remove entry (UnknownInstance if absent)
//!                  handler.dismiss → deliver result → listeners.on_route_closed
//! ```

use crate::action::{effective_key, RouteAction, RouteRequest};
use crate::config::{OrphanResultPolicy, RouterConfig};
use crate::error::{panic_message, NavigationError, NavigationResult};
use crate::handler::{EmbeddedEngine, PushContext, PushDisposition, PushHandler, ResultSink};
use crate::listener::{ListenerId, ListenerRegistry, RouteListener};
use crate::params::RouteParams;
use crate::resolver::{PassThroughResolver, RouteResolver};
use crate::stack::{ActiveStack, PendingResults, ResultCallback, StackEntry};
use crate::startup::{ArgsResponder, Readiness, StartResponder, StartStep, StartupState};
use crate::{debug_log, error_log, info_log, warn_log};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};

/// Reply channel for a single request.
pub(crate) type Reply<T> = oneshot::Sender<NavigationResult<T>>;

/// Read-only visitor run against the core on the command loop.
pub(crate) type Inspector = Box<dyn FnOnce(&RouterCore) + Send + 'static>;

/// Everything that can be asked of the router.
pub(crate) enum Command {
    Push {
        request: RouteRequest,
        on_result: Option<ResultCallback>,
        reply: Option<Reply<RouteAction>>,
    },
    Close {
        instance_key: String,
        result: Option<RouteParams>,
        send_result_only: bool,
        reply: Option<Reply<()>>,
    },
    Update {
        instance_key: String,
        request: RouteRequest,
        reply: Option<Reply<RouteAction>>,
    },
    DeliverResult {
        instance_key: String,
        generation: u64,
        result: Option<RouteParams>,
    },
    AddListener {
        id: ListenerId,
        listener: Weak<dyn RouteListener>,
    },
    RemoveListener {
        id: ListenerId,
    },
    SetResolver(Arc<dyn RouteResolver>),
    SetPushHandler(Option<Arc<dyn PushHandler>>),
    SetEngine(Option<Arc<dyn EmbeddedEngine>>),
    Start {
        args: Option<Value>,
        reply: Option<StartResponder>,
    },
    EngineReady,
    EngineFailed {
        message: String,
    },
    WaitForStartArgs {
        reply: ArgsResponder,
    },
    Inspect(Inspector),
    Shutdown,
}

/// Sending half of the command queue.
#[derive(Clone)]
pub(crate) struct Mailbox {
    tx: mpsc::UnboundedSender<Command>,
}

impl Mailbox {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    /// Enqueue a command. Returns `false` if the loop has stopped.
    pub(crate) fn post(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single-context router state.
pub(crate) struct RouterCore {
    config: RouterConfig,
    stack: ActiveStack,
    pending: PendingResults,
    listeners: ListenerRegistry,
    startup: StartupState,
    resolver: Arc<dyn RouteResolver>,
    handler: Option<Arc<dyn PushHandler>>,
    engine: Option<Arc<dyn EmbeddedEngine>>,
    /// Weak so that the core alone does not keep its own queue open.
    mailbox: mpsc::WeakUnboundedSender<Command>,
}

impl RouterCore {
    pub(crate) fn new(config: RouterConfig, mailbox: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self {
            config,
            stack: ActiveStack::new(),
            pending: PendingResults::new(),
            listeners: ListenerRegistry::new(),
            startup: StartupState::new(),
            resolver: Arc::new(PassThroughResolver),
            handler: None,
            engine: None,
            mailbox,
        }
    }

    /// Apply one command. Returns `false` when the loop should stop.
    pub(crate) fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Push {
                request,
                on_result,
                reply,
            } => {
                let outcome = self.push(request, on_result);
                respond(reply, outcome);
            }
            Command::Close {
                instance_key,
                result,
                send_result_only,
                reply,
            } => {
                let outcome = self.close(&instance_key, result, send_result_only);
                respond(reply, outcome);
            }
            Command::Update {
                instance_key,
                request,
                reply,
            } => {
                let outcome = self.update(&instance_key, request);
                respond(reply, outcome);
            }
            Command::DeliverResult {
                instance_key,
                generation,
                result,
            } => {
                if !self.settle(&instance_key, Some(generation), result) {
                    debug_log!(
                        "[{}] Result for '{}' dropped: nothing pending",
                        self.config.name,
                        instance_key
                    );
                }
            }
            Command::AddListener { id, listener } => {
                self.listeners.add(id, listener);
            }
            Command::RemoveListener { id } => {
                self.listeners.remove(id);
            }
            Command::SetResolver(resolver) => {
                debug_log!("[{}] Resolver set to {}", self.config.name, resolver.name());
                self.resolver = resolver;
            }
            Command::SetPushHandler(handler) => {
                debug_log!(
                    "[{}] Push handler set to {}",
                    self.config.name,
                    handler.as_ref().map_or("<none>", |h| h.name())
                );
                self.handler = handler;
            }
            Command::SetEngine(engine) => {
                debug_log!(
                    "[{}] Embedded engine {}",
                    self.config.name,
                    if engine.is_some() { "installed" } else { "removed" }
                );
                self.engine = engine;
            }
            Command::Start { args, reply } => self.start(args, reply),
            Command::EngineReady => {
                self.startup.mark_ready();
            }
            Command::EngineFailed { message } => {
                self.startup.mark_failed(message);
            }
            Command::WaitForStartArgs { reply } => self.startup.wait_for_args(reply),
            Command::Inspect(inspect) => inspect(self),
            Command::Shutdown => return false,
        }
        true
    }

    /// Settle every waiting callback before the loop exits.
    pub(crate) fn finish(&mut self) {
        let drained = self.pending.drain_without_result();
        info_log!(
            "[{}] Router stopped ({} entries on stack, {} pending results answered)",
            self.config.name,
            self.stack.len(),
            drained
        );
    }

    // ========================================================================
    // Push
    // ========================================================================

    fn push(
        &mut self,
        request: RouteRequest,
        on_result: Option<ResultCallback>,
    ) -> NavigationResult<RouteAction> {
        let requested_key = request.effective_key().to_string();
        if self.stack.contains(&requested_key) {
            warn_log!(
                "[{}] Push rejected: '{}' is already active",
                self.config.name,
                requested_key
            );
            return Err(NavigationError::DuplicateInstance {
                instance_key: requested_key,
            });
        }

        let action = self.resolve(&request)?.inherit_ext(&request.ext);
        let key = effective_key(action.instance_key(), &requested_key).to_string();
        if key != requested_key && self.stack.contains(&key) {
            warn_log!(
                "[{}] Push rejected: resolved key '{}' is already active",
                self.config.name,
                key
            );
            return Err(NavigationError::DuplicateInstance { instance_key: key });
        }

        self.stack.insert(key.clone(), action.clone());
        let generation = match on_result {
            Some(callback) => {
                if self.pending.contains(&key) {
                    // Left behind by a previous occupant of this key.
                    self.settle(&key, None, None);
                }
                self.pending.register(key.clone(), callback)
            }
            None => None,
        };

        self.listeners.notify_resolved(&request, &action);

        match self.present(&key, &action, generation) {
            PushDisposition::Rejected { reason } => {
                self.stack.remove(&key);
                self.pending.discard(&key);
                warn_log!(
                    "[{}] Push of '{}' ({}) failed: {}",
                    self.config.name,
                    key,
                    action.url(),
                    reason
                );
                Err(NavigationError::HandlerFailed {
                    instance_key: key,
                    reason,
                })
            }
            disposition => {
                if disposition == PushDisposition::PresentedWithoutResult
                    && self.config.immediate_no_result
                {
                    self.settle(&key, generation, None);
                }
                info_log!(
                    "[{}] Pushed '{}' -> {} ({:?}, depth {})",
                    self.config.name,
                    key,
                    action.url(),
                    action.renderer(),
                    self.stack.len()
                );
                self.listeners.notify_handled(&action);
                Ok(action)
            }
        }
    }

    fn resolve(&self, request: &RouteRequest) -> NavigationResult<RouteAction> {
        let resolver = &self.resolver;
        let resolved = match catch_unwind(AssertUnwindSafe(|| resolver.resolve(request))) {
            Ok(resolved) => resolved,
            Err(panic) => {
                error_log!(
                    "[{}] Resolver {} panicked on '{}': {}",
                    self.config.name,
                    resolver.name(),
                    request.url,
                    panic_message(panic.as_ref())
                );
                None
            }
        };
        match resolved {
            Some(action) if !action.url().is_empty() => {
                debug_log!(
                    "[{}] Resolved '{}' -> '{}'",
                    self.config.name,
                    request.url,
                    action.url()
                );
                Ok(action)
            }
            _ => {
                warn_log!("[{}] No route for '{}'", self.config.name, request.url);
                Err(NavigationError::NoMatch {
                    url: request.url.clone(),
                })
            }
        }
    }

    fn present(
        &self,
        key: &str,
        action: &RouteAction,
        generation: Option<u64>,
    ) -> PushDisposition {
        let Some(handler) = self.handler.as_ref() else {
            return PushDisposition::rejected("no push handler installed");
        };
        let sink = generation.and_then(|generation| {
            self.mailbox
                .upgrade()
                .map(|tx| ResultSink::new(key.to_string(), generation, Mailbox::new(tx)))
        });
        let mut ctx = PushContext::new(key, self.engine.as_ref(), sink);
        match catch_unwind(AssertUnwindSafe(|| handler.push(action, &mut ctx))) {
            Ok(disposition) => disposition,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error_log!(
                    "[{}] Push handler {} panicked on '{}': {}",
                    self.config.name,
                    handler.name(),
                    key,
                    message
                );
                PushDisposition::rejected(format!("handler panicked: {}", message))
            }
        }
    }

    // ========================================================================
    // Close
    // ========================================================================

    fn close(
        &mut self,
        instance_key: &str,
        result: Option<RouteParams>,
        send_result_only: bool,
    ) -> NavigationResult<()> {
        if send_result_only {
            if !self.stack.contains(instance_key)
                && self.config.orphan_results == OrphanResultPolicy::Reject
            {
                warn_log!(
                    "[{}] Result-only close for inactive '{}' rejected",
                    self.config.name,
                    instance_key
                );
                return Err(NavigationError::UnknownInstance {
                    instance_key: instance_key.to_string(),
                });
            }
            if !self.settle(instance_key, None, result) {
                debug_log!(
                    "[{}] Result for '{}' discarded: nothing pending",
                    self.config.name,
                    instance_key
                );
            }
            return Ok(());
        }

        let Some(entry) = self.stack.remove(instance_key) else {
            warn_log!(
                "[{}] Close rejected: '{}' is not on the stack",
                self.config.name,
                instance_key
            );
            return Err(NavigationError::UnknownInstance {
                instance_key: instance_key.to_string(),
            });
        };

        let dismissed = self.dismiss(&entry);
        self.settle(instance_key, None, result);
        self.listeners
            .notify_closed(&entry.instance_key, &entry.action);
        info_log!(
            "[{}] Closed '{}' (depth {})",
            self.config.name,
            instance_key,
            self.stack.len()
        );

        if dismissed {
            Ok(())
        } else {
            Err(NavigationError::handler_failed(
                instance_key,
                "dismissal failed",
            ))
        }
    }

    fn dismiss(&self, entry: &StackEntry) -> bool {
        let Some(handler) = self.handler.as_ref() else {
            warn_log!(
                "[{}] No push handler to dismiss '{}'",
                self.config.name,
                entry.instance_key
            );
            return true;
        };
        let mut ctx = PushContext::new(&entry.instance_key, self.engine.as_ref(), None);
        match catch_unwind(AssertUnwindSafe(|| handler.dismiss(&entry.action, &mut ctx))) {
            Ok(dismissed) => dismissed,
            Err(panic) => {
                error_log!(
                    "[{}] Push handler {} panicked dismissing '{}': {}",
                    self.config.name,
                    handler.name(),
                    entry.instance_key,
                    panic_message(panic.as_ref())
                );
                false
            }
        }
    }

    // ========================================================================
    // Update
    // ========================================================================

    fn update(
        &mut self,
        instance_key: &str,
        request: RouteRequest,
    ) -> NavigationResult<RouteAction> {
        if !self.stack.contains(instance_key) {
            return Err(NavigationError::UnknownInstance {
                instance_key: instance_key.to_string(),
            });
        }
        let request = request.with_instance_key(instance_key);
        let action = self.resolve(&request)?.inherit_ext(&request.ext);

        let Some(handler) = self.handler.as_ref() else {
            return Err(NavigationError::handler_failed(
                instance_key,
                "no push handler installed",
            ));
        };
        let mut ctx = PushContext::new(instance_key, self.engine.as_ref(), None);
        let updated = match catch_unwind(AssertUnwindSafe(|| handler.update(&action, &mut ctx))) {
            Ok(updated) => updated,
            Err(panic) => {
                error_log!(
                    "[{}] Push handler {} panicked updating '{}': {}",
                    self.config.name,
                    handler.name(),
                    instance_key,
                    panic_message(panic.as_ref())
                );
                false
            }
        };
        if !updated {
            warn_log!(
                "[{}] Update of '{}' to {} not applied",
                self.config.name,
                instance_key,
                action.url()
            );
            return Err(NavigationError::handler_failed(
                instance_key,
                "update not applied",
            ));
        }

        self.stack.replace_action(instance_key, action.clone());
        info_log!(
            "[{}] Updated '{}' -> {}",
            self.config.name,
            instance_key,
            action.url()
        );
        self.listeners.notify_resolved(&request, &action);
        self.listeners.notify_handled(&action);
        Ok(action)
    }

    // ========================================================================
    // Results & startup
    // ========================================================================

    /// Hand `result` to the callback pending for `instance_key`, if any.
    ///
    /// With a `generation`, only the registration it names is answered.
    fn settle(
        &mut self,
        instance_key: &str,
        generation: Option<u64>,
        result: Option<RouteParams>,
    ) -> bool {
        let pending = &mut self.pending;
        let complete = || match generation {
            Some(generation) => pending.complete_generation(instance_key, generation, result),
            None => pending.complete(instance_key, result),
        };
        match catch_unwind(AssertUnwindSafe(complete)) {
            Ok(delivered) => delivered,
            Err(panic) => {
                error_log!(
                    "[{}] Result callback for '{}' panicked: {}",
                    self.config.name,
                    instance_key,
                    panic_message(panic.as_ref())
                );
                true
            }
        }
    }

    fn start(&mut self, args: Option<Value>, reply: Option<StartResponder>) {
        let StartStep::Begin(args) = self.startup.request(args, reply) else {
            return;
        };
        let Some(engine) = self.engine.clone() else {
            info_log!(
                "[{}] No embedded engine installed; ready immediately",
                self.config.name
            );
            self.startup.mark_ready();
            return;
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| engine.start(args.as_ref()))) {
            self.startup.mark_failed(panic_message(panic.as_ref()));
        }
    }

    // ========================================================================
    // Accessors (used by inspectors)
    // ========================================================================

    pub(crate) fn stack_keys(&self) -> Vec<String> {
        self.stack.keys()
    }

    pub(crate) fn top_action(&self) -> Option<RouteAction> {
        self.stack.top().map(|entry| entry.action.clone())
    }

    pub(crate) fn action_for(&self, instance_key: &str) -> Option<RouteAction> {
        self.stack
            .get(instance_key)
            .map(|entry| entry.action.clone())
    }

    pub(crate) fn readiness(&self) -> Readiness {
        self.startup.readiness()
    }

    pub(crate) fn start_args(&self) -> Option<Value> {
        self.startup.start_args().cloned()
    }

    pub(crate) fn pending_results(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

fn respond<T>(reply: Option<Reply<T>>, outcome: NavigationResult<T>) {
    if let Some(reply) = reply {
        let _ = reply.send(outcome);
    }
}
