//! Adapter between the router and the embedded engine's method channel.
//!
//! The two runtimes talk over a bidirectional method-invocation channel named
//! [`CHANNEL_NAME`]. How a [`MethodCall`] is encoded on the wire belongs to the
//! [`Transport`]; this module only decides what the calls mean.
//!
//! # Inbound (engine → router)
//!
//! | Method | Arguments | Answer |
//! |--------|-----------|--------|
//! | `push` | `{url, instanceKey?, params?, ext?, requestId?}` | resolved action |
//! | `openContainer` | `{url, params?: {instanceKey?, ..}, ext?, requestId?}` | resolved action |
//! | `close` | `{instanceKey, result?, sendResultOnly?}` | `null` |
//! | `ready` | — | `null` |
//! | `startFailed` | `{message?}` | `null` |
//! | `waitForReady` | — | start arguments, once a start was requested |
//!
//! A push carrying a `requestId` wants the destination's result; it is sent
//! back as an `onResult` call.
//!
//! # Outbound (router → engine)
//!
//! | Method | Arguments |
//! |--------|-----------|
//! | `startRoute` | start arguments |
//! | `createView` / `updateRoute` | `{url, instanceKey, params, ext}` |
//! | `closeView` | `{instanceKey}` |
//! | `onResult` | `{requestId, result}` |

use crate::action::RouteAction;
use crate::error::NavigationError;
use crate::handler::EmbeddedEngine;
use crate::params::RouteParams;
use crate::router::{CloseRequest, PushRequest, Router};
use crate::{debug_log, trace_log, warn_log};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Name of the method channel shared by both runtimes.
pub const CHANNEL_NAME: &str = "unirouter_manager";

/// Query key carrying the instance key inside `openContainer` params.
const CONTAINER_KEY_PARAM: &str = "instanceKey";

/// One method invocation crossing the runtime boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    fn decode<T: DeserializeOwned>(&self) -> Result<T, BridgeError> {
        let arguments = match &self.arguments {
            Value::Null => json!({}),
            other => other.clone(),
        };
        serde_json::from_value(arguments).map_err(|err| BridgeError::InvalidArguments {
            method: self.method.clone(),
            message: err.to_string(),
        })
    }
}

/// Outbound half of the method channel.
pub trait Transport: Send + Sync + 'static {
    /// Send `call` to the embedded engine. Returns `false` if the channel is
    /// gone.
    fn send(&self, call: MethodCall) -> bool;
}

impl Transport for mpsc::UnboundedSender<MethodCall> {
    fn send(&self, call: MethodCall) -> bool {
        mpsc::UnboundedSender::send(self, call).is_ok()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure answered to an inbound method call.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// The method is not part of the protocol.
    NotImplemented { method: String },
    /// The arguments could not be decoded.
    InvalidArguments { method: String, message: String },
    /// The router refused the request.
    Navigation(NavigationError),
}

impl BridgeError {
    /// Stable error code for the transport's error reply.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::NotImplemented { .. } => "notImplemented",
            BridgeError::InvalidArguments { .. } => "invalidArguments",
            BridgeError::Navigation(err) => match err {
                NavigationError::DuplicateInstance { .. } => "duplicateInstance",
                NavigationError::NoMatch { .. } => "noMatch",
                NavigationError::HandlerFailed { .. } => "handlerFailed",
                NavigationError::UnknownInstance { .. } => "unknownInstance",
                NavigationError::StartupFailed { .. } => "startupFailed",
                NavigationError::RouterClosed => "routerClosed",
            },
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::NotImplemented { method } => {
                write!(f, "Method '{}' is not implemented", method)
            }
            BridgeError::InvalidArguments { method, message } => {
                write!(f, "Invalid arguments for '{}': {}", method, message)
            }
            BridgeError::Navigation(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Navigation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NavigationError> for BridgeError {
    fn from(err: NavigationError) -> Self {
        BridgeError::Navigation(err)
    }
}

// ============================================================================
// Outbound: ChannelEngine
// ============================================================================

/// [`EmbeddedEngine`] that drives the engine over a [`Transport`].
pub struct ChannelEngine {
    transport: Arc<dyn Transport>,
}

impl ChannelEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn route_call(method: &str, instance_key: &str, action: &RouteAction) -> MethodCall {
        MethodCall::new(
            method,
            json!({
                "url": action.url(),
                "instanceKey": instance_key,
                "params": action.params(),
                "ext": action.ext(),
            }),
        )
    }
}

impl EmbeddedEngine for ChannelEngine {
    fn start(&self, args: Option<&Value>) {
        let call = MethodCall::new("startRoute", args.cloned().unwrap_or_default());
        if !self.transport.send(call) {
            warn_log!("Transport closed; startRoute not sent");
        }
    }

    fn create_view(&self, instance_key: &str, action: &RouteAction) -> bool {
        self.transport
            .send(Self::route_call("createView", instance_key, action))
    }

    fn update_route(&self, instance_key: &str, action: &RouteAction) -> bool {
        self.transport
            .send(Self::route_call("updateRoute", instance_key, action))
    }

    fn close_view(&self, instance_key: &str) -> bool {
        self.transport.send(MethodCall::new(
            "closeView",
            json!({ "instanceKey": instance_key }),
        ))
    }
}

impl fmt::Debug for ChannelEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelEngine").finish_non_exhaustive()
    }
}

// ============================================================================
// Inbound: EngineBridge
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushArgs {
    url: String,
    #[serde(default)]
    instance_key: Option<String>,
    #[serde(default)]
    params: Option<RouteParams>,
    #[serde(default)]
    ext: Option<RouteParams>,
    #[serde(default)]
    request_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloseArgs {
    instance_key: String,
    #[serde(default)]
    result: Option<RouteParams>,
    #[serde(default)]
    send_result_only: bool,
}

#[derive(Debug, Default, Deserialize)]
struct FailureArgs {
    #[serde(default)]
    message: Option<String>,
}

/// Applies inbound method calls to a [`Router`].
pub struct EngineBridge {
    router: Router,
    transport: Arc<dyn Transport>,
}

impl EngineBridge {
    pub fn new(router: Router, transport: Arc<dyn Transport>) -> Self {
        Self { router, transport }
    }

    /// A [`ChannelEngine`] sharing this bridge's transport.
    pub fn engine(&self) -> ChannelEngine {
        ChannelEngine::new(self.transport.clone())
    }

    /// Handle one inbound call and produce its answer.
    pub async fn handle(&self, call: MethodCall) -> Result<Value, BridgeError> {
        debug_log!("Bridge call '{}'", call.method);
        match call.method.as_str() {
            "push" => {
                let args: PushArgs = call.decode()?;
                self.push(args).await
            }
            "openContainer" => {
                let mut args: PushArgs = call.decode()?;
                let mut params = args.params.take().unwrap_or_default();
                if let Some(key) = params.remove(CONTAINER_KEY_PARAM) {
                    args.instance_key = key.as_str().map(str::to_string);
                }
                args.params = Some(params);
                self.push(args).await
            }
            "close" => {
                let args: CloseArgs = call.decode()?;
                let request = CloseRequest {
                    instance_key: args.instance_key,
                    result: args.result,
                    send_result_only: args.send_result_only,
                };
                self.router.close(request).await?;
                Ok(Value::Null)
            }
            "ready" => {
                self.router.engine_ready();
                Ok(Value::Null)
            }
            "startFailed" => {
                let args: FailureArgs = call.decode()?;
                self.router.engine_failed(
                    args.message
                        .unwrap_or_else(|| "embedded engine failed to start".to_string()),
                );
                Ok(Value::Null)
            }
            "waitForReady" => {
                let args = self.router.wait_for_start_args().await?;
                Ok(args.unwrap_or_default())
            }
            _ => {
                warn_log!("Bridge method '{}' is not implemented", call.method);
                Err(BridgeError::NotImplemented {
                    method: call.method,
                })
            }
        }
    }

    async fn push(&self, args: PushArgs) -> Result<Value, BridgeError> {
        let mut request = PushRequest::new(args.url)
            .with_instance_key(args.instance_key.unwrap_or_default())
            .with_params(args.params.unwrap_or_default())
            .with_ext(args.ext.unwrap_or_default());

        if let Some(request_id) = args.request_id {
            let transport = self.transport.clone();
            request = request.on_result(move |result| {
                trace_log!("Returning result for request {} to engine", request_id);
                transport.send(MethodCall::new(
                    "onResult",
                    json!({
                        "requestId": request_id,
                        "result": result,
                    }),
                ));
            });
        }

        let action = self.router.push(request).await?;
        Ok(serde_json::to_value(&action).unwrap_or_default())
    }
}

impl fmt::Debug for EngineBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBridge")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}
