//! # hybrid-navigator
//!
//! One navigation stack shared by two UI runtimes: the host's native UI and
//! an embedded UI engine whose screens interleave with native ones.
//!
//! Callers push destinations by url, the router resolves where they really
//! go (possibly redirecting), keeps them on a logical stack keyed by a unique
//! instance key, asks a pluggable handler to present them in the right
//! runtime, and hands the destination's result back to the caller exactly
//! once when it closes.
//!
//! ## Pieces
//!
//! | Concern | Type |
//! |---------|------|
//! | Entry point | [`Router`] (cloneable handle), [`RouterBuilder`], [`RouterTask`] |
//! | Where a url goes | [`RouteResolver`], [`resolver_fn`], [`RouteTable`] |
//! | Presenting it | [`PushHandler`], [`push_handler_fn`], [`HybridPushHandler`] |
//! | The embedded engine | [`EmbeddedEngine`], [`ChannelEngine`], [`EngineBridge`] |
//! | Observing | [`RouteListener`] |
//! | Results | [`PushRequest::on_result`], [`Router::push_for_result`], [`ResultSink`] |
//!
//! ## Execution model
//!
//! All router state lives in the [`RouterTask`]. Every [`Router`] method
//! posts a command to it and returns a [`Completion`], so the router can be
//! driven from any thread while resolution, handler calls, listener
//! notifications and result callbacks all run on the task, one command at a
//! time.
//!
//! ## Quick start
//!
//! ```no_run
//! use hybrid_navigator::{
//!     push_handler_fn, HybridPushHandler, PushDisposition, PushRequest, RouteTable,
//!     RouterBuilder,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let routes = RouteTable::new()
//!         .native("/settings")
//!         .embedded("/shop/item/:id");
//!
//!     let native = push_handler_fn(|action, _ctx| {
//!         println!("native screen: {}", action.url());
//!         PushDisposition::Presented
//!     });
//!
//!     let (router, _task) = RouterBuilder::new()
//!         .resolver(routes)
//!         .push_handler(HybridPushHandler::new(native))
//!         .spawn();
//!
//!     router.start_route(None).await?;
//!     router.push(PushRequest::new("/settings")).await?;
//!     router.close("/settings").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `log` | yes | Log through the `log` crate |
//! | `tracing` | no | Log through the `tracing` crate (instead of `log`) |
//! | `table` | yes | [`RouteTable`] pattern resolver |
//! | `cache` | yes | LRU cache for [`RouteTable`] lookups |

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod logging;

pub mod action;
pub mod bridge;
pub mod config;
pub mod error;
pub mod handler;
pub mod listener;
pub mod params;
pub mod resolver;
pub mod router;
pub mod startup;

mod core;
mod stack;

#[cfg(feature = "cache")]
#[cfg_attr(docsrs, doc(cfg(feature = "cache")))]
pub mod cache;
#[cfg(feature = "table")]
#[cfg_attr(docsrs, doc(cfg(feature = "table")))]
pub mod table;

pub use action::{Renderer, RouteAction, RouteRequest};
pub use bridge::{BridgeError, ChannelEngine, EngineBridge, MethodCall, Transport, CHANNEL_NAME};
pub use config::{OrphanResultPolicy, RouterConfig};
pub use error::{NavigationError, NavigationResult};
pub use handler::{
    push_handler_fn, EmbeddedEngine, FnPushHandler, HybridPushHandler, PushContext,
    PushDisposition, PushHandler, ResultSink,
};
pub use listener::RouteListener;
pub use params::{QueryParams, RouteParams};
pub use resolver::{resolver_fn, FnResolver, PassThroughResolver, RouteResolver};
pub use router::{
    CloseRequest, Completion, PushRequest, ResultReceiver, Router, RouterBuilder, RouterTask,
    UpdateRequest,
};
pub use stack::ResultCallback;
pub use startup::Readiness;

#[cfg(feature = "cache")]
pub use cache::{CacheStats, ResolutionCache};
#[cfg(feature = "table")]
pub use table::{RouteEntry, RouteTable};
