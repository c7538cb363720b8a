//! Route resolution strategies.
//!
//! A resolver decides where a push request really goes. It may return the
//! request unchanged, redirect it to another url, key or parameter set, or
//! decline it, which aborts the push before anything else happens.
//!
//! Resolvers run on the router's command loop and must not block. They are
//! expected to be deterministic for a fixed host configuration but are free
//! to consult external state.
//!
//! # Built-in resolvers
//!
//! | Resolver | Behaviour |
//! |----------|-----------|
//! | [`PassThroughResolver`] | Accepts every request unchanged (installed by default) |
//! | [`resolver_fn`] | Wraps a closure |
//! | [`RouteTable`](crate::RouteTable) | Pattern table with redirects (feature `table`) |
//!
//! # Example
//!
//! ```
//! use hybrid_navigator::{resolver_fn, RouteAction, RouteResolver, RouteRequest};
//!
//! let resolver = resolver_fn(|request: &RouteRequest| {
//!     (request.url == "/detail").then(|| {
//!         RouteAction::new("/detail/v2")
//!             .with_instance_key(request.instance_key.clone())
//!             .with_params(request.params.clone())
//!     })
//! });
//!
//! let action = resolver.resolve(&RouteRequest::new("/detail")).unwrap();
//! assert_eq!(action.url(), "/detail/v2");
//! assert!(resolver.resolve(&RouteRequest::new("/other")).is_none());
//! ```

use crate::action::{RouteAction, RouteRequest};

/// Turns a [`RouteRequest`] into the [`RouteAction`] that should be shown.
pub trait RouteResolver: Send + Sync + 'static {
    /// Resolve `request`, or return `None` to decline it.
    fn resolve(&self, request: &RouteRequest) -> Option<RouteAction>;

    /// Resolver name for logging.
    fn name(&self) -> &'static str {
        "RouteResolver"
    }
}

/// Create a resolver from a function or closure.
pub const fn resolver_fn<F>(f: F) -> FnResolver<F>
where
    F: Fn(&RouteRequest) -> Option<RouteAction> + Send + Sync + 'static,
{
    FnResolver { f }
}

/// Resolver created from a function or closure.
pub struct FnResolver<F> {
    f: F,
}

impl<F> RouteResolver for FnResolver<F>
where
    F: Fn(&RouteRequest) -> Option<RouteAction> + Send + Sync + 'static,
{
    fn resolve(&self, request: &RouteRequest) -> Option<RouteAction> {
        (self.f)(request)
    }

    fn name(&self) -> &'static str {
        "FnResolver"
    }
}

/// Accepts every request and targets exactly what was asked for.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughResolver;

impl RouteResolver for PassThroughResolver {
    fn resolve(&self, request: &RouteRequest) -> Option<RouteAction> {
        if request.url.is_empty() {
            return None;
        }
        Some(RouteAction::from_request(request))
    }

    fn name(&self) -> &'static str {
        "PassThroughResolver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RouteParams;

    #[test]
    fn test_pass_through_keeps_request() {
        let request = RouteRequest::new("/a")
            .with_instance_key("k")
            .with_params(RouteParams::new().with("x", 1));
        let action = PassThroughResolver.resolve(&request).unwrap();

        assert_eq!(action.url(), "/a");
        assert_eq!(action.instance_key(), "k");
        assert_eq!(action.params(), &request.params);
    }

    #[test]
    fn test_pass_through_declines_empty_url() {
        assert!(PassThroughResolver.resolve(&RouteRequest::new("")).is_none());
    }

    #[test]
    fn test_resolver_fn_redirects() {
        let resolver = resolver_fn(|request: &RouteRequest| {
            Some(
                RouteAction::new(format!("{}/v2", request.url))
                    .with_instance_key(request.instance_key.clone())
                    .with_params(request.params.clone()),
            )
        });

        let action = resolver
            .resolve(&RouteRequest::new("/detail").with_instance_key("d1"))
            .unwrap();
        assert_eq!(action.url(), "/detail/v2");
        assert_eq!(action.instance_key(), "d1");
        assert_eq!(resolver.name(), "FnResolver");
    }
}
