//! Navigation requests and resolved route actions.
//!
//! A [`RouteRequest`] is what a caller asked for. A [`RouteAction`] is what a
//! [`RouteResolver`](crate::RouteResolver) decided should actually be shown,
//! which may be a different url, key or parameter set (a redirect). Actions
//! are built once by the resolver and then shared read-only with listeners and
//! the push handler.
//!
//! # Example
//!
//! ```
//! use hybrid_navigator::{Renderer, RouteAction, RouteParams, RouteRequest};
//!
//! let request = RouteRequest::new("/detail").with_instance_key("d1");
//! assert_eq!(request.effective_key(), "d1");
//!
//! let action = RouteAction::new("/detail/v2")
//!     .with_instance_key("d1")
//!     .with_params(RouteParams::new().with("id", 7))
//!     .with_renderer(Renderer::Embedded);
//! assert_eq!(action.url(), "/detail/v2");
//! assert!(action.renderer().is_embedded());
//! ```

use crate::params::{QueryParams, RouteParams};
use serde::{Deserialize, Serialize};

/// Query parameter carrying the instance key in URL-encoded actions.
const INSTANCE_KEY_QUERY: &str = "instanceKey";
/// Prefix marking extension options in URL-encoded actions.
const EXT_QUERY_PREFIX: &str = "_ext_";

/// Which runtime renders a destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Renderer {
    /// Rendered by the host's native UI runtime.
    #[default]
    Native,
    /// Rendered inside the embedded UI engine.
    Embedded,
}

impl Renderer {
    /// `true` for [`Renderer::Embedded`].
    pub fn is_embedded(self) -> bool {
        matches!(self, Renderer::Embedded)
    }
}

/// A navigation request as issued by the caller, before resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteRequest {
    /// Requested destination url.
    pub url: String,
    /// Requested instance key; empty means "use the url".
    pub instance_key: String,
    /// Navigation parameters.
    pub params: RouteParams,
    /// Extension options (animation and other non-functional hints).
    pub ext: RouteParams,
}

impl RouteRequest {
    /// Create a request for `url` with no key and no parameters.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the instance key.
    pub fn with_instance_key(mut self, instance_key: impl Into<String>) -> Self {
        self.instance_key = instance_key.into();
        self
    }

    /// Set navigation parameters.
    pub fn with_params(mut self, params: RouteParams) -> Self {
        self.params = params;
        self
    }

    /// Set extension options.
    pub fn with_ext(mut self, ext: RouteParams) -> Self {
        self.ext = ext;
        self
    }

    /// The key used for stack uniqueness: the instance key, or the url when
    /// no key was given.
    pub fn effective_key(&self) -> &str {
        effective_key(&self.instance_key, &self.url)
    }
}

/// Resolved navigation target.
///
/// Fields are private: once a resolver hands an action to the router it is
/// only ever read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAction {
    url: String,
    instance_key: String,
    params: RouteParams,
    ext: RouteParams,
    renderer: Renderer,
}

impl RouteAction {
    /// Create an action for `url` rendered natively.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create an action that targets exactly what `request` asked for.
    pub fn from_request(request: &RouteRequest) -> Self {
        Self {
            url: request.url.clone(),
            instance_key: request.instance_key.clone(),
            params: request.params.clone(),
            ext: request.ext.clone(),
            renderer: Renderer::Native,
        }
    }

    /// Build an action from a URL whose query string carries the key,
    /// parameters and extension options.
    ///
    /// - `instanceKey=<key>` sets the instance key,
    /// - `_ext_<name>=<value>` becomes extension option `<name>`
    ///   (`_ext_animated` is parsed as a boolean),
    /// - every other pair becomes a string parameter.
    ///
    /// The fragment is discarded. Returns `None` when nothing precedes the
    /// query string.
    ///
    /// ```
    /// use hybrid_navigator::RouteAction;
    ///
    /// let action = RouteAction::from_url("app://shop/item?id=9&instanceKey=i9&_ext_animated=false").unwrap();
    /// assert_eq!(action.url(), "app://shop/item");
    /// assert_eq!(action.instance_key(), "i9");
    /// assert_eq!(action.params().get_str("id"), Some("9"));
    /// assert_eq!(action.ext().get_as::<bool>("animated"), Some(false));
    /// ```
    pub fn from_url(url: &str) -> Option<Self> {
        let without_fragment = url.split_once('#').map_or(url, |(head, _)| head);
        let (target, query) = match without_fragment.split_once('?') {
            Some((target, query)) => (target, query),
            None => (without_fragment, ""),
        };
        if target.is_empty() {
            return None;
        }

        let mut action = RouteAction::new(target);
        for (key, value) in QueryParams::from_query_string(query).iter() {
            if key == INSTANCE_KEY_QUERY {
                action.instance_key = value.to_string();
            } else if let Some(ext_key) = key.strip_prefix(EXT_QUERY_PREFIX) {
                if ext_key == "animated" {
                    action
                        .ext
                        .insert(ext_key, value.eq_ignore_ascii_case("true"));
                } else {
                    action.ext.insert(ext_key, value);
                }
            } else {
                action.params.insert(key, value);
            }
        }
        Some(action)
    }

    /// Set the instance key.
    pub fn with_instance_key(mut self, instance_key: impl Into<String>) -> Self {
        self.instance_key = instance_key.into();
        self
    }

    /// Set navigation parameters.
    pub fn with_params(mut self, params: RouteParams) -> Self {
        self.params = params;
        self
    }

    /// Set extension options.
    pub fn with_ext(mut self, ext: RouteParams) -> Self {
        self.ext = ext;
        self
    }

    /// Choose the rendering runtime.
    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Destination url.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Instance key as produced by the resolver (may be empty).
    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    /// Navigation parameters.
    pub fn params(&self) -> &RouteParams {
        &self.params
    }

    /// Extension options.
    pub fn ext(&self) -> &RouteParams {
        &self.ext
    }

    /// Rendering runtime.
    pub fn renderer(&self) -> Renderer {
        self.renderer
    }

    /// Copy the request's extension options onto an action whose resolver
    /// did not set any.
    pub(crate) fn inherit_ext(mut self, ext: &RouteParams) -> Self {
        if self.ext.is_empty() {
            self.ext = ext.clone();
        }
        self
    }
}

/// `instance_key` if non-empty, otherwise `url`.
pub(crate) fn effective_key<'a>(instance_key: &'a str, url: &'a str) -> &'a str {
    if instance_key.is_empty() {
        url
    } else {
        instance_key
    }
}
