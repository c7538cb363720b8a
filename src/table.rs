//! Pattern-based route table.
//!
//! [`RouteTable`] is a ready-made [`RouteResolver`] for hosts whose routing is
//! declarative: an ordered list of url patterns, each naming the runtime that
//! renders it, some of them redirecting elsewhere.
//!
//! # Patterns
//!
//! Patterns are split on `/` (empty segments ignored) and matched segment by
//! segment against the url path (query and fragment stripped):
//!
//! - `users` matches the literal segment,
//! - `:id` matches any one segment and captures it as parameter `id`,
//! - `*rest` as the last segment matches the remainder (possibly empty) and
//!   captures it as `rest`; a bare `*` matches without capturing.
//!
//! The first matching entry wins. Captured values are percent-decoded and
//! merged into the action's params; explicit request params win on collision.
//!
//! # Redirects
//!
//! A redirect entry rewrites the url through a template in which `:name` and
//! `*name` segments are filled from the captured params, then resolution
//! starts over. Chains deeper than five redirects are treated as a loop and
//! declined.
//!
//! # Example
//!
//! ```
//! use hybrid_navigator::{Renderer, RouteRequest, RouteResolver, RouteTable};
//!
//! let table = RouteTable::new()
//!     .native("/settings")
//!     .embedded("/shop/item/:id")
//!     .redirect("/product/:id", "/shop/item/:id");
//!
//! let action = table.resolve(&RouteRequest::new("/product/42")).unwrap();
//! assert_eq!(action.url(), "/shop/item/42");
//! assert_eq!(action.params().get_str("id"), Some("42"));
//! assert_eq!(action.renderer(), Renderer::Embedded);
//!
//! assert!(table.resolve(&RouteRequest::new("/unknown")).is_none());
//! ```

use crate::action::{RouteAction, RouteRequest, Renderer};
use crate::params::{decode_uri_component, RouteParams};
use crate::resolver::RouteResolver;
use crate::{debug_log, error_log, trace_log, warn_log};
use std::fmt;

#[cfg(feature = "cache")]
use crate::cache::{CacheStats, ResolutionCache};
#[cfg(feature = "cache")]
use std::sync::Mutex;

/// Maximum redirect chain length before resolution is declined.
const MAX_REDIRECT_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard(Option<String>),
}

impl Segment {
    fn parse(segment: &str) -> Self {
        if let Some(name) = segment.strip_prefix(':') {
            Segment::Param(name.to_string())
        } else if let Some(name) = segment.strip_prefix('*') {
            Segment::Wildcard((!name.is_empty()).then(|| name.to_string()))
        } else {
            Segment::Literal(segment.to_string())
        }
    }
}

/// Where a matching entry sends the request.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Render(Renderer),
    Redirect(String),
}

/// One pattern in a [`RouteTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pattern: String,
    segments: Vec<Segment>,
    target: Target,
}

impl RouteEntry {
    /// Render urls matching `pattern` with `renderer`.
    pub fn render(pattern: impl Into<String>, renderer: Renderer) -> Self {
        Self::with_target(pattern.into(), Target::Render(renderer))
    }

    /// Rewrite urls matching `pattern` through `template`.
    pub fn redirect(pattern: impl Into<String>, template: impl Into<String>) -> Self {
        Self::with_target(pattern.into(), Target::Redirect(template.into()))
    }

    fn with_target(pattern: String, target: Target) -> Self {
        let segments = split_path(&pattern).map(Segment::parse).collect();
        Self {
            pattern,
            segments,
            target,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match `path`, returning the captured parameters.
    fn matches(&self, path: &str) -> Option<RouteParams> {
        let parts: Vec<&str> = split_path(path).collect();
        let mut params = RouteParams::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard(name) => {
                    if let Some(name) = name {
                        let rest = parts.get(i..).unwrap_or_default().join("/");
                        params.insert(name.clone(), decode_uri_component(&rest));
                    }
                    return Some(params);
                }
                Segment::Param(name) => {
                    let part = parts.get(i)?;
                    params.insert(name.clone(), decode_uri_component(part));
                }
                Segment::Literal(literal) => {
                    if parts.get(i) != Some(&literal.as_str()) {
                        return None;
                    }
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

/// Ordered table of url patterns used as a [`RouteResolver`].
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    fallback: Option<Renderer>,
    #[cfg(feature = "cache")]
    cache: Mutex<ResolutionCache>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            fallback: None,
            #[cfg(feature = "cache")]
            cache: Mutex::new(ResolutionCache::new()),
        }
    }

    /// Append an entry.
    pub fn add(&mut self, entry: RouteEntry) {
        debug_log!("Route table: registered '{}'", entry.pattern);
        self.entries.push(entry);
        #[cfg(feature = "cache")]
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Builder-style [`add`](Self::add).
    pub fn entry(mut self, entry: RouteEntry) -> Self {
        self.add(entry);
        self
    }

    /// Render `pattern` natively.
    pub fn native(self, pattern: impl Into<String>) -> Self {
        self.entry(RouteEntry::render(pattern, Renderer::Native))
    }

    /// Render `pattern` in the embedded engine.
    pub fn embedded(self, pattern: impl Into<String>) -> Self {
        self.entry(RouteEntry::render(pattern, Renderer::Embedded))
    }

    /// Redirect `pattern` through `template`.
    pub fn redirect(self, pattern: impl Into<String>, template: impl Into<String>) -> Self {
        self.entry(RouteEntry::redirect(pattern, template))
    }

    /// Accept urls matching no entry, rendered by `renderer`, instead of
    /// declining them.
    pub fn fallback(mut self, renderer: Renderer) -> Self {
        self.fallback = Some(renderer);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookup statistics of the internal cache.
    #[cfg(feature = "cache")]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .lock()
            .map(|cache| cache.stats().clone())
            .unwrap_or_default()
    }

    fn lookup(&self, path: &str) -> Option<(usize, RouteParams)> {
        #[cfg(feature = "cache")]
        if let Some(hit) = self.cache.lock().ok().and_then(|mut cache| cache.get(path)) {
            return Some(hit);
        }

        let found = self
            .entries
            .iter()
            .enumerate()
            .find_map(|(index, entry)| entry.matches(path).map(|params| (index, params)))?;

        #[cfg(feature = "cache")]
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(path, found.0, found.1.clone());
        }
        Some(found)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteResolver for RouteTable {
    fn resolve(&self, request: &RouteRequest) -> Option<RouteAction> {
        let mut url = request.url.clone();
        let mut captured = RouteParams::new();

        for depth in 0..=MAX_REDIRECT_DEPTH {
            let path = strip_query(&url);
            let Some((index, params)) = self.lookup(path) else {
                return match self.fallback {
                    Some(renderer) => {
                        trace_log!("Route table: '{}' unmatched, using fallback", url);
                        Some(finish(request, url, &captured, renderer))
                    }
                    None => {
                        debug_log!("Route table: no entry for '{}'", url);
                        None
                    }
                };
            };
            captured = RouteParams::merge(&captured, &params);

            match &self.entries[index].target {
                Target::Render(renderer) => {
                    trace_log!(
                        "Route table: '{}' matched '{}' after {} redirects",
                        url,
                        self.entries[index].pattern,
                        depth
                    );
                    return Some(finish(request, url, &captured, *renderer));
                }
                Target::Redirect(template) => {
                    let Some(next) = fill_template(template, &params) else {
                        warn_log!(
                            "Route table: redirect template '{}' needs params missing from '{}'",
                            template,
                            url
                        );
                        return None;
                    };
                    debug_log!("Route table: redirecting '{}' -> '{}'", url, next);
                    url = next;
                }
            }
        }

        error_log!(
            "Route table: redirect loop detected (depth {}) resolving '{}'",
            MAX_REDIRECT_DEPTH,
            request.url
        );
        None
    }

    fn name(&self) -> &'static str {
        "RouteTable"
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("entries", &self.entries)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

fn finish(request: &RouteRequest, url: String, captured: &RouteParams, renderer: Renderer) -> RouteAction {
    RouteAction::new(url)
        .with_instance_key(request.instance_key.clone())
        .with_params(RouteParams::merge(captured, &request.params))
        .with_ext(request.ext.clone())
        .with_renderer(renderer)
}

/// Substitute `:name` / `*name` segments of `template` from `params`.
fn fill_template(template: &str, params: &RouteParams) -> Option<String> {
    let filled = template
        .split('/')
        .map(|segment| {
            let name = segment
                .strip_prefix(':')
                .or_else(|| segment.strip_prefix('*').filter(|name| !name.is_empty()));
            match name {
                Some(name) => match params.get(name)? {
                    serde_json::Value::String(value) => Some(value.clone()),
                    other => Some(other.to_string()),
                },
                None => Some(segment.to_string()),
            }
        })
        .collect::<Option<Vec<_>>>()?;
    Some(filled.join("/"))
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}
