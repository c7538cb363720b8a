//! Navigation parameters and query string parsing.
//!
//! - [`RouteParams`] — the parameter map carried by a push request and by the
//!   resolved [`RouteAction`](crate::RouteAction). Values are arbitrary JSON
//!   so that both runtimes can exchange them over the bridge unchanged.
//! - [`QueryParams`] — ordered `key=value` pairs decoded from the query part
//!   of a URL, used by [`RouteAction::from_url`](crate::RouteAction::from_url).
//!
//! # Example
//!
//! ```
//! use hybrid_navigator::{RouteParams, QueryParams};
//!
//! let mut params = RouteParams::new();
//! params.insert("id", 7);
//! params.insert("title", "Detail");
//! assert_eq!(params.get_as::<u32>("id"), Some(7));
//! assert_eq!(params.get_str("title"), Some("Detail"));
//!
//! let query = QueryParams::from_query_string("page=1&sort=name");
//! assert_eq!(query.get("sort"), Some("name"));
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// String-keyed map of JSON values attached to a navigation.
///
/// Serializes transparently as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteParams {
    params: Map<String, Value>,
}

impl RouteParams {
    /// Create empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object map.
    pub fn from_map(params: Map<String, Value>) -> Self {
        Self { params }
    }

    /// Build parameters from an arbitrary JSON value.
    ///
    /// Objects become parameters; `null` becomes empty parameters; any other
    /// value is rejected with `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(params) => Some(Self { params }),
            Value::Null => Some(Self::new()),
            _ => None,
        }
    }

    /// Get a raw value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Get a value as a string slice, if it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.params.get(key)?.as_str()
    }

    /// Get a value and deserialize it into `T`.
    ///
    /// Returns `None` if the key is missing or the value does not fit `T`.
    pub fn get_as<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        T::deserialize(self.params.get(key)?).ok()
    }

    /// Insert or overwrite a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.params.insert(key.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Remove a value, returning it.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.params.remove(key)
    }

    /// Return `true` if the given key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Iterate over all `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.params.iter()
    }

    /// Return `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Return the number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Borrow the underlying JSON map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Convert into a JSON object value.
    pub fn into_value(self) -> Value {
        Value::Object(self.params)
    }

    /// Merge `base` with `overrides`; keys in `overrides` win on collision.
    ///
    /// ```
    /// use hybrid_navigator::RouteParams;
    ///
    /// let captured = RouteParams::new().with("id", "7").with("tab", "info");
    /// let explicit = RouteParams::new().with("tab", "photos");
    ///
    /// let merged = RouteParams::merge(&captured, &explicit);
    /// assert_eq!(merged.get_str("id"), Some("7"));
    /// assert_eq!(merged.get_str("tab"), Some("photos"));
    /// ```
    pub fn merge(base: &RouteParams, overrides: &RouteParams) -> RouteParams {
        let mut merged = base.clone();
        for (key, value) in overrides.iter() {
            merged.params.insert(key.clone(), value.clone());
        }
        merged
    }
}

impl From<Map<String, Value>> for RouteParams {
    fn from(params: Map<String, Value>) -> Self {
        Self { params }
    }
}

impl<K, V> FromIterator<(K, V)> for RouteParams
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Query parameters decoded from a URL query string, in source order.
///
/// Supports repeated keys.
///
/// ```
/// use hybrid_navigator::QueryParams;
///
/// let query = QueryParams::from_query_string("tag=a&tag=b&q=hello%20world");
/// assert_eq!(query.get("q"), Some("hello world"));
/// assert_eq!(query.get_all("tag").count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Create empty query parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query string (without the leading `?`).
    ///
    /// A key without `=` is kept with an empty value.
    pub fn from_query_string(query: &str) -> Self {
        let pairs = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (decode_uri_component(key), decode_uri_component(value)),
                None => (decode_uri_component(pair), String::new()),
            })
            .collect();
        Self { pairs }
    }

    /// Get the first value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get all values for a key.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over all pairs in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Return `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Return the number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// Percent-decode a URI component; `+` decodes to a space.
///
/// Invalid escapes are kept literally. Decoded bytes that are not valid
/// UTF-8 are replaced with U+FFFD.
pub(crate) fn decode_uri_component(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_params_basic() {
        let mut params = RouteParams::new();
        params.insert("id", 123);
        params.insert("name", "John");

        assert_eq!(params.get("id"), Some(&json!(123)));
        assert_eq!(params.get_str("name"), Some("John"));
        assert!(params.contains("id"));
        assert!(!params.contains("missing"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_route_params_get_as() {
        let params = RouteParams::new()
            .with("id", 42)
            .with("active", true)
            .with("tags", json!(["a", "b"]));

        assert_eq!(params.get_as::<u32>("id"), Some(42));
        assert_eq!(params.get_as::<bool>("active"), Some(true));
        assert_eq!(
            params.get_as::<Vec<String>>("tags"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(params.get_as::<u32>("active"), None);
        assert_eq!(params.get_as::<u32>("missing"), None);
    }

    #[test]
    fn test_route_params_from_value() {
        let params = RouteParams::from_value(json!({"id": 7})).unwrap();
        assert_eq!(params.get_as::<i64>("id"), Some(7));

        assert!(RouteParams::from_value(Value::Null).unwrap().is_empty());
        assert!(RouteParams::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn test_route_params_serializes_as_object() {
        let params = RouteParams::new().with("status", "ok");
        assert_eq!(serde_json::to_value(&params).unwrap(), json!({"status": "ok"}));
    }

    #[test]
    fn test_route_params_merge_overrides_win() {
        let base = RouteParams::new().with("a", 1).with("b", 1);
        let overrides = RouteParams::new().with("b", 2);

        let merged = RouteParams::merge(&base, &overrides);
        assert_eq!(merged.get_as::<i32>("a"), Some(1));
        assert_eq!(merged.get_as::<i32>("b"), Some(2));
    }

    #[test]
    fn test_query_params_basic() {
        let query = QueryParams::from_query_string("page=1&sort=name&flag");
        assert_eq!(query.get("page"), Some("1"));
        assert_eq!(query.get("sort"), Some("name"));
        assert_eq!(query.get("flag"), Some(""));
        assert_eq!(query.len(), 3);
    }

    #[test]
    fn test_query_params_repeated_keys_keep_order() {
        let query = QueryParams::from_query_string("tag=rust&tag=ui");
        assert_eq!(query.get_all("tag").collect::<Vec<_>>(), vec!["rust", "ui"]);
    }

    #[test]
    fn test_empty_query_string() {
        assert!(QueryParams::from_query_string("").is_empty());
    }

    #[test]
    fn test_uri_decoding() {
        assert_eq!(decode_uri_component("hello%20world"), "hello world");
        assert_eq!(decode_uri_component("hello+world"), "hello world");
        assert_eq!(decode_uri_component("%E4%BD%A0%E5%A5%BD"), "你好");
        assert_eq!(decode_uri_component("100%"), "100%");
        assert_eq!(decode_uri_component("%zz"), "%zz");
    }
}
