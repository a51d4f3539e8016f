//! Decoding of `key=value` pair lists: query strings, url-encoded form bodies
//! and the `Cookie` request header.

use std::collections::HashMap;
use std::collections::hash_map;

use percent_encoding::percent_decode_str;
use serde::Serialize;

/// A decoded name/value mapping with unique keys; a repeated key keeps the
/// last value seen.
///
/// # Examples
///
/// ```
/// use plainhttp::http::query::parse_query;
///
/// let params = parse_query("q=two%20words&page=2&page=3");
/// assert_eq!(params.get("q"), Some("two words"));
/// assert_eq!(params.get("page"), Some("3"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params {
    map: HashMap<String, String>,
}

impl Params {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a pair, replacing any previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl IntoIterator for Params {
    type Item = (String, String);
    type IntoIter = hash_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.into_iter()
    }
}

/// Parses a query string (the part after `?`, without the `?`).
///
/// Pairs are split on `&`, then on the first `=`. Both halves are
/// percent-decoded and `+` decodes to a space. A pair with no `=` yields the
/// key with an empty value; empty segments are skipped.
pub fn parse_query(query: &str) -> Params {
    parse_form(query.as_bytes())
}

/// Parses an `application/x-www-form-urlencoded` body with the same rules as
/// [`parse_query`]. Invalid UTF-8 is replaced rather than rejected.
pub fn parse_form(body: &[u8]) -> Params {
    url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Parses the value of a `Cookie` request header.
///
/// Entries are separated by `"; "` and split on the first `=`. Keys and
/// values are percent-decoded (`+` is kept literally). An entry without `=`
/// carries no value and is skipped.
///
/// # Examples
///
/// ```
/// use plainhttp::http::query::parse_cookies;
///
/// let jar = parse_cookies("session=abc%3D%3D; flag; theme=dark");
/// assert_eq!(jar.get("session"), Some("abc=="));
/// assert_eq!(jar.get("theme"), Some("dark"));
/// assert!(!jar.contains_key("flag"));
/// ```
pub fn parse_cookies(header: &str) -> Params {
    header
        .split("; ")
        .filter_map(|entry| {
            let Some((key, value)) = entry.split_once('=') else {
                tracing::debug!(entry, "skipping cookie entry without '='");
                return None;
            };
            Some((decode_component(key), decode_component(value)))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

    fn encode(s: &str) -> String {
        utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
    }

    #[test]
    fn query_round_trip_with_reserved_characters() {
        let original: Params = [
            ("a&b", "c=d"),
            ("100%", "sure thing"),
            ("plain", "value"),
            ("plus+sign", "1+1=2"),
        ]
        .into_iter()
        .collect();

        let query = original
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        assert_eq!(parse_query(&query), original);
    }

    #[test]
    fn form_body_decodes_percent_and_plus() {
        let params = parse_form(b"a=1&b=two%20words&c=three+words");
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some("two words"));
        assert_eq!(params.get("c"), Some("three words"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn pair_without_equals_has_empty_value() {
        let params = parse_query("flag&x=1");
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.get("x"), Some("1"));
    }

    #[test]
    fn repeated_key_keeps_last() {
        let params = parse_query("k=1&k=2");
        assert_eq!(params.get("k"), Some("2"));
    }

    #[test]
    fn value_may_contain_equals() {
        let params = parse_query("token=abc=def");
        assert_eq!(params.get("token"), Some("abc=def"));
    }

    #[test]
    fn cookies_skip_malformed_entries() {
        let jar = parse_cookies("broken; ok=yes");
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.get("ok"), Some("yes"));
    }

    #[test]
    fn cookies_keep_plus_literally() {
        let jar = parse_cookies("sum=1+1%3D2");
        assert_eq!(jar.get("sum"), Some("1+1=2"));
    }
}
