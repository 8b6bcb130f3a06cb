//! Inbound query parameters and the cache keys derived from them.

use std::collections::BTreeMap;
use std::fmt;

/// Occurrences returned when no `limit` is given.
pub const DEFAULT_LIMIT: u32 = 10;

/// Upstream page size ceiling.
pub const MAX_LIMIT: u32 = eventfeed_core::MAX_PAGE_SIZE;

/// Inbound query parameters, stored as received.
///
/// Normalisation happens only when deriving the [`CacheKey`]: values are
/// trimmed and `limit` is compared numerically, so `10`, `"10"` and `" 010"`
/// share a key. Other values such as `id` reach upstream unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from string pairs, as parsed from a query string. Later pairs win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.insert(key, value.as_ref());
        }
        params
    }

    /// Build from a JSON object, accepting numeric as well as string values.
    /// `null` values are treated as absent.
    pub fn from_json(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut params = Self::new();
        for (key, value) in map {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => {
                    params.insert(key.clone(), s);
                }
                serde_json::Value::Number(n) => {
                    params.insert(key.clone(), &render_number(n));
                }
                other => {
                    params.insert(key.clone(), &other.to_string());
                }
            }
        }
        params
    }

    pub fn insert(&mut self, key: impl Into<String>, value: &str) -> &mut Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical, order-independent key covering every parameter.
    pub fn cache_key(&self) -> CacheKey {
        let key = self
            .0
            .iter()
            .map(|(k, v)| {
                let v = canonical_value(k, v);
                format!("{}={}", urlencoding::encode(k), urlencoding::encode(&v))
            })
            .collect::<Vec<_>>()
            .join("&");
        CacheKey(key)
    }
}

/// Cache-key form of a value: trimmed, with `limit` compared numerically.
fn canonical_value(key: &str, value: &str) -> String {
    let trimmed = value.trim();
    if key != "limit" {
        return trimmed.to_string();
    }
    match trimmed.parse::<i64>() {
        Ok(n) => n.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Whole-number floats render as integers, so `10.0` and `10` agree.
fn render_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

/// Key under which a feed is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<default>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// What to fetch upstream for one feed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub limit: u32,
    /// Single occurrence id; when set, `limit` and the time filter are ignored.
    pub id: Option<String>,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            id: None,
        }
    }
}

impl FeedQuery {
    pub fn from_params(params: &QueryParams) -> Self {
        Self::with_default_limit(params, DEFAULT_LIMIT)
    }

    /// Like [`from_params`](Self::from_params), falling back to
    /// `default_limit` when `limit` is absent or invalid.
    pub fn with_default_limit(params: &QueryParams, default_limit: u32) -> Self {
        let default_limit = default_limit.clamp(1, MAX_LIMIT);
        let id = params
            .get("id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let limit = match params.get("limit").map(str::trim) {
            None | Some("") => default_limit,
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) | Err(_) => {
                    tracing::warn!("Ignoring invalid limit {:?}, using {}", raw, default_limit);
                    default_limit
                }
                Ok(n) if n > MAX_LIMIT => {
                    tracing::warn!("Clamping limit {} to {}", n, MAX_LIMIT);
                    MAX_LIMIT
                }
                Ok(n) => n,
            },
        };

        Self { limit, id }
    }
}
