//! Process-local feed cache with a fixed time-to-live.
//!
//! The cache lives only as long as the process that constructed it; a
//! restart starts empty. Expiry is checked lazily on lookup, there is no
//! background sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::query::CacheKey;
use crate::types::EventView;

/// Default time-to-live of a cached feed.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default bound on distinct cached queries.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// A resolved feed and the instant it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub events: Vec<EventView>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether this entry is older than `ttl` at `now`.
    ///
    /// A clock that moved backwards never expires an entry.
    fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at)
            .to_std()
            .is_ok_and(|age| age > ttl)
    }
}

/// Thread-safe TTL cache keyed by canonical query parameters.
///
/// Entries are built completely before insertion and replaced as a whole,
/// so concurrent readers see either the old or the new entry.
#[derive(Debug)]
pub struct FeedCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<CacheKey, Arc<CacheEntry>>>,
}

impl Default for FeedCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl FeedCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    /// Cache holding at most `max_entries` keys; the oldest entry is evicted
    /// to make room for a new key. A bound of 0 is treated as 1.
    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up `key`, discarding the entry if it has outlived the TTL.
    pub fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Arc<CacheEntry>> {
        let mut entries = self.entries.lock();
        if entries.get(key)?.is_expired(self.ttl, now) {
            tracing::debug!(key = %key, "Cache entry expired");
            entries.remove(key);
            return None;
        }

        entries.get(key).cloned()
    }

    /// Store `events` under `key`, replacing any previous entry.
    ///
    /// A zero TTL disables caching: the entry is returned but not stored.
    pub fn put(&self, key: CacheKey, events: Vec<EventView>, now: DateTime<Utc>) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            events,
            created_at: now,
        });

        if self.ttl.is_zero() {
            return entry;
        }

        let mut entries = self.entries.lock();
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(key = %oldest, "Evicting oldest cache entry");
                entries.remove(&oldest);
            }
        }
        entries.insert(key, Arc::clone(&entry));

        entry
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryParams;
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-14T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn key(limit: &str) -> CacheKey {
        QueryParams::new().with("limit", limit).cache_key()
    }

    fn view(id: &str) -> EventView {
        EventView {
            id: id.into(),
            title: id.into(),
            start_time: None,
            end_time: None,
            location: None,
            description: String::new(),
            image_url: None,
            registration_url: None,
            church_center_url: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_put_then_get() {
        let cache = FeedCache::default();
        cache.put(key("10"), vec![view("a")], t0());

        let entry = cache.get(&key("10"), t0() + TimeDelta::minutes(1)).unwrap();
        assert_eq!(entry.events, vec![view("a")]);
        assert_eq!(entry.created_at, t0());
    }

    #[test]
    fn test_miss_for_unknown_key() {
        let cache = FeedCache::default();
        cache.put(key("10"), vec![view("a")], t0());
        assert!(cache.get(&key("5"), t0()).is_none());
    }

    #[test]
    fn test_entry_valid_at_exact_ttl() {
        let cache = FeedCache::default();
        cache.put(key("10"), vec![view("a")], t0());
        assert!(cache.get(&key("10"), t0() + TimeDelta::minutes(5)).is_some());
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let cache = FeedCache::default();
        cache.put(key("10"), vec![view("a")], t0());

        let later = t0() + TimeDelta::minutes(5) + TimeDelta::seconds(1);
        assert!(cache.get(&key("10"), later).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clock_going_backwards_is_not_expiry() {
        let cache = FeedCache::default();
        cache.put(key("10"), vec![view("a")], t0());
        assert!(cache.get(&key("10"), t0() - TimeDelta::minutes(30)).is_some());
    }

    #[test]
    fn test_put_replaces_entry() {
        let cache = FeedCache::default();
        cache.put(key("10"), vec![view("a")], t0());
        let later = t0() + TimeDelta::minutes(2);
        cache.put(key("10"), vec![view("b")], later);

        let entry = cache.get(&key("10"), later).unwrap();
        assert_eq!(entry.events[0].id, "b");
        assert_eq!(entry.created_at, later);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = FeedCache::with_capacity(DEFAULT_TTL, 2);
        cache.put(key("1"), vec![view("a")], t0());
        cache.put(key("2"), vec![view("b")], t0() + TimeDelta::seconds(1));
        cache.put(key("3"), vec![view("c")], t0() + TimeDelta::seconds(2));

        let now = t0() + TimeDelta::seconds(3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("1"), now).is_none());
        assert!(cache.get(&key("2"), now).is_some());
        assert!(cache.get(&key("3"), now).is_some());
    }

    #[test]
    fn test_zero_ttl_stores_nothing() {
        let cache = FeedCache::new(Duration::ZERO);
        let entry = cache.put(key("10"), vec![view("a")], t0());

        assert_eq!(entry.events, vec![view("a")]);
        assert!(cache.is_empty());
        assert!(cache.get(&key("10"), t0()).is_none());
    }

    #[test]
    fn test_clear() {
        let cache = FeedCache::default();
        cache.put(key("1"), vec![view("a")], t0());
        cache.clear();
        assert!(cache.is_empty());
    }
}
