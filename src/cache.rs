//! Time-bounded result cache.
//!
//! Entries expire after their TTL and are dropped lazily on lookup or by
//! [`TtlCache::sweep`]. The LRU capacity is only a ceiling on memory; under
//! normal load TTL expiry is what removes entries.

use lru::LruCache;
use serde_json::{Map, Value};
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;

use crate::optimizer::rewrite::normalize_whitespace;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

pub struct TtlCache<T> {
    entries: LruCache<String, CacheEntry<T>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Live value for `key`. An expired entry counts as a miss and is removed.
    pub fn get(&mut self, key: &str) -> Option<T> {
        let now = Instant::now();
        if self.entries.peek(key)?.is_expired(now) {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: T, ttl: Duration) {
        let now = Instant::now();
        self.entries.put(
            key.into(),
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }
        expired.len()
    }

    /// Drops entries whose key contains `pattern`, or everything.
    pub fn invalidate(&mut self, pattern: Option<&str>) -> usize {
        match pattern {
            None => {
                let count = self.entries.len();
                self.entries.clear();
                count
            }
            Some(pattern) => {
                let matching: Vec<String> = self
                    .entries
                    .iter()
                    .filter(|(key, _)| key.contains(pattern))
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in &matching {
                    self.entries.pop(key);
                }
                matching.len()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// JSON with object keys sorted at every level and `query` strings
/// whitespace-collapsed.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value, None).to_string()
}

fn canonicalize(value: &Value, key: Option<&str>) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for k in keys {
                sorted.insert(k.clone(), canonicalize(&map[k], Some(k)));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| canonicalize(v, None)).collect()),
        Value::String(s) if key == Some("query") => Value::String(normalize_whitespace(s)),
        other => other.clone(),
    }
}

/// `kind:` followed by the canonical form of the arguments.
pub fn cache_key(kind: &str, args: &Value) -> String {
    format!("{kind}:{}", canonical_json(args))
}
