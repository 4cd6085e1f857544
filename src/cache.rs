use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL_SECS: u64 = 300;
pub const DEFAULT_MAX_ENTRIES: usize = 64;

#[derive(Clone)]
struct CachedResult {
    body: Value,
    created_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

/// Computed dashboard/report results keyed by method and arguments.
pub struct MetricsCache {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<String, CachedResult>,
    hits: u64,
    misses: u64,
    invalidations: u64,
}

pub fn cache_key(method: &str, years: &[i32], as_of: &str) -> String {
    let years: Vec<String> = years.iter().map(|y| y.to_string()).collect();
    format!("{}|{}|{}", method, years.join(","), as_of)
}

impl MetricsCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            invalidations: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&mut self, key: String, body: Value) {
        self.insert_at(key, body, Instant::now());
    }

    fn get_at(&mut self, key: &str, now: Instant) -> Option<Value> {
        self.evict_expired(now);
        match self.entries.get(key) {
            Some(e) => {
                self.hits += 1;
                Some(e.body.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn insert_at(&mut self, key: String, body: Value, now: Instant) {
        self.evict_expired(now);
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            if let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(
            key,
            CachedResult {
                body,
                created_at: now,
            },
        );
    }

    fn evict_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, v| now.saturating_duration_since(v.created_at) <= ttl);
    }

    /// Drops every entry. Returns how many were dropped.
    pub fn invalidate_all(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        self.invalidations += 1;
        n
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            max_entries: self.max_entries,
            ttl_secs: self.ttl.as_secs(),
            hits: self.hits,
            misses: self.misses,
            invalidations: self.invalidations,
        }
    }
}

impl Default for MetricsCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS), DEFAULT_MAX_ENTRIES)
    }
}
