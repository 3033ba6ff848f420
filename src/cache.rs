//! Caller-owned TTL cache for computed results.
//!
//! The pipeline engines are pure and cache-agnostic; embedding services that
//! want to reuse expensive outputs (schemas, chart batches, oracle
//! annotations) hold an [`InsightCache`] at their own seam and inject lookups
//! around the engine calls. Expired entries are evicted lazily on read.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

#[derive(Debug)]
pub struct InsightCache<V> {
    ttl: Duration,
    entries: HashMap<String, (Instant, V)>,
}

impl<V> InsightCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), (Instant::now(), value));
    }

    pub fn get(&mut self, key: &str) -> Option<&V> {
        if let Some((stored_at, _)) = self.entries.get(key)
            && stored_at.elapsed() > self.ttl
        {
            self.entries.remove(key);
        }
        self.entries.get(key).map(|(_, value)| value)
    }

    /// Drops every expired entry; useful for long-lived caches with sparse
    /// reads.
    pub fn purge_expired(&mut self) {
        self.entries
            .retain(|_, (stored_at, _)| stored_at.elapsed() <= self.ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
