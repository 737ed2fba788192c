//! Per-rep sales context cache with TTL expiry and LRU eviction.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use salesdesk_core::types::SalesContext;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: SalesContext,
    refreshed_at: Instant,
    accessed_at: Instant,
}

/// Sales contexts keyed by rep email.
///
/// An entry older than `ttl` reads as absent. Inserting a new key while at
/// `capacity` evicts the least recently accessed entry first.
#[derive(Debug)]
pub struct SalesDataCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl SalesDataCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<SalesContext> {
        self.get_at(key, Instant::now())
    }

    pub fn set(&self, key: &str, value: SalesContext) {
        self.set_at(key, value, Instant::now());
    }

    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of entries still within the TTL.
    pub fn len(&self) -> usize {
        self.len_at(Instant::now())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<SalesContext> {
        let mut entries = self.lock();
        let entry = entries.get_mut(key)?;
        if now.saturating_duration_since(entry.refreshed_at) >= self.ttl {
            return None;
        }
        entry.accessed_at = now;
        Some(entry.value.clone())
    }

    fn len_at(&self, now: Instant) -> usize {
        self.lock()
            .values()
            .filter(|e| now.saturating_duration_since(e.refreshed_at) < self.ttl)
            .count()
    }

    fn set_at(&self, key: &str, value: SalesContext, now: Instant) {
        let mut entries = self.lock();
        let ttl = self.ttl;
        entries.retain(|_, e| now.saturating_duration_since(e.refreshed_at) < ttl);
        if !entries.contains_key(key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.accessed_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(key = %oldest, "Evicting least recently used sales context");
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                refreshed_at: now,
                accessed_at: now,
            },
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
