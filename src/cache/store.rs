//! Bounded LRU response store.
//!
//! All state lives behind one mutex, so a lookup observes either the
//! state before an insertion/eviction or the state after it.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::entry::CacheEntry;
use crate::cache::key::Fingerprint;
use crate::config::CacheConfig;
use crate::observability::metrics;

/// Budgets of a [`ResponseCache`].
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_entries: usize,
    pub max_bytes: usize,
    pub max_entry_bytes: usize,
    pub ttl: Duration,
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_entries: config.max_entries,
            max_bytes: config.max_bytes,
            max_entry_bytes: config.max_entry_bytes,
            ttl: config.ttl(),
        }
    }
}

/// Counters exposed through the admin API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
    pub resident_bytes: usize,
}

struct CacheState {
    lru: LruCache<Fingerprint, Arc<CacheEntry>>,
    resident_bytes: usize,
    stats: CacheStats,
}

impl CacheState {
    fn remove(&mut self, key: &Fingerprint) -> Option<Arc<CacheEntry>> {
        let removed = self.lru.pop(key)?;
        self.resident_bytes = self.resident_bytes.saturating_sub(removed.size());
        Some(removed)
    }

    fn evict_lru(&mut self) -> bool {
        match self.lru.pop_lru() {
            Some((key, removed)) => {
                self.resident_bytes = self.resident_bytes.saturating_sub(removed.size());
                self.stats.evictions += 1;
                metrics::record_cache_event("eviction");
                tracing::debug!(fingerprint = %key, size = removed.size(), "Evicted cache entry");
                true
            }
            None => false,
        }
    }
}

/// In-memory response cache shared by all request handlers.
pub struct ResponseCache {
    settings: CacheSettings,
    inner: Mutex<CacheState>,
}

impl ResponseCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(CacheState {
                lru: LruCache::unbounded(),
                resident_bytes: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(CacheSettings::from(config))
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Look up an entry, refreshing its recency. Expired entries are removed
    /// and reported as a miss.
    pub fn get(&self, key: &Fingerprint) -> Option<Arc<CacheEntry>> {
        if !self.settings.enabled {
            return None;
        }

        let mut guard = self.inner.lock();
        let state = &mut *guard;

        let expired = match state.lru.get(key) {
            Some(entry) if !entry.is_expired(self.settings.ttl) => {
                let entry = entry.clone();
                state.stats.hits += 1;
                metrics::record_cache_event("hit");
                return Some(entry);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.remove(key);
            state.stats.expirations += 1;
            metrics::record_cache_event("expiration");
            metrics::record_cache_resident_bytes(state.resident_bytes);
        }
        state.stats.misses += 1;
        metrics::record_cache_event("miss");
        None
    }

    /// Store an entry, evicting least-recently-used entries until both
    /// budgets hold. Returns false if the entry was not cached.
    pub fn put(&self, key: Fingerprint, entry: CacheEntry) -> bool {
        let size = entry.size();
        if !self.settings.enabled || self.settings.max_entries == 0 {
            return false;
        }
        if size > self.settings.max_entry_bytes || size > self.settings.max_bytes {
            tracing::debug!(fingerprint = %key, size, "Response too large to cache");
            return false;
        }

        let mut guard = self.inner.lock();
        let state = &mut *guard;

        state.remove(&key);
        while state.lru.len() >= self.settings.max_entries
            || state.resident_bytes + size > self.settings.max_bytes
        {
            if !state.evict_lru() {
                break;
            }
        }

        state.lru.push(key, Arc::new(entry));
        state.resident_bytes += size;
        state.stats.insertions += 1;
        metrics::record_cache_event("insertion");
        metrics::record_cache_resident_bytes(state.resident_bytes);
        true
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let mut guard = self.inner.lock();
        let state = &mut *guard;

        let expired: Vec<Fingerprint> = state
            .lru
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.settings.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }
        state.stats.expirations += expired.len() as u64;
        if !expired.is_empty() {
            metrics::record_cache_resident_bytes(state.resident_bytes);
        }
        expired.len()
    }

    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.lru.clear();
        state.resident_bytes = 0;
        metrics::record_cache_resident_bytes(0);
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.lock();
        CacheStats {
            entries: state.lru.len(),
            resident_bytes: state.resident_bytes,
            ..state.stats
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resident_bytes(&self) -> usize {
        self.inner.lock().resident_bytes
    }
}
