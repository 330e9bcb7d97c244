//! In-memory cache manager with per-entry TTL.
//!
//! Uses DashMap for concurrent access with per-key sharding. Expired entries are
//! evicted lazily on access and, when a sweeper is started, periodically.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::CacheConfig;

/// Entries inspected per capacity eviction
pub const EVICTION_SAMPLE_SIZE: usize = 32;

/// Cached value plus the bookkeeping needed for TTL and LRU decisions
#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
    last_access: AtomicU64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration, tick: u64) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
            last_access: AtomicU64::new(tick),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

/// Thread-safe TTL cache. Callers always receive clones, never references into the store.
#[derive(Debug)]
pub struct CacheManager<V> {
    store: DashMap<String, CacheEntry<V>>,
    config: CacheConfig,
    access_clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<V> CacheManager<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        debug!(
            ttl_seconds = config.default_ttl.as_secs(),
            max_entries = ?config.max_entries,
            "Cache manager created"
        );

        Self {
            store: DashMap::new(),
            config,
            access_clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            sweeper: Mutex::new(None),
        }
    }

    /// Create with a default TTL and no other limits (for testing)
    pub fn with_ttl(default_ttl: Duration) -> Self {
        Self::new(CacheConfig {
            default_ttl,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a live entry. Expired entries are removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        match self.store.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache_key = key, "Cache HIT");
                return Some(entry.value.clone());
            }
            Some(_) => {}
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache_key = key, "Cache MISS");
                return None;
            }
        }

        // Only drop the entry if it is still the expired one; a concurrent set wins
        if self
            .store
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(cache_key = key, "Cache MISS (expired)");
        None
    }

    /// Store or overwrite a value with an explicit TTL
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let entry = CacheEntry::new(value, ttl, self.tick());
        self.store.insert(key.clone(), entry);

        debug!(cache_key = %key, ttl_ms = ttl.as_millis() as u64, "Cache SET");

        if let Some(max_entries) = self.config.max_entries {
            self.enforce_capacity(max_entries, &key);
        }
    }

    /// Store or overwrite a value with the configured default TTL
    pub fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.config.default_ttl);
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.store.remove(key).map(|(_, entry)| entry.value)
    }

    /// Drop every entry. Used for explicit invalidation only.
    pub fn clear(&self) {
        let entries = self.store.len();
        self.store.clear();
        info!(entries_removed = entries, "Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Remove every expired entry, returning how many were reclaimed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let removed = AtomicU64::new(0);

        self.store.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed.fetch_add(1, Ordering::Relaxed);
            }
            keep
        });

        let removed = removed.into_inner();
        if removed > 0 {
            self.expirations.fetch_add(removed, Ordering::Relaxed);
            debug!(removed, "Purged expired cache entries");
        }
        removed as usize
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let expired_entries = self
            .store
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .count();

        CacheStats {
            total_entries: self.store.len(),
            expired_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    /// Start the periodic expired-entry sweep. Returns false if a sweeper is already
    /// running or no tokio runtime is available.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> bool {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No tokio runtime available - cache sweeper not started");
                return false;
            }
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        *sweeper = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.purge_expired();
                    }
                    None => break,
                }
            }
        }));

        debug!(interval_ms = interval.as_millis() as u64, "Cache sweeper started");
        true
    }

    /// Stop the sweeper and release all entries. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
            debug!("Cache sweeper stopped");
        }
        if !self.store.is_empty() {
            self.clear();
        }
    }

    fn tick(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Evict until the store fits, preferring expired entries, then the least recently used.
    ///
    /// Each eviction inspects at most [`EVICTION_SAMPLE_SIZE`] entries, so the choice is an
    /// approximate LRU once the store is larger than the sample.
    fn enforce_capacity(&self, max_entries: usize, protected_key: &str) {
        while self.store.len() > max_entries {
            let now = Instant::now();
            let victim = self
                .store
                .iter()
                .filter(|entry| entry.key() != protected_key)
                .take(EVICTION_SAMPLE_SIZE)
                .min_by_key(|entry| {
                    (
                        !entry.value().is_expired(now),
                        entry.value().last_access.load(Ordering::Relaxed),
                    )
                })
                .map(|entry| entry.key().clone());

            match victim {
                Some(key) => {
                    if self.store.remove(&key).is_some() {
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                        debug!(cache_key = %key, "Cache EVICT (capacity)");
                    }
                }
                None => break,
            }
        }
    }
}

impl<V> Drop for CacheManager<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}
