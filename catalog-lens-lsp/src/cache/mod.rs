//! In-memory TTL cache for package metadata
//!
//! Catalog data itself is cached by the
//! [`CatalogResolver`](crate::workspace::CatalogResolver) and evicted on
//! manifest changes; this cache only holds network and `npm view` results,
//! which expire after a fixed time instead.

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default TTL for cache entries (1 hour)
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Cleanup interval for the background task (30 minutes)
const CLEANUP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Cache entry with expiration
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    inserted_at: Instant,
}

/// In-memory cache using DashMap for thread-safety
///
/// Clones share both the entries and the TTL.
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: Arc<DashMap<String, CacheEntry<V>>>,
    /// TTL in milliseconds
    ttl_ms: Arc<AtomicU64>,
}

impl<V> Clone for MemoryCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            ttl_ms: Arc::clone(&self.ttl_ms),
        }
    }
}

impl<V: Clone> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> MemoryCache<V> {
    /// Create a new cache with default TTL
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl_ms: Arc::new(AtomicU64::new(duration_millis(ttl))),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.load(Ordering::Relaxed))
    }

    /// Change the TTL; applies to existing entries too
    pub fn set_ttl(&self, ttl: Duration) {
        self.ttl_ms.store(duration_millis(ttl), Ordering::Relaxed);
    }

    fn is_expired(&self, entry: &CacheEntry<V>) -> bool {
        entry.inserted_at.elapsed() > self.ttl()
    }

    /// Get a value from the cache
    ///
    /// Returns `None` if the key doesn't exist or the entry is expired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| entry.data.clone())
    }

    /// Insert a value, overwriting any previous entry
    pub fn insert(&self, key: String, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                data: value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries, including expired ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all expired entries from the cache
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl();
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() <= ttl);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(
                "Cleaned up {removed} expired cache entries ({} remaining)",
                self.entries.len()
            );
        }
        removed
    }

    /// Counts of total, expired, and valid entries
    pub fn stats(&self) -> CacheStats {
        let total = self.entries.len();
        let expired = self
            .entries
            .iter()
            .filter(|entry| self.is_expired(entry))
            .count();
        CacheStats {
            total_entries: total,
            expired_entries: expired,
            valid_entries: total.saturating_sub(expired),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> MemoryCache<V> {
    /// Spawn a background task that periodically drops expired entries
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_cleanup_task(&self) {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            interval.tick().await; // Skip immediate first tick

            loop {
                interval.tick().await;
                let stats = cache.stats();
                let removed = cache.cleanup_expired();
                if removed > 0 {
                    tracing::info!(
                        "Background cleanup: removed {removed} expired entries (was: {stats})"
                    );
                }
            }
        });
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Statistics about cache contents
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Total number of entries in the cache
    pub total_entries: usize,
    /// Number of expired entries
    pub expired_entries: usize,
    /// Number of valid (non-expired) entries
    pub valid_entries: usize,
}

impl Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CacheStats {{ total: {}, expired: {}, valid: {} }}",
            self.total_entries, self.expired_entries, self.valid_entries
        )
    }
}
