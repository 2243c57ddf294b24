// Bounded time-expiring caches keyed by request fingerprints

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Injectable time source so expiry can be tested deterministically
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source used outside of tests
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CacheEntry<V> {
    value: V,
    expires: DateTime<Utc>,
    touched: u64,
}

/// Capacity-bounded cache with per-entry expiry.
///
/// Reads of expired entries are treated as absent and evicted on touch.
/// When full, the least-recently-touched entry is evicted. Expired entries
/// are otherwise removed only by an explicit `prune()` call, which the
/// process entrypoint schedules; there is no hidden background timer.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    max_size: usize,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    touch_counter: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self::with_clock(max_size, default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(max_size: usize, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size,
            default_ttl,
            clock,
            touch_counter: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();

        match entries.get_mut(key) {
            Some(entry) if entry.expires > now => {
                entry.touched = self.touch_counter.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = self.clock.now();
        let key = key.into();
        let mut entries = self.entries.lock().unwrap();

        // Evict the least-recently-touched entry when at capacity
        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.touched)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                expires: now + ttl,
                touched: self.touch_counter.fetch_add(1, Ordering::Relaxed),
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Drop all expired entries, returning how many were removed
    pub fn prune(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires > now);
        before - entries.len()
    }
}

/// Normalized request fingerprint: SHA-256 over the serialized request
pub fn fingerprint<T: Serialize>(namespace: &str, request: &T) -> String {
    let body = serde_json::to_string(request).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc::now()),
            })
        }

        fn advance(&self, duration: Duration) {
            let mut now = self.now.lock().unwrap();
            *now = *now + duration;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    #[test]
    fn test_get_and_insert() {
        let cache: TtlCache<String> = TtlCache::new(10, Duration::minutes(5));
        cache.insert("a", "alpha".to_string());

        assert_eq!(cache.get("a"), Some("alpha".to_string()));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_expired_read_is_absent_and_evicted() {
        let clock = ManualClock::new();
        let cache: TtlCache<u32> = TtlCache::with_clock(10, Duration::minutes(5), clock.clone());

        cache.insert("k", 7);
        clock.advance(Duration::minutes(6));

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_lru_eviction_when_full() {
        let cache: TtlCache<u32> = TtlCache::new(2, Duration::minutes(5));
        cache.insert("a", 1);
        cache.insert("b", 2);

        // Touch "a" so "b" becomes the least recently used
        cache.get("a");
        cache.insert("c", 3);

        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_overwrite_same_key_does_not_evict() {
        let cache: TtlCache<u32> = TtlCache::new(2, Duration::minutes(5));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_prune_removes_only_expired() {
        let clock = ManualClock::new();
        let cache: TtlCache<u32> = TtlCache::with_clock(10, Duration::minutes(5), clock.clone());

        cache.insert("short", 1);
        cache.insert_with_ttl("long", 2, Duration::hours(1));
        clock.advance(Duration::minutes(10));

        assert_eq!(cache.prune(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn test_fingerprint_stable_and_namespaced() {
        let a = fingerprint("search", &("database", 5));
        let b = fingerprint("search", &("database", 5));
        let c = fingerprint("emb", &("database", 5));
        let d = fingerprint("search", &("database", 6));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
