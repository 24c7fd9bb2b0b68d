//! TTL cache with write-through persistence.
//!
//! Memoizes expensive backend fetches across process restarts. Persistence
//! is best-effort: storage failures degrade the cache to in-memory-only and
//! never reach callers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use common::clock::Clock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::kv::KeyValueStore;

/// A cached value with its staleness bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        age.num_milliseconds() >= 0 && (age.num_milliseconds() as u128) < self.ttl_secs as u128 * 1000
    }
}

/// Per-engine TTL cache. Last write wins per key; the whole map is
/// persisted on every insert (small maps, so write-through is acceptable;
/// a larger deployment would debounce).
pub struct ExpiringCache<T> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    clock: Arc<dyn Clock>,
}

impl<T> Clone for ExpiringCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            store: self.store.clone(),
            namespace: self.namespace.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<T> ExpiringCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Open the cache, hydrating from the persisted copy when one exists.
    /// Load failures leave the cache cold, indistinguishable from empty.
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        namespace: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let namespace = namespace.into();
        let entries = match store.get(&namespace).await {
            Ok(Some(raw)) => match serde_json::from_str::<HashMap<String, CacheEntry<T>>>(&raw) {
                Ok(map) => {
                    debug!("loaded {} cached entries for {}", map.len(), namespace);
                    map
                }
                Err(e) => {
                    warn!("discarding corrupt cache for {}: {}", namespace, e);
                    HashMap::new()
                }
            },
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("failed to load cache for {}: {}", namespace, e);
                HashMap::new()
            }
        };

        Self {
            entries: Arc::new(RwLock::new(entries)),
            store,
            namespace,
            clock,
        }
    }

    /// Returns the cached value only while it is within its TTL.
    pub async fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.is_fresh(self.clock.now()) {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Overwrite an entry and persist the full map.
    pub async fn insert(&self, key: &str, value: T, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
            ttl_secs: ttl.as_secs(),
        };

        let snapshot = {
            let mut entries = self.entries.write().await;
            entries.insert(key.to_string(), entry);
            serde_json::to_string(&*entries)
        };

        match snapshot {
            Ok(raw) => {
                if let Err(e) = self.store.set(&self.namespace, &raw).await {
                    warn!("failed to persist cache for {}: {}", self.namespace, e);
                }
            }
            Err(e) => warn!("failed to serialize cache for {}: {}", self.namespace, e),
        }
    }

    /// Empty the map and delete the persisted copy.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        if let Err(e) = self.store.remove(&self.namespace).await {
            warn!("failed to remove persisted cache for {}: {}", self.namespace, e);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Derive a printable cache key from a query parameter struct.
///
/// Stable JSON serialization, base64-encoded and stripped to
/// alphanumerics. Uniqueness is only what the encoding provides; this is
/// deliberately not a cryptographic digest.
pub fn cache_key<P: Serialize>(prefix: &str, params: &P) -> String {
    let encoded = match serde_json::to_string(params) {
        Ok(json) => STANDARD.encode(json),
        Err(e) => {
            warn!("cache key serialization failed for {}: {}", prefix, e);
            String::new()
        }
    };
    let cleaned: String = encoded.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    format!("{}_{}", prefix, cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use chrono::TimeZone;
    use common::clock::ManualClock;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn get_respects_ttl() {
        let clock = clock();
        let cache: ExpiringCache<Vec<i64>> = ExpiringCache::open(
            Arc::new(MemoryStore::new()),
            "testCache",
            clock.clone(),
        )
        .await;

        cache.insert("k", vec![1, 2, 3], Duration::from_secs(300)).await;
        assert_eq!(cache.get("k").await, Some(vec![1, 2, 3]));

        clock.advance(chrono::Duration::seconds(299));
        assert_eq!(cache.get("k").await, Some(vec![1, 2, 3]));

        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(cache.get("k").await, None, "entry past TTL must be absent");
    }

    #[tokio::test]
    async fn insert_overwrites_and_resets_age() {
        let clock = clock();
        let cache: ExpiringCache<i64> = ExpiringCache::open(
            Arc::new(MemoryStore::new()),
            "testCache",
            clock.clone(),
        )
        .await;

        cache.insert("k", 1, Duration::from_secs(60)).await;
        clock.advance(chrono::Duration::seconds(59));
        cache.insert("k", 2, Duration::from_secs(60)).await;
        clock.advance(chrono::Duration::seconds(59));
        assert_eq!(cache.get("k").await, Some(2));
    }

    #[tokio::test]
    async fn survives_reopen() {
        let clock = clock();
        let store = Arc::new(MemoryStore::new());

        let cache: ExpiringCache<String> =
            ExpiringCache::open(store.clone(), "priceCache", clock.clone()).await;
        cache.insert("k", "hello".into(), Duration::from_secs(300)).await;
        drop(cache);

        let reopened: ExpiringCache<String> =
            ExpiringCache::open(store, "priceCache", clock).await;
        assert_eq!(reopened.get("k").await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn corrupt_persisted_map_starts_cold() {
        let store = Arc::new(MemoryStore::new());
        store.set("priceCache", "{not valid json").await.unwrap();

        let cache: ExpiringCache<String> =
            ExpiringCache::open(store, "priceCache", clock()).await;
        assert!(cache.is_empty().await);
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn clear_removes_persisted_copy() {
        let clock = clock();
        let store = Arc::new(MemoryStore::new());

        let cache: ExpiringCache<i64> =
            ExpiringCache::open(store.clone(), "routeCache", clock.clone()).await;
        cache.insert("k", 7, Duration::from_secs(600)).await;
        cache.clear().await;

        assert_eq!(cache.len().await, 0);
        assert_eq!(store.get("routeCache").await.unwrap(), None);

        let reopened: ExpiringCache<i64> = ExpiringCache::open(store, "routeCache", clock).await;
        assert!(reopened.is_empty().await);
    }

    #[test]
    fn cache_keys_are_stable_and_distinct() {
        #[derive(Serialize)]
        struct Params<'a> {
            crop_type: &'a str,
            limit: u32,
        }

        let a1 = cache_key("price", &Params { crop_type: "Teff", limit: 100 });
        let a2 = cache_key("price", &Params { crop_type: "Teff", limit: 100 });
        let b = cache_key("price", &Params { crop_type: "Maize", limit: 100 });

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert!(a1.starts_with("price_"));
        assert!(a1.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }
}
