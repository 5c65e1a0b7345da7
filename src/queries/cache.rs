use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::AppResult;

/// Default time a cached result is served without refetching.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

/// Entity families; a mutation invalidates every entry of its family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryFamily {
    Spares,
    Inventory,
    Cart,
    Requests,
    Movements,
    Warranties,
    Counts,
    Notifications,
    Locations,
    Technicians,
    Orders,
    ScooterTypes,
}

impl QueryFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryFamily::Spares => "spares",
            QueryFamily::Inventory => "inventory",
            QueryFamily::Cart => "cart",
            QueryFamily::Requests => "requests",
            QueryFamily::Movements => "movements",
            QueryFamily::Warranties => "warranties",
            QueryFamily::Counts => "counts",
            QueryFamily::Notifications => "notifications",
            QueryFamily::Locations => "locations",
            QueryFamily::Technicians => "technicians",
            QueryFamily::Orders => "orders",
            QueryFamily::ScooterTypes => "scooter_types",
        }
    }
}

impl fmt::Display for QueryFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct CacheEntry {
    family: QueryFamily,
    value: serde_json::Value,
    fetched_at: Instant,
}

/// Parameter-keyed result cache shared by the query hooks.
///
/// Entries live in memory only. The CLI builds one cache per command run, so a hit
/// requires a repeated read within the same run; nothing carries over between commands.
pub struct QueryCache {
    stale_time: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIME)
    }
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            stale_time,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// `family:<params as JSON>`; identical parameter objects map to the same key.
    pub fn key<P: Serialize + ?Sized>(family: QueryFamily, params: &P) -> AppResult<String> {
        Ok(format!("{}:{}", family, serde_json::to_string(params)?))
    }

    /// Returns the cached value for `(family, params)` while it is fresh,
    /// otherwise runs `fetch` and stores its result. Failures are not cached.
    pub async fn fetch<T, P, F, Fut>(&self, family: QueryFamily, params: &P, fetch: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        P: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let key = Self::key(family, params)?;

        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key) {
                if entry.fetched_at.elapsed() < self.stale_time {
                    tracing::debug!("query cache hit: {}", key);
                    return Ok(serde_json::from_value(entry.value.clone())?);
                }
            }
        }

        tracing::debug!("query cache miss: {}", key);
        let value = fetch().await?;

        {
            let mut entries = self.entries.write().await;
            entries.insert(
                key,
                CacheEntry {
                    family,
                    value: serde_json::to_value(&value)?,
                    fetched_at: Instant::now(),
                },
            );
        }

        Ok(value)
    }

    /// Drops every entry of `family`.
    pub async fn invalidate(&self, family: QueryFamily) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.family != family);
        tracing::debug!(
            "invalidated {} cached {} queries",
            before - entries.len(),
            family
        );
    }

    pub async fn invalidate_all(&self, families: &[QueryFamily]) {
        for family in families {
            self.invalidate(*family).await;
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_key_includes_family_and_params() {
        let key = QueryCache::key(QueryFamily::Spares, &json!({"page": 1, "search": "filtro"})).unwrap();
        assert_eq!(key, r#"spares:{"page":1,"search":"filtro"}"#);
    }

    #[tokio::test]
    async fn test_identical_params_hit_cache() {
        let cache = QueryCache::default();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Vec<String> = cache
                .fetch(QueryFamily::Spares, &("1", 1), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["a".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(value, vec!["a"]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let _: Vec<String> = cache
            .fetch(QueryFamily::Spares, &("1", 2), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_only_drops_family() {
        let cache = QueryCache::default();
        let _: i32 = cache
            .fetch(QueryFamily::Inventory, "x", || async { Ok(1) })
            .await
            .unwrap();
        let _: i32 = cache
            .fetch(QueryFamily::Cart, "x", || async { Ok(2) })
            .await
            .unwrap();

        cache.invalidate(QueryFamily::Inventory).await;
        assert_eq!(cache.len().await, 1);

        let refetched: i32 = cache
            .fetch(QueryFamily::Inventory, "x", || async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(refetched, 3);
    }

    #[tokio::test]
    async fn test_stale_entries_are_refetched() {
        let cache = QueryCache::new(Duration::ZERO);
        let _: i32 = cache
            .fetch(QueryFamily::Counts, "x", || async { Ok(1) })
            .await
            .unwrap();
        let second: i32 = cache
            .fetch(QueryFamily::Counts, "x", || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = QueryCache::default();
        let failed: AppResult<i32> = cache
            .fetch(QueryFamily::Warranties, "x", || async {
                Err(AppError::Internal("boom".to_string()))
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_separate_caches_share_nothing() {
        let first = QueryCache::default();
        let _: i32 = first
            .fetch(QueryFamily::Orders, "x", || async { Ok(1) })
            .await
            .unwrap();

        let second = QueryCache::default();
        assert!(second.is_empty().await);
        let fetched: i32 = second
            .fetch(QueryFamily::Orders, "x", || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(fetched, 2);
    }
}
