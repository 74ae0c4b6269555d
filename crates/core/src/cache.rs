use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn cache_key(symbol: &str, shape: &str) -> String {
    format!("{}:{}", symbol.trim().to_uppercase(), shape)
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    cached_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Some(ttl),
            clock,
        }
    }

    pub fn unbounded(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: None,
            clock,
        }
    }

    fn is_expired(&self, entry: &CacheEntry<V>) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        // A clock that moved backwards yields a negative age: still fresh.
        (self.clock.now() - entry.cached_at)
            .to_std()
            .map(|age| age >= ttl)
            .unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if !self.is_expired(&entry) {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| self.is_expired(entry));
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                cached_at: self.clock.now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn get_or_compute<F, Fut>(&self, key: &str, producer: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(hit) = self.get(key) {
            tracing::debug!(key, "cache hit");
            return hit;
        }
        let value = producer().await;
        self.insert(key, value.clone());
        value
    }

    pub async fn get_or_try_compute<F, Fut, E>(&self, key: &str, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(key) {
            tracing::debug!(key, "cache hit");
            return Ok(hit);
        }
        let value = producer().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 27, 10, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn entries_expire_after_ttl() {
        let clock = clock();
        let cache = TtlCache::new(Duration::from_secs(900), clock.clone());
        cache.insert("AAPL:60d", 1);

        clock.advance(Duration::from_secs(899));
        assert_eq!(cache.get("AAPL:60d"), Some(1));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("AAPL:60d"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn unbounded_cache_never_expires() {
        let clock = clock();
        let cache = TtlCache::unbounded(clock.clone());
        cache.insert("AAPL:info", "x".to_string());
        clock.advance(Duration::from_secs(86_400 * 365));
        assert_eq!(cache.get("AAPL:info").as_deref(), Some("x"));
    }

    #[test]
    fn keys_are_normalized_by_symbol() {
        assert_eq!(cache_key(" aapl ", "60d"), "AAPL:60d");
    }

    #[tokio::test]
    async fn get_or_compute_memoizes() {
        let cache = TtlCache::new(Duration::from_secs(60), clock());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let v = cache
                .get_or_compute("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    42
                })
                .await;
            assert_eq!(v, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(60), clock());

        let err = cache
            .get_or_try_compute("k", || async { Err::<i32, &str>("down") })
            .await;
        assert_eq!(err, Err("down"));
        assert!(cache.get("k").is_none());

        let ok = cache
            .get_or_try_compute("k", || async { Ok::<i32, &str>(7) })
            .await;
        assert_eq!(ok, Ok(7));
        assert_eq!(cache.get("k"), Some(7));
    }

    #[tokio::test]
    async fn distinct_keys_do_not_interfere_across_tasks() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60), clock()));
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(&format!("S{i}:60d"), || async move { i })
                    .await
            }));
        }
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.await.unwrap(), i);
        }
        assert_eq!(cache.len(), 16);
    }
}
