//! TTL-based response caches for the catalog datasets.
//!
//! One payload slot plus a last-fetch instant per cache. No lock is held
//! across a reload, so concurrent refreshes may race and redundantly
//! re-read the source; the source is idempotent and read-only, which makes
//! the race benign.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::Config;

pub const PRODUCTS_TTL: Duration = Duration::from_secs(5 * 60);
pub const COLLECTIONS_TTL: Duration = Duration::from_secs(10 * 60);

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self) -> anyhow::Result<Value>;
}

/// Reads one JSON document from disk.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for FileSource {
    async fn load(&self) -> anyhow::Result<Value> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("{} is not valid JSON", self.path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

struct Entry {
    fetched_at: Instant,
    payload: Value,
}

pub struct ResponseCache {
    source: Box<dyn DataSource>,
    clock: Box<dyn Clock>,
    ttl: Duration,
    slot: RwLock<Option<Entry>>,
}

impl ResponseCache {
    pub fn new(source: Box<dyn DataSource>, clock: Box<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Serves the cached payload while it is fresh, unless `bypass` forces
    /// a reload. A load failure is returned as-is and leaves the slot
    /// untouched.
    pub async fn get(&self, bypass: bool) -> anyhow::Result<(Value, CacheStatus)> {
        if !bypass {
            let slot = self.slot.read().await;
            if let Some(entry) = slot.as_ref() {
                if self.clock.now().duration_since(entry.fetched_at) < self.ttl {
                    return Ok((entry.payload.clone(), CacheStatus::Hit));
                }
            }
        }

        let fresh = self.source.load().await?;
        let mut slot = self.slot.write().await;
        *slot = Some(Entry {
            fetched_at: self.clock.now(),
            payload: fresh.clone(),
        });
        Ok((fresh, CacheStatus::Miss))
    }
}

pub struct CatalogCaches {
    pub products: ResponseCache,
    pub collections: ResponseCache,
}

impl CatalogCaches {
    pub fn from_config(config: &Config) -> Self {
        Self {
            products: ResponseCache::new(
                Box::new(FileSource::new(config.products_path.clone())),
                Box::new(SystemClock),
                PRODUCTS_TTL,
            ),
            collections: ResponseCache::new(
                Box::new(FileSource::new(config.collections_path.clone())),
                Box::new(SystemClock),
                COLLECTIONS_TTL,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Instant::now()),
            }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for &'static ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    struct CountingSource {
        loads: AtomicUsize,
        fail: AtomicUsize,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                loads: AtomicUsize::new(0),
                fail: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DataSource for &'static CountingSource {
        async fn load(&self) -> anyhow::Result<Value> {
            if self.fail.load(Ordering::SeqCst) > 0 {
                self.fail.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("source unavailable");
            }
            let n = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(json!({ "load": n }))
        }
    }

    fn leaked_cache(ttl: Duration) -> (&'static CountingSource, &'static ManualClock, ResponseCache) {
        let source: &'static CountingSource = Box::leak(Box::new(CountingSource::new()));
        let clock: &'static ManualClock = Box::leak(Box::new(ManualClock::new()));
        let cache = ResponseCache::new(Box::new(source), Box::new(clock), ttl);
        (source, clock, cache)
    }

    #[tokio::test]
    async fn test_cold_start_misses_then_hits() {
        let (_source, _clock, cache) = leaked_cache(Duration::from_secs(300));

        let (first, status) = cache.get(false).await.unwrap();
        assert_eq!(status, CacheStatus::Miss);
        let (second, status) = cache.get(false).await.unwrap();
        assert_eq!(status, CacheStatus::Hit);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_expiry_forces_reload() {
        let (source, clock, cache) = leaked_cache(Duration::from_secs(300));

        cache.get(false).await.unwrap();
        clock.advance(Duration::from_secs(301));
        let (_, status) = cache.get(false).await.unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bypass_reloads_within_ttl() {
        let (source, _clock, cache) = leaked_cache(Duration::from_secs(300));

        cache.get(false).await.unwrap();
        let (_, status) = cache.get(true).await.unwrap();
        assert_eq!(status, CacheStatus::Miss);
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_load_failure_leaves_slot_untouched() {
        let (source, clock, cache) = leaked_cache(Duration::from_secs(300));

        let (first, _) = cache.get(false).await.unwrap();

        source.fail.store(1, Ordering::SeqCst);
        assert!(cache.get(true).await.is_err());

        // The stale-but-valid entry is still served within its window.
        clock.advance(Duration::from_secs(10));
        let (served, status) = cache.get(false).await.unwrap();
        assert_eq!(status, CacheStatus::Hit);
        assert_eq!(served, first);
    }

    #[tokio::test]
    async fn test_file_source_missing_file_errors() {
        let source = FileSource::new("/nonexistent/catalog.json");
        assert!(source.load().await.is_err());
    }
}
