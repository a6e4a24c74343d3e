use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::config;

/// Terminal failure: the primary source is down and no usable cached result
/// exists. Maps to 503 at the HTTP layer.
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("No fallback data available")]
    NoData,
}

/// On-disk shape of the cache file.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile<T> {
    records: Vec<T>,
    timestamp: DateTime<Utc>,
    source: String,
}

/// A usable cached result: non-empty records within the staleness window.
#[derive(Debug)]
pub struct Cached<T> {
    pub records: Vec<T>,
    pub source: String,
    pub age_hours: f64,
}

/// Last-known-good cache for the ingestion pipeline.
///
/// Writes never fail the caller: a cache that cannot be saved costs the next
/// outage its fallback, not this request. Reads treat every failure mode the
/// same way (missing file, unreadable file, malformed JSON, stale timestamp):
/// log it, report "no usable data". Whether an empty snapshot is worth
/// serving is the serving decision's call, not the read's.
pub struct FallbackCache {
    path: PathBuf,
    max_age: Duration,
}

impl FallbackCache {
    pub fn new(path: impl Into<PathBuf>, max_age_hours: i64) -> Self {
        Self {
            path: path.into(),
            max_age: Duration::hours(max_age_hours),
        }
    }

    pub fn from_config() -> Self {
        let cfg = &config().ingestion;
        Self::new(&cfg.fallback_cache_path, cfg.fallback_max_age_hours)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a fresh result as the new last-known-good snapshot.
    pub async fn save<T: Serialize>(&self, records: &[T], source: &str) {
        self.save_at(records, source, Utc::now()).await
    }

    async fn save_at<T: Serialize>(&self, records: &[T], source: &str, now: DateTime<Utc>) {
        let file = CacheFileRef {
            records,
            timestamp: now,
            source,
        };

        let bytes = match serde_json::to_vec_pretty(&file) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to serialize fallback cache: {}", e);
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!("Failed to create fallback cache directory: {}", e);
                return;
            }
        }

        if let Err(e) = tokio::fs::write(&self.path, bytes).await {
            error!("Failed to write fallback cache {}: {}", self.path.display(), e);
        } else {
            debug!("Saved fallback cache ({} records)", file.records.len());
        }
    }

    /// Load the cached result if it is present, parseable, and younger than
    /// the staleness window. Anything else reads as `None`.
    pub async fn load<T: DeserializeOwned>(&self) -> Option<Cached<T>> {
        self.load_at(Utc::now()).await
    }

    async fn load_at<T: DeserializeOwned>(&self, now: DateTime<Utc>) -> Option<Cached<T>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No fallback cache at {}", self.path.display());
                return None;
            }
            Err(e) => {
                error!("Failed to read fallback cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        let file: CacheFile<T> = match serde_json::from_slice(&bytes) {
            Ok(file) => file,
            Err(e) => {
                error!("Malformed fallback cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        let age = now.signed_duration_since(file.timestamp);
        if age > self.max_age {
            warn!(
                "Fallback cache is stale ({}h old, limit {}h)",
                age.num_hours(),
                self.max_age.num_hours()
            );
            return None;
        }

        Some(Cached {
            records: file.records,
            source: file.source,
            age_hours: age.num_seconds() as f64 / 3600.0,
        })
    }

    /// Whether serving from cache is the right call: only when the primary
    /// source failed AND a fresh, non-empty cached result exists.
    pub async fn should_use_fallback(&self, primary_succeeded: bool) -> bool {
        if primary_succeeded {
            return false;
        }
        match self.load::<serde_json::Value>().await {
            Some(cached) => !cached.records.is_empty(),
            None => false,
        }
    }

    /// Load a non-empty snapshot or fail with the terminal no-data error.
    pub async fn get_or_fail<T: DeserializeOwned>(&self) -> Result<Cached<T>, FallbackError> {
        match self.load().await {
            Some(cached) if !cached.records.is_empty() => Ok(cached),
            Some(_) => {
                warn!("Fallback cache holds no records");
                Err(FallbackError::NoData)
            }
            None => Err(FallbackError::NoData),
        }
    }
}

/// Borrowing twin of [`CacheFile`] so `save` does not clone the records.
#[derive(Serialize)]
struct CacheFileRef<'a, T> {
    records: &'a [T],
    timestamp: DateTime<Utc>,
    source: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn temp_cache() -> FallbackCache {
        let path = std::env::temp_dir().join(format!("fallback-test-{}.json", Uuid::new_v4()));
        FallbackCache::new(path, 24)
    }

    async fn cleanup(cache: &FallbackCache) {
        let _ = tokio::fs::remove_file(cache.path()).await;
    }

    #[tokio::test]
    async fn save_then_load_is_fresh() {
        let cache = temp_cache();
        cache.save(&[json!({"id": "t1"})], "apify").await;

        let cached = cache.load::<serde_json::Value>().await.unwrap();
        assert_eq!(cached.records.len(), 1);
        assert_eq!(cached.source, "apify");
        assert!(cached.age_hours < 0.01);

        cleanup(&cache).await;
    }

    #[tokio::test]
    async fn never_saved_reads_as_absent() {
        let cache = temp_cache();
        assert!(cache.load::<serde_json::Value>().await.is_none());
        assert!(cache.get_or_fail::<serde_json::Value>().await.is_err());
    }

    #[tokio::test]
    async fn fresh_within_window_stale_beyond_it() {
        let cache = temp_cache();
        cache.save(&[json!({"id": "t1"})], "apify").await;

        let now = Utc::now();
        let at_23h = now + Duration::hours(23);
        let at_25h = now + Duration::hours(25);

        assert!(cache.load_at::<serde_json::Value>(at_23h).await.is_some());
        assert!(cache.load_at::<serde_json::Value>(at_25h).await.is_none());

        cleanup(&cache).await;
    }

    #[tokio::test]
    async fn primary_success_never_uses_fallback() {
        let cache = temp_cache();
        cache.save(&[json!({"id": "t1"})], "apify").await;

        assert!(!cache.should_use_fallback(true).await);
        assert!(cache.should_use_fallback(false).await);

        cleanup(&cache).await;
    }

    #[tokio::test]
    async fn empty_snapshot_loads_but_never_serves() {
        let cache = temp_cache();
        cache.save::<serde_json::Value>(&[], "apify").await;

        let cached = cache.load::<serde_json::Value>().await.unwrap();
        assert!(cached.records.is_empty());

        assert!(!cache.should_use_fallback(false).await);
        assert!(cache.get_or_fail::<serde_json::Value>().await.is_err());

        cleanup(&cache).await;
    }

    #[tokio::test]
    async fn malformed_file_reads_as_absent() {
        let cache = temp_cache();
        tokio::fs::write(cache.path(), b"not json at all").await.unwrap();

        assert!(cache.load::<serde_json::Value>().await.is_none());

        cleanup(&cache).await;
    }
}
