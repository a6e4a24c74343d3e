use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::content::{self, SocialPost};
use crate::config::config;
use crate::error::ApiError;
use crate::services::fallback::FallbackCache;
use crate::store::{names, now_timestamp, Store, StoreError};

/// Result of one ingestion run: where the records came from and what they are.
#[derive(Debug, Serialize)]
pub struct IngestOutcome {
    pub source: &'static str,
    pub count: usize,
    pub records: Vec<SocialPost>,
}

/// Run the ingestion pipeline: scrape the configured handles, persist the
/// result, refresh the fallback cache. When the primary source fails, serve
/// the last known-good snapshot instead; only when that is also unusable does
/// the run fail.
pub async fn run(store: &Store) -> Result<IngestOutcome, ApiError> {
    let cache = FallbackCache::from_config();

    match content::scrape_posts(&config().content.ingest_handles).await {
        Ok(posts) => {
            persist(store, &posts).await?;
            cache.save(&posts, "apify").await;
            info!("Ingested {} posts from primary source", posts.len());
            Ok(IngestOutcome {
                source: "primary",
                count: posts.len(),
                records: posts,
            })
        }
        Err(e) => {
            warn!("Primary ingestion failed, trying fallback cache: {}", e);
            let cached = cache.get_or_fail::<SocialPost>().await?;
            info!(
                "Serving {} posts from fallback cache ({:.1}h old)",
                cached.records.len(),
                cached.age_hours
            );
            Ok(IngestOutcome {
                source: "fallback",
                count: cached.records.len(),
                records: cached.records,
            })
        }
    }
}

async fn persist(store: &Store, posts: &[SocialPost]) -> Result<(), ApiError> {
    let tweets = store.collection(names::TWEETS);
    let ingested_at = now_timestamp();

    for post in posts {
        let mut doc = serde_json::to_value(post).map_err(StoreError::from)?;
        doc["ingested_at"] = serde_json::Value::String(ingested_at.clone());
        tweets.set(&post.id, &doc).await?;
    }
    Ok(())
}
