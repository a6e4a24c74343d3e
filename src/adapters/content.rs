use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::config;

const EPIC_CMS_URL: &str =
    "https://fortnitecontent-website-prod07.ol.epicgames.com/content/api/pages/fortnite-game";
const EVENTS_API_BASE: &str = "https://fortniteapi.io/v1";
const APIFY_API_BASE: &str = "https://api.apify.com/v2";
const TWEET_SCRAPER_ACTOR: &str = "apidojo~tweet-scraper";
const SCRAPE_MAX_ITEMS: u32 = 40;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Content source not configured: set {0}")]
    NotConfigured(&'static str),

    #[error("Content API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Content request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Competitive event as served to the frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
}

/// A scraped social post, normalized from the scraper's item shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: String,
    pub text: String,
    pub username: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub is_retweet: bool,
    #[serde(default)]
    pub is_reply: bool,
}

/// Upcoming tournaments from the events API.
pub async fn fetch_tournaments(region: &str) -> Result<Vec<Tournament>, ContentError> {
    let api_key = config()
        .content
        .fortnite_api_key
        .as_deref()
        .ok_or(ContentError::NotConfigured("FORTNITE_API_KEY"))?;

    debug!("Fetching tournaments for region {}", region);
    let response = reqwest::Client::new()
        .get(format!("{}/events/list", EVENTS_API_BASE))
        .header("Authorization", api_key)
        .query(&[("lang", "en"), ("region", region)])
        .send()
        .await?;

    let body = check(response).await?;
    let events = body["events"].as_array().cloned().unwrap_or_default();

    Ok(events
        .iter()
        .filter_map(|event| {
            Some(Tournament {
                id: event["id"].as_str()?.to_string(),
                title: event["name_line1"]
                    .as_str()
                    .or_else(|| event["name"].as_str())?
                    .to_string(),
                start_time: event["beginTime"].as_str().map(String::from),
                end_time: event["endTime"].as_str().map(String::from),
                region: event["region"].as_str().map(String::from),
                poster: event["poster"].as_str().map(String::from),
            })
        })
        .collect())
}

/// Current news entries from the Epic CMS feed, shaped like tournaments so
/// they can be merged with the events API output. No credentials needed.
pub async fn fetch_epic_news() -> Result<Vec<Tournament>, ContentError> {
    debug!("Fetching Epic CMS news feed");
    let response = reqwest::Client::new().get(EPIC_CMS_URL).send().await?;
    let body = check(response).await?;

    let motds = body["battleroyalenews"]["news"]["motds"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    Ok(motds
        .iter()
        .filter_map(|motd| {
            Some(Tournament {
                id: motd["id"].as_str()?.to_string(),
                title: motd["title"].as_str()?.to_string(),
                start_time: None,
                end_time: None,
                region: None,
                poster: motd["image"].as_str().map(String::from),
            })
        })
        .collect())
}

/// Run the hosted tweet-scraper actor synchronously and normalize its
/// dataset items. One call per ingestion run; the actor fans out over the
/// configured handles itself.
pub async fn scrape_posts(handles: &[String]) -> Result<Vec<SocialPost>, ContentError> {
    let token = config()
        .content
        .apify_token
        .as_deref()
        .ok_or(ContentError::NotConfigured("APIFY_TOKEN"))?;

    debug!("Scraping posts for {} handles", handles.len());
    let response = reqwest::Client::new()
        .post(format!(
            "{}/acts/{}/run-sync-get-dataset-items",
            APIFY_API_BASE, TWEET_SCRAPER_ACTOR
        ))
        .query(&[("token", token)])
        .json(&json!({
            "twitterHandles": handles,
            "maxItems": SCRAPE_MAX_ITEMS,
            "sort": "Latest",
        }))
        .send()
        .await?;

    let body = check(response).await?;
    let items = body.as_array().cloned().unwrap_or_default();

    Ok(items.iter().filter_map(normalize_post).collect())
}

fn normalize_post(item: &Value) -> Option<SocialPost> {
    Some(SocialPost {
        id: item["id"].as_str()?.to_string(),
        text: item["text"].as_str()?.to_string(),
        username: item["author"]["userName"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        url: item["url"].as_str().unwrap_or_default().to_string(),
        created_at: item["createdAt"].as_str().unwrap_or_default().to_string(),
        is_retweet: item["isRetweet"].as_bool().unwrap_or(false),
        is_reply: item["isReply"].as_bool().unwrap_or(false),
    })
}

async fn check(response: reqwest::Response) -> Result<Value, ContentError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ContentError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_scraper_items() {
        let item = json!({
            "id": "190000001",
            "text": "Zone prediction for round 3",
            "author": { "userName": "KinchAnalytics" },
            "url": "https://x.com/KinchAnalytics/status/190000001",
            "createdAt": "2026-08-27T10:00:00.000Z",
            "isRetweet": false,
            "isReply": true
        });

        let post = normalize_post(&item).unwrap();
        assert_eq!(post.id, "190000001");
        assert_eq!(post.username, "KinchAnalytics");
        assert!(post.is_reply);
        assert!(!post.is_retweet);
    }

    #[test]
    fn skips_items_without_id_or_text() {
        assert!(normalize_post(&json!({"text": "no id"})).is_none());
        assert!(normalize_post(&json!({"id": "1"})).is_none());
    }
}
