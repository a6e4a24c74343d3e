use axum::extract::Query;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::adapters::content::{self, Tournament};

const TOURNAMENT_KEYWORDS: [&str; 7] = [
    "cup", "tournament", "fncs", "cash", "duos", "trios", "solo",
];

#[derive(Debug, Deserialize)]
pub struct TournamentParams {
    pub region: Option<String>,
}

/// GET /api/insights/tournaments
///
/// Aggregates the Epic CMS feed with the events API, keeps tournament-like
/// entries, newest start first. Each source can fail independently and a
/// total failure still answers 200 with an empty list; the frontend renders
/// whatever arrives.
pub async fn tournaments(Query(params): Query<TournamentParams>) -> Json<Value> {
    let region = params.region.unwrap_or_else(|| "NAE".to_string());
    let mut collected: Vec<Tournament> = Vec::new();

    match content::fetch_epic_news().await {
        Ok(items) => collected.extend(items),
        Err(e) => warn!("Epic CMS feed unavailable: {}", e),
    }
    match content::fetch_tournaments(&region).await {
        Ok(items) => collected.extend(items),
        Err(e) => warn!("Events API unavailable: {}", e),
    }

    let mut tournaments: Vec<Tournament> = collected
        .into_iter()
        .filter(|t| looks_like_tournament(&t.title))
        .collect();
    tournaments.sort_by(|a, b| b.start_time.cmp(&a.start_time));

    let count = tournaments.len();
    Json(json!({
        "success": true,
        "tournaments": tournaments,
        "count": count,
    }))
}

fn looks_like_tournament(title: &str) -> bool {
    let title = title.to_lowercase();
    TOURNAMENT_KEYWORDS.iter().any(|kw| title.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_filter() {
        assert!(looks_like_tournament("FNCS Major 3"));
        assert!(looks_like_tournament("Console Champions Cup"));
        assert!(looks_like_tournament("Duos Cash Cup"));
        assert!(!looks_like_tournament("New skins in the item shop"));
    }

    #[test]
    fn newest_start_first_absent_last() {
        let mut tournaments = vec![
            Tournament {
                id: "a".into(),
                title: "Cup A".into(),
                start_time: Some("2026-08-01T00:00:00.000Z".into()),
                end_time: None,
                region: None,
                poster: None,
            },
            Tournament {
                id: "b".into(),
                title: "Cup B".into(),
                start_time: None,
                end_time: None,
                region: None,
                poster: None,
            },
            Tournament {
                id: "c".into(),
                title: "Cup C".into(),
                start_time: Some("2026-08-20T00:00:00.000Z".into()),
                end_time: None,
                region: None,
                poster: None,
            },
        ];
        tournaments.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        let ids: Vec<&str> = tournaments.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }
}
