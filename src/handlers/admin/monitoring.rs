use axum::extract::Query;
use axum::Extension;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::handlers::admin::analytics;
use crate::middleware::{policy, ApiResponse, ApiResult, AuthUser};
use crate::store::{format_timestamp, names, Store};

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub range: Option<String>,
}

/// GET /api/admin/monitoring/stats
///
/// Operational snapshot over a time range: 1h, 24h (default), 7d, or 30d.
pub async fn stats(
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<StatsParams>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    let range = params.range.as_deref().unwrap_or("24h");
    let window = match range {
        "1h" => Duration::hours(1),
        "24h" => Duration::hours(24),
        "7d" => Duration::days(7),
        "30d" => Duration::days(30),
        _ => Duration::hours(24),
    };

    let now = Utc::now();
    let since = format_timestamp(now - window);
    let five_min_ago = format_timestamp(now - Duration::minutes(5));

    let users = store.collection(names::USERS);
    let active_users = users
        .query()
        .gte("last_login", five_min_ago)
        .count()
        .await?;
    let total_users = users.query().count().await?;
    let recent_signups = users
        .query()
        .gte("created_at", since.clone())
        .count()
        .await?;

    let active_subscriptions = analytics::count_paying(store).await?;
    let estimated_revenue = analytics::estimate_mrr(store).await?;

    // Error counting is observability, not correctness; failures read as 0.
    let errors = match store
        .collection(names::ERROR_LOGS)
        .query()
        .gte("timestamp", since)
        .count()
        .await
    {
        Ok(n) => n,
        Err(e) => {
            warn!("Error-log count failed: {}", e);
            0
        }
    };

    Ok(ApiResponse::success(json!({
        "range": range,
        "active_users": active_users,
        "total_users": total_users,
        "recent_signups": recent_signups,
        "active_subscriptions": active_subscriptions,
        "errors": errors,
        "estimated_revenue": estimated_revenue,
    })))
}
