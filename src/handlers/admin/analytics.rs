use axum::Extension;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::config::config;
use crate::error::ApiError;
use crate::middleware::{policy, ApiResponse, ApiResult, AuthUser};
use crate::models::round2;
use crate::store::{format_timestamp, names, now_timestamp, Store};

pub(crate) const PAID_PLAN_IDS: [&str; 3] = ["pro", "pro_monthly", "pro_yearly"];

/// GET /api/admin/analytics/dashboard
///
/// Headline numbers for the admin console: signups today and per day over
/// the last week, paying subscriptions, and estimated MRR.
pub async fn dashboard(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;
    let users = store.collection(names::USERS);

    let today = now_timestamp()[..10].to_string();
    let week_ago = format_timestamp(Utc::now() - Duration::days(7));

    let signups_today = users.query().prefix("created_at", &today).count().await?;
    let per_day = users
        .query()
        .gte("created_at", week_ago)
        .count_per_day("created_at")
        .await?;
    let signups_per_day: Vec<Value> = per_day
        .into_iter()
        .map(|(date, count)| json!({ "date": date, "count": count }))
        .collect();

    let active_subscriptions = count_paying(store).await?;
    let mrr = estimate_mrr(store).await?;

    Ok(ApiResponse::success(json!({
        "signups_today": signups_today,
        "signups_per_day": signups_per_day,
        "active_subscriptions": active_subscriptions,
        "mrr": mrr,
    })))
}

pub(crate) async fn count_paying(store: &Store) -> Result<i64, ApiError> {
    Ok(store
        .collection(names::SUBSCRIPTIONS)
        .query()
        .eq("status", "active")
        .in_any("plan_id", PAID_PLAN_IDS.iter().map(|s| s.to_string()).collect())
        .count()
        .await?)
}

/// MRR from plan pricing config: yearly revenue contributes one twelfth per
/// month; everything else paying bills monthly.
pub(crate) async fn estimate_mrr(store: &Store) -> Result<f64, ApiError> {
    let subscriptions = store.collection(names::SUBSCRIPTIONS);

    let yearly = subscriptions
        .query()
        .eq("status", "active")
        .eq("plan_id", "pro_yearly")
        .count()
        .await?;
    let paying = count_paying(store).await?;
    let monthly = (paying - yearly).max(0);

    let plans = &config().plans;
    Ok(round2(
        monthly as f64 * plans.monthly_dollars() + yearly as f64 * plans.yearly_dollars() / 12.0,
    ))
}
