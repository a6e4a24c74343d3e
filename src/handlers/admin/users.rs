use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{policy, ApiResponse, ApiResult, AuthUser};
use crate::services::audit::{self, AuditEntry};
use crate::store::{format_timestamp, names, now_timestamp, Document, Store, StoreError};

const SEARCH_LIMIT_CAP: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

/// GET /api/admin/users/search
///
/// Empty query lists recent signups; an exact id wins outright; queries
/// containing `@` run a lexicographic prefix search on the email field.
pub async fn search(
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;
    let users = store.collection(names::USERS);

    let limit = params.limit.unwrap_or(20).clamp(1, SEARCH_LIMIT_CAP);
    let q = params.q.trim();

    let matches: Vec<Document> = if q.is_empty() {
        users.query().order_desc("created_at").limit(limit).fetch().await?
    } else if let Some(exact) = users.get(q).await? {
        vec![exact]
    } else if q.contains('@') {
        users
            .query()
            .prefix("email", q)
            .order_asc("email")
            .limit(limit)
            .fetch()
            .await?
    } else {
        Vec::new()
    };

    let users: Vec<Value> = matches
        .into_iter()
        .map(|doc| {
            let mut value = doc.data;
            value["id"] = json!(doc.id);
            value
        })
        .collect();

    let count = users.len();
    Ok(ApiResponse::success(json!({
        "users": users,
        "count": count,
        "query": q,
    })))
}

/// GET /api/admin/users/:id
///
/// User detail with subscription, usage, and abuse records; sections the
/// user has no data for come back null.
pub async fn detail(
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    let user = store
        .collection(names::USERS)
        .get(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let subscriptions = store.collection(names::SUBSCRIPTIONS);
    let usage_records = store.collection(names::USAGE);
    let abuse_records = store.collection(names::ABUSE);
    let (subscription, usage, abuse) = futures::try_join!(
        subscriptions.get(&user_id),
        usage_records.get(&user_id),
        abuse_records.get(&user_id),
    )?;

    Ok(ApiResponse::success(json!({
        "id": user.id,
        "user": user.data,
        "subscription": subscription.map(|d| d.data),
        "usage": usage.map(|d| d.data),
        "abuse": abuse.map(|d| d.data),
    })))
}

/// PATCH /api/admin/users/:id
///
/// Admin actions on one user, dispatched on the `action` field. Every
/// branch writes its audit entry in the same transaction as the mutation.
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    store
        .collection(names::USERS)
        .get(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let action = body["action"].as_str().unwrap_or_default();
    match action {
        "ban" => ban(store, &auth, &user_id, &body).await,
        "unban" => unban(store, &auth, &user_id).await,
        "update_subscription" => update_subscription(store, &auth, &user_id, &body).await,
        "grant_premium" => grant_premium(store, &auth, &user_id, &body).await,
        "" => Err(ApiError::missing_fields("action")),
        other => Err(ApiError::bad_request(format!("Unknown action: {}", other))),
    }
}

async fn ban(
    store: &Store,
    auth: &AuthUser,
    user_id: &str,
    body: &Value,
) -> ApiResult<Value> {
    let days = body["days"].as_i64().unwrap_or(7);
    let banned_until = format_timestamp(Utc::now() + Duration::days(days));
    let doc = json!({
        "banned_until": &banned_until,
        "last_flag_at": now_timestamp(),
    });

    let mut tx = store.begin().await?;
    store.collection(names::ABUSE).set_tx(&mut tx, user_id, &doc).await?;
    audit::record_tx(
        store,
        &mut tx,
        AuditEntry::new("ban_user", &auth.user_id)
            .target(user_id)
            .metadata(json!({ "days": days, "banned_until": &banned_until })),
    )
    .await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(ApiResponse::success(json!({
        "action": "ban",
        "banned_until": banned_until,
    })))
}

async fn unban(store: &Store, auth: &AuthUser, user_id: &str) -> ApiResult<Value> {
    let mut tx = store.begin().await?;
    store.collection(names::ABUSE).delete_tx(&mut tx, user_id).await?;
    audit::record_tx(
        store,
        &mut tx,
        AuditEntry::new("unban_user", &auth.user_id).target(user_id),
    )
    .await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(ApiResponse::success(json!({ "action": "unban" })))
}

async fn update_subscription(
    store: &Store,
    auth: &AuthUser,
    user_id: &str,
    body: &Value,
) -> ApiResult<Value> {
    let mut patch = match body["updates"].clone() {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        _ => return Err(ApiError::bad_request("updates must be an object")),
    };

    if let Some(extend_days) = body["extend_days"].as_i64() {
        let subscription = store
            .collection(names::SUBSCRIPTIONS)
            .get(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription not found"))?;

        let current_end = subscription
            .field_str("current_period_end")
            .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            .unwrap_or_else(Utc::now);
        let extended = current_end.max(Utc::now()) + Duration::days(extend_days);
        patch.insert("current_period_end".into(), json!(format_timestamp(extended)));
    }

    if patch.is_empty() {
        return Err(ApiError::bad_request("No subscription changes provided"));
    }
    patch.insert("updated_at".into(), json!(now_timestamp()));

    let changed: Vec<String> = patch.keys().cloned().collect();
    let patch = Value::Object(patch);

    let mut tx = store.begin().await?;
    store
        .collection(names::SUBSCRIPTIONS)
        .update_tx(&mut tx, user_id, &patch)
        .await?;
    audit::record_tx(
        store,
        &mut tx,
        AuditEntry::new("update_subscription", &auth.user_id)
            .target(user_id)
            .metadata(json!({ "fields": changed })),
    )
    .await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(ApiResponse::success(json!({
        "action": "update_subscription",
        "subscription": patch,
    })))
}

async fn grant_premium(
    store: &Store,
    auth: &AuthUser,
    user_id: &str,
    body: &Value,
) -> ApiResult<Value> {
    let days = body["days"].as_i64().unwrap_or(30);
    let now = Utc::now();
    let period_end = format_timestamp(now + Duration::days(days));

    let user_patch = json!({
        "is_premium": true,
        "active_plan_id": "pro",
    });
    let subscription = json!({
        "plan_id": "pro",
        "status": "active",
        "stripe_subscription_id": format!("manual_{}", now.timestamp()),
        "current_period_start": format_timestamp(now),
        "current_period_end": &period_end,
        "cancel_at_period_end": false,
        "updated_at": now_timestamp(),
    });

    let mut tx = store.begin().await?;
    store
        .collection(names::USERS)
        .merge_tx(&mut tx, user_id, &user_patch)
        .await?;
    store
        .collection(names::SUBSCRIPTIONS)
        .set_tx(&mut tx, user_id, &subscription)
        .await?;
    audit::record_tx(
        store,
        &mut tx,
        AuditEntry::new("grant_premium", &auth.user_id)
            .target(user_id)
            .metadata(json!({ "days": days })),
    )
    .await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(ApiResponse::success(json!({
        "action": "grant_premium",
        "current_period_end": period_end,
    })))
}
