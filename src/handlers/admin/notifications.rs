use axum::extract::Query;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::adapters::email::{EmailClient, OutboundEmail};
use crate::error::ApiError;
use crate::middleware::{policy, ApiResponse, ApiResult, AuthUser};
use crate::models::Notification;
use crate::services::audit::{self, AuditEntry};
use crate::store::{names, now_timestamp, Store, StoreError};

const KINDS: [&str; 3] = ["push", "email", "account"];
const HISTORY_LIMIT_CAP: i64 = 200;

/// POST /api/admin/notifications
///
/// Queue a notification for one user or everyone. Email notifications are
/// delivered best-effort; the record is stored either way.
pub async fn send(
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;

    let kind = body["kind"].as_str().map(str::trim).unwrap_or("");
    let message = body["message"].as_str().map(str::trim).unwrap_or("");
    if kind.is_empty() || message.is_empty() {
        return Err(ApiError::missing_fields("kind, message"));
    }
    if !KINDS.contains(&kind) {
        return Err(ApiError::bad_request(format!("Unknown kind: {}", kind)));
    }

    let target_user_id = body["target_user_id"].as_str().map(str::trim).filter(|s| !s.is_empty());
    let to_all = body["to_all"].as_bool().unwrap_or(false);
    if target_user_id.is_none() && !to_all {
        return Err(ApiError::bad_request("Provide target_user_id or to_all"));
    }

    let store = Store::shared().await?;

    let target_email = match target_user_id {
        Some(user_id) => {
            let user = store
                .collection(names::USERS)
                .get(user_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Target user not found"))?;
            user.field_str("email").map(String::from)
        }
        None => None,
    };

    let subject = body["subject"].as_str().unwrap_or("");
    let status = if kind == "email" {
        deliver_email(target_email.as_deref(), subject, message).await
    } else {
        "queued"
    };

    let notification = Notification {
        kind: kind.to_string(),
        subject: body["subject"].as_str().map(String::from),
        message: message.to_string(),
        target_user_id: target_user_id.map(String::from),
        to_all,
        created_by: auth.user_id.clone(),
        status: status.to_string(),
        created_at: Some(now_timestamp()),
    };
    let doc = serde_json::to_value(&notification).map_err(StoreError::from)?;

    let mut tx = store.begin().await?;
    let id = store
        .collection(names::NOTIFICATIONS)
        .add_tx(&mut tx, &doc)
        .await?;
    audit::record_tx(
        store,
        &mut tx,
        AuditEntry::new("send_notification", &auth.user_id).metadata(json!({
            "notification_id": &id,
            "kind": kind,
            "to_all": to_all,
        })),
    )
    .await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(ApiResponse::created(json!({
        "notification_id": id,
        "status": status,
    })))
}

/// Delivery never blocks recording: failures come back as a status string.
async fn deliver_email(to: Option<&str>, subject: &str, message: &str) -> &'static str {
    let Some(to) = to else {
        warn!("Email notification has no recipient address");
        return "failed";
    };

    let client = match EmailClient::from_config() {
        Ok(client) => client,
        Err(e) => {
            warn!("Email notification not sent: {}", e);
            return "failed";
        }
    };

    let email = OutboundEmail {
        to: to.to_string(),
        subject: subject.to_string(),
        html: message.to_string(),
    };

    match client.send(&email).await {
        Ok(()) => "sent",
        Err(e) => {
            warn!("Email notification delivery failed: {}", e);
            "failed"
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

/// GET /api/admin/notifications
pub async fn history(
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    let limit = params.limit.unwrap_or(50).clamp(1, HISTORY_LIMIT_CAP);
    let rows = store
        .collection(names::NOTIFICATIONS)
        .query()
        .order_desc("created_at")
        .limit(limit)
        .fetch()
        .await?;

    let notifications: Vec<Value> = rows
        .into_iter()
        .map(|doc| {
            let mut value = doc.data;
            value["id"] = json!(doc.id);
            value
        })
        .collect();

    let count = notifications.len();
    Ok(ApiResponse::success(json!({
        "notifications": notifications,
        "count": count,
    })))
}
