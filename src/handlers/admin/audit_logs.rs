use axum::extract::Query;
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::middleware::{policy, ApiResponse, ApiResult, AuthUser};
use crate::store::{names, Store};

const LIST_LIMIT_CAP: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub action: Option<String>,
    pub admin_id: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/admin/audit-logs
///
/// Audit trail, newest first, optionally filtered by action or acting
/// admin, each entry joined with the admin's identity when resolvable.
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    let limit = params.limit.unwrap_or(100).clamp(1, LIST_LIMIT_CAP);

    let mut query = store.collection(names::AUDIT_LOGS).query();
    if let Some(action) = params.action.as_deref().filter(|s| !s.is_empty()) {
        query = query.eq("action", action);
    }
    if let Some(admin_id) = params.admin_id.as_deref().filter(|s| !s.is_empty()) {
        query = query.eq("admin_id", admin_id);
    }
    let rows = query.order_desc("timestamp").limit(limit).fetch().await?;

    // One user lookup per distinct admin, not per entry.
    let users = store.collection(names::USERS);
    let mut admins: HashMap<String, Value> = HashMap::new();
    let mut entries = Vec::with_capacity(rows.len());

    for doc in rows {
        let admin_id = doc.field_str("admin_id").unwrap_or_default().to_string();
        if !admin_id.is_empty() && !admins.contains_key(&admin_id) {
            let identity = users.get(&admin_id).await?.map(|u| {
                json!({
                    "email": u.field_str("email"),
                    "username": u.field_str("username"),
                })
            });
            admins.insert(admin_id.clone(), identity.unwrap_or(Value::Null));
        }

        let mut value = doc.data;
        value["id"] = json!(doc.id);
        value["admin"] = admins.get(&admin_id).cloned().unwrap_or(Value::Null);
        entries.push(value);
    }

    let count = entries.len();
    Ok(ApiResponse::success(json!({
        "entries": entries,
        "count": count,
    })))
}
