use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{policy, ApiResponse, ApiResult, AuthUser};
use crate::services::audit::{self, AuditEntry};
use crate::store::{names, now_timestamp, Store, StoreError};

/// GET /api/admin/roles (owner only)
///
/// Every user holding an elevated or staff role.
pub async fn list(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    policy::require_owner(&auth).await?;
    let store = Store::shared().await?;

    let staff_roles = vec![
        "owner".to_string(),
        "admin".to_string(),
        "support".to_string(),
        "readonly".to_string(),
    ];

    let users = store
        .collection(names::USERS)
        .query()
        .in_any("role", staff_roles)
        .fetch()
        .await?;

    let users: Vec<Value> = users
        .into_iter()
        .map(|doc| {
            json!({
                "id": doc.id,
                "email": doc.field_str("email"),
                "username": doc.field_str("username"),
                "role": doc.field_str("role").unwrap_or("user"),
                "is_admin": doc.field_bool("is_admin").unwrap_or(false),
            })
        })
        .collect();

    let count = users.len();
    Ok(ApiResponse::success(json!({
        "users": users,
        "count": count,
    })))
}

/// PATCH /api/admin/roles (owner only)
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    policy::require_owner(&auth).await?;

    let target = body["target_user_id"].as_str().map(str::trim).unwrap_or("");
    let role = body["role"].as_str().map(str::trim).unwrap_or("");
    if target.is_empty() || role.is_empty() {
        return Err(ApiError::missing_fields("target_user_id, role"));
    }
    if !policy::is_valid_role(role) {
        return Err(ApiError::bad_request("Invalid role"));
    }
    if target == auth.user_id {
        return Err(ApiError::bad_request("Owners cannot change their own role"));
    }

    let store = Store::shared().await?;
    let patch = json!({
        "role": role,
        "is_admin": role != "user",
        "updated_at": now_timestamp(),
    });

    let mut tx = store.begin().await?;
    store
        .collection(names::USERS)
        .update_tx(&mut tx, target, &patch)
        .await?;
    audit::record_tx(
        store,
        &mut tx,
        AuditEntry::new("update_user_role", &auth.user_id)
            .target(target)
            .metadata(json!({ "role": role })),
    )
    .await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(ApiResponse::success(json!({
        "target_user_id": target,
        "role": role,
    })))
}
