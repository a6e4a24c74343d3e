use axum::Extension;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{policy, ApiResponse, ApiResult, AuthUser};
use crate::models::User;
use crate::store::{names, Store};

/// GET /api/admin/auth
///
/// Reports whether the calling user has admin access, without gating: the
/// frontend uses this to decide which console views to render.
pub async fn check(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    let store = Store::shared().await?;
    let user = store
        .collection(names::USERS)
        .get(&auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let user: User = user.to()?;

    Ok(ApiResponse::success(json!({
        "is_admin": policy::is_elevated(&user.role, user.is_admin),
        "role": user.role,
        "email": user.email,
        "username": user.username,
    })))
}
