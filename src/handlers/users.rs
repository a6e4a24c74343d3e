use axum::{Extension, Json};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::adapters::stripe::StripeClient;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Subscription, User};
use crate::store::{names, now_timestamp, Store, StoreError};

/// POST /api/users
///
/// Seed the documents a fresh account needs. Idempotent: an existing user
/// reports `created: false`. Stripe customer creation is best-effort; a
/// billing outage must not block signups.
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let user_id = body["user_id"].as_str().map(str::trim).unwrap_or("");
    if user_id.is_empty() {
        return Err(ApiError::missing_fields("user_id"));
    }
    if user_id != auth.user_id {
        return Err(ApiError::forbidden("Cannot create a different user"));
    }

    let store = Store::shared().await?;
    let users = store.collection(names::USERS);

    if users.exists(user_id).await? {
        return Ok(ApiResponse::success(json!({
            "user_id": user_id,
            "created": false,
        })));
    }

    let email = body["email"].as_str().map(str::trim).unwrap_or("");
    let stripe_customer_id = create_stripe_customer(email, user_id).await;

    let now = now_timestamp();
    let user = User {
        email: email.to_string(),
        username: body["username"].as_str().unwrap_or("").to_string(),
        role: "user".to_string(),
        is_admin: false,
        is_premium: false,
        active_plan_id: "free".to_string(),
        stripe_customer_id: stripe_customer_id.clone(),
        created_at: Some(now.clone()),
        last_login: Some(now.clone()),
    };
    let subscription = Subscription {
        plan_id: "free".to_string(),
        status: "active".to_string(),
        stripe_customer_id,
        stripe_subscription_id: String::new(),
        current_period_start: None,
        current_period_end: None,
        cancel_at_period_end: false,
        updated_at: Some(now),
    };
    let user_doc = serde_json::to_value(&user).map_err(StoreError::from)?;
    let subscription_doc = serde_json::to_value(&subscription).map_err(StoreError::from)?;

    let mut tx = store.begin().await?;
    users.set_tx(&mut tx, user_id, &user_doc).await?;
    store
        .collection(names::SUBSCRIPTIONS)
        .set_tx(&mut tx, user_id, &subscription_doc)
        .await?;
    tx.commit().await.map_err(StoreError::from)?;

    info!("Created user {}", user_id);
    Ok(ApiResponse::created(json!({
        "user_id": user_id,
        "created": true,
    })))
}

async fn create_stripe_customer(email: &str, user_id: &str) -> String {
    if email.is_empty() {
        return String::new();
    }
    let client = match StripeClient::from_config() {
        Ok(client) => client,
        Err(_) => return String::new(),
    };
    match client.create_customer(email, user_id).await {
        Ok(customer) => customer["id"].as_str().unwrap_or_default().to_string(),
        Err(e) => {
            warn!("Stripe customer creation failed for {}: {}", user_id, e);
            String::new()
        }
    }
}

/// POST /api/users/delete-account
///
/// Remove the calling user's documents in one transaction: user record,
/// subscription, usage counters, and chat history.
pub async fn delete_account(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    let store = Store::shared().await?;
    let user_id = auth.user_id.as_str();

    store
        .collection(names::USERS)
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut tx = store.begin().await?;
    for collection in [
        names::USERS,
        names::SUBSCRIPTIONS,
        names::USAGE,
        names::CHAT_HISTORY,
    ] {
        store
            .collection(collection)
            .delete_tx(&mut tx, user_id)
            .await?;
    }
    tx.commit().await.map_err(StoreError::from)?;

    info!("Deleted account {}", user_id);
    Ok(ApiResponse::success(json!({
        "user_id": user_id,
        "deleted": true,
    })))
}
