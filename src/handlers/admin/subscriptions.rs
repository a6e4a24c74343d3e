use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapters::stripe::StripeClient;
use crate::error::ApiError;
use crate::middleware::{policy, ApiResponse, ApiResult, AuthUser};
use crate::services::audit::{self, AuditEntry};
use crate::store::{names, now_timestamp, Store, StoreError};

const LIST_LIMIT_CAP: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/admin/subscriptions
///
/// Subscriptions filtered by status (`all` disables the filter), most
/// recently updated first, joined with the owning user's identity.
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    let status = params.status.unwrap_or_else(|| "active".to_string());
    let limit = params.limit.unwrap_or(100).clamp(1, LIST_LIMIT_CAP);

    let mut query = store.collection(names::SUBSCRIPTIONS).query();
    if status != "all" {
        query = query.eq("status", status.as_str());
    }
    let subscriptions = query.order_desc("updated_at").limit(limit).fetch().await?;

    let users = store.collection(names::USERS);
    let mut out = Vec::with_capacity(subscriptions.len());
    for doc in subscriptions {
        let user = users.get(&doc.id).await?.map(|u| {
            json!({
                "id": u.id,
                "email": u.field_str("email"),
                "username": u.field_str("username"),
            })
        });

        let mut value = doc.data;
        value["user_id"] = json!(doc.id);
        value["user"] = user.unwrap_or(Value::Null);
        out.push(value);
    }

    let count = out.len();
    Ok(ApiResponse::success(json!({
        "subscriptions": out,
        "status": status,
        "count": count,
    })))
}

/// POST /api/admin/subscriptions/:id
///
/// Subscription actions: `cancel` flags cancel-at-period-end in Stripe and
/// the store; `refund` refunds the latest paid invoice.
pub async fn act(
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    let subscription = store
        .collection(names::SUBSCRIPTIONS)
        .get_required(&user_id)
        .await?;

    match body["action"].as_str().unwrap_or_default() {
        "cancel" => cancel(store, &auth, &user_id, &subscription.data).await,
        "refund" => refund(store, &auth, &user_id, &subscription.data).await,
        "" => Err(ApiError::missing_fields("action")),
        other => Err(ApiError::bad_request(format!("Unknown action: {}", other))),
    }
}

async fn cancel(
    store: &Store,
    auth: &AuthUser,
    user_id: &str,
    subscription: &Value,
) -> ApiResult<Value> {
    let stripe_id = subscription["stripe_subscription_id"]
        .as_str()
        .unwrap_or_default();

    // Manually granted subscriptions have no Stripe counterpart to cancel.
    if !stripe_id.is_empty() && !stripe_id.starts_with("manual_") {
        StripeClient::from_config()?
            .set_subscription_cancellation(stripe_id, true)
            .await?;
    }

    let patch = json!({
        "cancel_at_period_end": true,
        "updated_at": now_timestamp(),
    });

    let mut tx = store.begin().await?;
    store
        .collection(names::SUBSCRIPTIONS)
        .update_tx(&mut tx, user_id, &patch)
        .await?;
    audit::record_tx(
        store,
        &mut tx,
        AuditEntry::new("cancel_subscription", &auth.user_id)
            .target(user_id)
            .metadata(json!({ "stripe_subscription_id": stripe_id })),
    )
    .await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(ApiResponse::success(json!({
        "action": "cancel",
        "cancel_at_period_end": true,
    })))
}

async fn refund(
    store: &Store,
    auth: &AuthUser,
    user_id: &str,
    subscription: &Value,
) -> ApiResult<Value> {
    let customer = subscription["stripe_customer_id"]
        .as_str()
        .unwrap_or_default();
    if customer.is_empty() {
        return Err(ApiError::not_found("No Stripe customer for this subscription"));
    }

    let stripe = StripeClient::from_config()?;
    let invoices = stripe.list_invoices(customer, 10).await?;

    let paid = invoices["data"]
        .as_array()
        .and_then(|list| {
            list.iter()
                .find(|inv| inv["status"].as_str() == Some("paid"))
        })
        .ok_or_else(|| ApiError::not_found("No invoices found"))?;

    let payment_intent = paid["payment_intent"].as_str().ok_or_else(|| {
        ApiError::not_found("Latest paid invoice has no payment intent")
    })?;

    let refund = stripe.create_refund(payment_intent).await?;

    let mut tx = store.begin().await?;
    audit::record_tx(
        store,
        &mut tx,
        AuditEntry::new("refund_subscription", &auth.user_id)
            .target(user_id)
            .metadata(json!({
                "invoice": paid["id"],
                "refund": refund["id"],
                "amount_cents": refund["amount"],
            })),
    )
    .await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(ApiResponse::success(json!({
        "action": "refund",
        "refund_id": refund["id"],
        "amount_cents": refund["amount"],
    })))
}

/// GET /api/admin/subscriptions/:id
///
/// Payment history from Stripe: invoices plus payment intents, reshaped
/// with ISO timestamps and cent amounts.
pub async fn payment_history(
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    let subscription = store
        .collection(names::SUBSCRIPTIONS)
        .get_required(&user_id)
        .await?;
    let customer = subscription
        .field_str("stripe_customer_id")
        .unwrap_or_default()
        .to_string();
    if customer.is_empty() {
        return Err(ApiError::not_found("No Stripe customer for this subscription"));
    }

    let stripe = StripeClient::from_config()?;
    let invoices = stripe.list_invoices(&customer, 20).await?;
    let intents = stripe.list_payment_intents(&customer, 20).await?;

    let invoices: Vec<Value> = invoices["data"]
        .as_array()
        .map(|list| {
            list.iter()
                .map(|inv| {
                    json!({
                        "id": inv["id"],
                        "status": inv["status"],
                        "amount_cents": inv["amount_paid"],
                        "currency": inv["currency"],
                        "created": iso_from_unix(&inv["created"]),
                        "hosted_invoice_url": inv["hosted_invoice_url"],
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let payments: Vec<Value> = intents["data"]
        .as_array()
        .map(|list| {
            list.iter()
                .map(|pi| {
                    json!({
                        "id": pi["id"],
                        "status": pi["status"],
                        "amount_cents": pi["amount"],
                        "currency": pi["currency"],
                        "created": iso_from_unix(&pi["created"]),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ApiResponse::success(json!({
        "user_id": user_id,
        "invoices": invoices,
        "payments": payments,
    })))
}

fn iso_from_unix(value: &Value) -> Value {
    value
        .as_i64()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| json!(crate::store::format_timestamp(dt)))
        .unwrap_or(Value::Null)
}
