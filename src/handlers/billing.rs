use axum::extract::Path;
use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::adapters::stripe::StripeClient;
use crate::config::config;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::store::{names, Store};

/// POST /api/billing/payment-intent
///
/// Payment intent for the pro plan; amounts come from plan pricing config,
/// never from the request.
pub async fn create_payment_intent(
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let plans = &config().plans;
    let (plan_id, amount_cents) = match body["plan"].as_str().unwrap_or("monthly") {
        "monthly" => ("pro_monthly", plans.pro_monthly_cents),
        "yearly" => ("pro_yearly", plans.pro_yearly_cents),
        other => {
            return Err(ApiError::bad_request(format!("Unknown plan: {}", other)));
        }
    };

    let stripe = StripeClient::from_config()?;
    let intent = stripe
        .create_payment_intent(amount_cents, "usd", &auth.user_id, plan_id)
        .await?;

    Ok(ApiResponse::success(json!({
        "client_secret": intent["client_secret"],
        "amount_cents": amount_cents,
        "plan": plan_id,
    })))
}

/// GET /api/billing/session/:id
///
/// Checkout session lookup for payment verification, with line items
/// expanded and reshaped.
pub async fn checkout_session(
    Extension(_auth): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    let stripe = StripeClient::from_config()?;
    let session = stripe.retrieve_checkout_session(&session_id).await?;

    let line_items: Vec<Value> = session["line_items"]["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    json!({
                        "description": item["description"],
                        "amount_cents": item["amount_total"],
                        "quantity": item["quantity"],
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ApiResponse::success(json!({
        "id": session["id"],
        "status": session["status"],
        "payment_status": session["payment_status"],
        "amount_cents": session["amount_total"],
        "currency": session["currency"],
        "customer_email": session["customer_details"]["email"],
        "line_items": line_items,
    })))
}

/// POST /api/billing/portal
///
/// Billing-portal session for the calling user's Stripe customer.
pub async fn portal(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    let store = Store::shared().await?;
    let user = store
        .collection(names::USERS)
        .get(&auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let customer = user.field_str("stripe_customer_id").unwrap_or_default();
    if customer.is_empty() {
        return Err(ApiError::not_found("No Stripe customer for this user"));
    }

    let stripe = StripeClient::from_config()?;
    let session = stripe
        .create_portal_session(customer, &config().stripe.portal_return_url)
        .await?;

    Ok(ApiResponse::success(json!({
        "url": session["url"],
    })))
}
