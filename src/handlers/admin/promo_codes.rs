use axum::{Extension, Json};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{policy, ApiResponse, ApiResult, AuthUser};
use crate::models::PromoCode;
use crate::services::audit::{self, AuditEntry};
use crate::store::{format_timestamp, names, now_timestamp, Store, StoreError};

/// GET /api/admin/promo-codes
///
/// All promo codes with their redemption counts and expiry status.
pub async fn list(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    let codes = store
        .collection(names::PROMO_CODES)
        .query()
        .order_desc("created_at")
        .fetch()
        .await?;

    let now = now_timestamp();
    let mut out = Vec::with_capacity(codes.len());
    for doc in codes {
        let redemptions = store
            .collection(names::PROMO_REDEMPTIONS)
            .query()
            .eq("code", doc.id.as_str())
            .count()
            .await?;

        let is_expired = doc
            .field_str("expires_at")
            .map(|expires| expires < now.as_str())
            .unwrap_or(false);

        let mut value = doc.data;
        value["code"] = json!(doc.id);
        value["redemptions"] = json!(redemptions);
        value["is_expired"] = json!(is_expired);
        out.push(value);
    }

    let count = out.len();
    Ok(ApiResponse::success(json!({
        "promo_codes": out,
        "count": count,
    })))
}

/// POST /api/admin/promo-codes
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;

    let code = body["code"].as_str().map(str::trim).unwrap_or_default();
    let Some(discount) = body["discount_percent"].as_f64() else {
        return Err(ApiError::missing_fields("code, discount_percent"));
    };
    if code.is_empty() {
        return Err(ApiError::missing_fields("code, discount_percent"));
    }
    let code = code.to_string();
    let expires_at = expiry_from(&body)?;

    let store = Store::shared().await?;
    let codes = store.collection(names::PROMO_CODES);

    if codes.exists(&code).await? {
        return Err(ApiError::conflict("Promo code already exists"));
    }

    let now = now_timestamp();
    let promo = PromoCode {
        discount_percent: discount,
        duration: body["duration"].as_str().unwrap_or("1month").to_string(),
        max_redemptions: body["max_redemptions"].as_i64(),
        active: true,
        expires_at,
        created_at: Some(now.clone()),
        updated_at: Some(now),
    };
    let doc = serde_json::to_value(&promo).map_err(StoreError::from)?;

    let mut tx = store.begin().await?;
    codes.set_tx(&mut tx, &code, &doc).await?;
    audit::record_tx(
        store,
        &mut tx,
        AuditEntry::new("create_promo_code", &auth.user_id).metadata(json!({ "code": &code })),
    )
    .await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(ApiResponse::created(json!({
        "code": code,
        "promo_code": doc,
    })))
}

/// Expiry resolution: explicit `expires_at` wins, then `duration` as
/// "1month", "forever", or a day count.
fn expiry_from(body: &Value) -> Result<Option<String>, ApiError> {
    if let Some(explicit) = body["expires_at"].as_str() {
        return Ok(Some(explicit.to_string()));
    }

    match body["duration"].as_str().unwrap_or("1month") {
        "forever" => Ok(None),
        "1month" => Ok(Some(format_timestamp(Utc::now() + Duration::days(30)))),
        other => {
            let days: i64 = other
                .parse()
                .map_err(|_| ApiError::bad_request("Invalid duration"))?;
            Ok(Some(format_timestamp(Utc::now() + Duration::days(days))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_expiry_wins() {
        let body = json!({"expires_at": "2026-12-01T00:00:00.000Z", "duration": "forever"});
        assert_eq!(
            expiry_from(&body).unwrap(),
            Some("2026-12-01T00:00:00.000Z".to_string())
        );
    }

    #[test]
    fn forever_has_no_expiry() {
        assert_eq!(expiry_from(&json!({"duration": "forever"})).unwrap(), None);
    }

    #[test]
    fn day_count_duration() {
        let expiry = expiry_from(&json!({"duration": "7"})).unwrap().unwrap();
        let in_six = format_timestamp(Utc::now() + Duration::days(6));
        let in_eight = format_timestamp(Utc::now() + Duration::days(8));
        assert!(expiry > in_six && expiry < in_eight);
    }

    #[test]
    fn invalid_duration_rejected() {
        assert!(expiry_from(&json!({"duration": "soon"})).is_err());
    }

    #[test]
    fn default_duration_is_one_month() {
        let expiry = expiry_from(&json!({})).unwrap().unwrap();
        let in_29 = format_timestamp(Utc::now() + Duration::days(29));
        assert!(expiry > in_29);
    }
}
