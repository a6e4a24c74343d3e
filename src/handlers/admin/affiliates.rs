use axum::extract::Path;
use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{policy, ApiResponse, ApiResult, AuthUser};
use crate::models::{Affiliate, AffiliateStats};
use crate::services::audit::{self, AuditEntry};
use crate::store::{names, now_timestamp, Store, StoreError};

const CONVERSIONS_LIMIT: i64 = 1000;

/// GET /api/admin/affiliates
///
/// All affiliates, newest first, each with stats derived from the
/// conversions collection.
pub async fn list(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    let affiliates = store
        .collection(names::AFFILIATES)
        .query()
        .order_desc("created_at")
        .fetch()
        .await?;

    let mut out = Vec::with_capacity(affiliates.len());
    for doc in affiliates {
        let stats = compute_stats(store, &doc.id).await?;
        let mut value = doc.data;
        value["code"] = json!(doc.id);
        value["stats"] = serde_json::to_value(&stats).map_err(StoreError::from)?;
        out.push(value);
    }

    let count = out.len();
    Ok(ApiResponse::success(json!({
        "affiliates": out,
        "count": count,
    })))
}

/// POST /api/admin/affiliates
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;

    let mut missing = Vec::new();
    for field in ["code", "name", "email"] {
        if body[field].as_str().map(str::trim).unwrap_or("").is_empty() {
            missing.push(field);
        }
    }
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(&missing.join(", ")));
    }

    let code = body["code"].as_str().unwrap_or_default().trim().to_string();
    let store = Store::shared().await?;
    let affiliates = store.collection(names::AFFILIATES);

    if affiliates.exists(&code).await? {
        return Err(ApiError::conflict("Affiliate code already exists"));
    }

    let now = now_timestamp();
    let affiliate = Affiliate {
        name: body["name"].as_str().unwrap_or_default().trim().to_string(),
        email: body["email"].as_str().unwrap_or_default().trim().to_string(),
        commission_percent: body["commission_percent"].as_f64().unwrap_or(10.0),
        active: true,
        created_at: Some(now.clone()),
        updated_at: Some(now),
    };
    let doc = serde_json::to_value(&affiliate).map_err(StoreError::from)?;

    let mut tx = store.begin().await?;
    affiliates.set_tx(&mut tx, &code, &doc).await?;
    audit::record_tx(
        store,
        &mut tx,
        AuditEntry::new("create_affiliate", &auth.user_id).metadata(json!({ "code": &code })),
    )
    .await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(ApiResponse::created(json!({
        "code": code,
        "affiliate": doc,
    })))
}

/// PATCH /api/admin/affiliates/:code
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(code): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;

    let mut patch = serde_json::Map::new();
    if let Some(pct) = body["commission_percent"].as_f64() {
        patch.insert("commission_percent".into(), json!(pct));
    }
    if let Some(active) = body["active"].as_bool() {
        patch.insert("active".into(), json!(active));
    }
    for field in ["name", "email"] {
        if let Some(value) = body[field].as_str() {
            patch.insert(field.into(), json!(value.trim()));
        }
    }
    if patch.is_empty() {
        return Err(ApiError::bad_request("No updatable fields provided"));
    }
    patch.insert("updated_at".into(), json!(now_timestamp()));

    let fields: Vec<&String> = patch.keys().collect();
    let fields = json!(fields);
    let store = Store::shared().await?;

    let mut tx = store.begin().await?;
    store
        .collection(names::AFFILIATES)
        .update_tx(&mut tx, &code, &Value::Object(patch))
        .await?;
    audit::record_tx(
        store,
        &mut tx,
        AuditEntry::new("update_affiliate", &auth.user_id)
            .metadata(json!({ "code": code, "fields": fields })),
    )
    .await?;
    tx.commit().await.map_err(StoreError::from)?;

    Ok(ApiResponse::success(json!({ "code": code })))
}

/// GET /api/admin/affiliates/:code
///
/// Recent conversions for one affiliate, newest first.
pub async fn conversions(
    Extension(auth): Extension<AuthUser>,
    Path(code): Path<String>,
) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    store.collection(names::AFFILIATES).get_required(&code).await?;

    let rows = store
        .collection(names::AFFILIATE_CONVERSIONS)
        .query()
        .eq("affiliate_code", code.as_str())
        .order_desc("timestamp")
        .limit(CONVERSIONS_LIMIT)
        .fetch()
        .await?;

    let conversions: Vec<Value> = rows.into_iter().map(|d| d.data).collect();
    let count = conversions.len();

    Ok(ApiResponse::success(json!({
        "code": code,
        "conversions": conversions,
        "count": count,
    })))
}

/// Stats are aggregated in the store, never by folding the collection here.
async fn compute_stats(store: &Store, code: &str) -> Result<AffiliateStats, ApiError> {
    let conversions = store.collection(names::AFFILIATE_CONVERSIONS);

    let (clicks, signups, paid, revenue) = futures::try_join!(
        conversions
            .query()
            .eq("affiliate_code", code)
            .eq("kind", "click")
            .count(),
        conversions
            .query()
            .eq("affiliate_code", code)
            .eq("kind", "signup")
            .count(),
        conversions
            .query()
            .eq("affiliate_code", code)
            .eq("kind", "paid")
            .count(),
        conversions
            .query()
            .eq("affiliate_code", code)
            .eq("kind", "paid")
            .sum("revenue"),
    )?;

    Ok(AffiliateStats::compute(clicks, signups, paid, revenue))
}
