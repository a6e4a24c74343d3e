use axum::Extension;
use serde_json::{json, Value};

use crate::middleware::{policy, ApiResponse, ApiResult, AuthUser};
use crate::services::ingest;
use crate::store::Store;

/// POST /api/content/ingest
///
/// Runs one ingestion cycle and reports where the records came from.
pub async fn ingest(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    policy::require_admin(&auth).await?;
    let store = Store::shared().await?;

    let outcome = ingest::run(store).await?;

    Ok(ApiResponse::success(json!({
        "source": outcome.source,
        "count": outcome.count,
        "records": outcome.records,
    })))
}
