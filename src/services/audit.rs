use serde_json::Value;
use sqlx::PgConnection;

use crate::models::AuditLogEntry;
use crate::store::{names, now_timestamp, Store, StoreError};

/// One administrative action, recorded append-only alongside the mutation it
/// describes. Callers build the entry, then write it inside the same
/// transaction as the mutation so the two commit or roll back together.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    action: String,
    admin_id: String,
    target_user_id: Option<String>,
    metadata: Value,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, admin_id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            admin_id: admin_id.into(),
            target_user_id: None,
            metadata: Value::Null,
        }
    }

    pub fn target(mut self, user_id: impl Into<String>) -> Self {
        self.target_user_id = Some(user_id.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    fn into_document(self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(AuditLogEntry {
            action: self.action,
            admin_id: self.admin_id,
            target_user_id: self.target_user_id,
            timestamp: now_timestamp(),
            metadata: self.metadata,
        })
    }
}

/// Append the entry to the audit log within the caller's transaction.
pub async fn record_tx(
    store: &Store,
    tx: &mut PgConnection,
    entry: AuditEntry,
) -> Result<String, StoreError> {
    let doc = entry.into_document()?;
    store.collection(names::AUDIT_LOGS).add_tx(tx, &doc).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_document_shape() {
        let doc = AuditEntry::new("promo_code_created", "admin-1")
            .target("user-9")
            .metadata(json!({"code": "LAUNCH20"}))
            .into_document()
            .unwrap();

        assert_eq!(doc["action"], "promo_code_created");
        assert_eq!(doc["admin_id"], "admin-1");
        assert_eq!(doc["target_user_id"], "user-9");
        assert_eq!(doc["metadata"]["code"], "LAUNCH20");
        assert!(doc["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn entry_without_target() {
        let doc = AuditEntry::new("notification_sent", "admin-1")
            .into_document()
            .unwrap();
        assert!(doc["target_user_id"].is_null());
        assert!(doc["metadata"].is_null());
    }
}
