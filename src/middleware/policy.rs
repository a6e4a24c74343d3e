use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::store::{names, Document, Store};

/// Centralized role policy. Every admin handler goes through here instead of
/// re-implementing the role check.
///
/// The check always re-reads the user document: token claims prove identity,
/// the store decides authorization. Fail closed: an absent record or any
/// store failure is "not authorized".

const ELEVATED_ROLES: [&str; 2] = ["owner", "admin"];
pub const ALL_ROLES: [&str; 5] = ["owner", "admin", "support", "readonly", "user"];

/// Elevated iff role is owner/admin or the explicit admin flag is set.
pub fn is_elevated(role: &str, is_admin_flag: bool) -> bool {
    ELEVATED_ROLES.contains(&role) || is_admin_flag
}

pub async fn require_admin(caller: &AuthUser) -> Result<Document, ApiError> {
    let user = fetch_user(&caller.user_id).await?;
    let role = user.field_str("role").unwrap_or("user");
    let is_admin = user.field_bool("is_admin").unwrap_or(false);

    if is_elevated(role, is_admin) {
        Ok(user)
    } else {
        Err(ApiError::forbidden("Admin access required"))
    }
}

/// Owner only; used for role management.
pub async fn require_owner(caller: &AuthUser) -> Result<Document, ApiError> {
    let user = fetch_user(&caller.user_id).await?;
    if user.field_str("role") == Some("owner") {
        Ok(user)
    } else {
        Err(ApiError::forbidden("Owner access required"))
    }
}

async fn fetch_user(user_id: &str) -> Result<Document, ApiError> {
    // Any failure on this path reads as "no access", never as a 500.
    let store = Store::shared()
        .await
        .map_err(|e| forbidden_on_error("store unavailable", &e.to_string()))?;

    match store.collection(names::USERS).get(user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ApiError::forbidden("Admin access required")),
        Err(e) => Err(forbidden_on_error("user lookup failed", &e.to_string())),
    }
}

fn forbidden_on_error(context: &str, detail: &str) -> ApiError {
    tracing::warn!("Authorization check failed ({}): {}", context, detail);
    ApiError::forbidden("Admin access required")
}

pub fn is_valid_role(role: &str) -> bool {
    ALL_ROLES.contains(&role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_validity() {
        for role in ALL_ROLES {
            assert!(is_valid_role(role));
        }
        assert!(!is_valid_role("superuser"));
        assert!(!is_valid_role(""));
        assert!(!is_valid_role("Admin"));
    }
}
