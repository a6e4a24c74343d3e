use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config;

/// JWT claims carried by bearer tokens. Identity is only trusted after
/// signature verification; the role policy additionally re-reads the user
/// document, so a stale `role` claim cannot grant elevated access.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Role at token-issue time (informational; policy re-checks the store)
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

/// Issue a signed token for a user. Used by the identity frontend and tests.
pub fn issue_token(user_id: &str, role: &str) -> Result<String, String> {
    let security = &config::config().security;
    if security.jwt_secret.is_empty() {
        return Err("JWT secret not configured".to_string());
    }

    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: (now + Duration::hours(security.jwt_expiry_hours as i64)).timestamp(),
        iat: now.timestamp(),
        iss: security.jwt_issuer.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(security.jwt_secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to generate token: {}", e))
}

/// Validate a token and extract its claims.
pub fn validate_token(token: &str) -> Result<Claims, String> {
    let security = &config::config().security;
    if security.jwt_secret.is_empty() {
        return Err("JWT secret not configured".to_string());
    }

    let mut validation = Validation::default();
    validation.set_issuer(&[security.jwt_issuer.clone()]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(security.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| format!("Invalid token: {}", e))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret() {
        std::env::set_var("JWT_SECRET", "test-secret-for-unit-tests");
    }

    #[test]
    fn round_trips_claims() {
        with_secret();
        let token = issue_token("user-123", "admin").expect("issue");
        let claims = validate_token(&token).expect("validate");
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.iss, config::config().security.jwt_issuer);
    }

    #[test]
    fn rejects_garbage() {
        with_secret();
        assert!(validate_token("not-a-token").is_err());
    }
}
