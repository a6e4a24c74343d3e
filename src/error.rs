// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (duplicate natural key)
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable (missing credentials, store misconfiguration)
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Short label for the `error` field of the response envelope
    pub fn error_label(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "Bad request",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::NotFound(_) => "Not found",
            ApiError::Conflict(_) => "Conflict",
            ApiError::InternalServerError(_) => "Internal server error",
            ApiError::BadGateway(_) => "Bad gateway",
            ApiError::ServiceUnavailable(_) => "Service unavailable",
        }
    }

    /// Convert to JSON response body: `{error, message}`
    pub fn to_json(&self) -> Value {
        json!({
            "error": self.error_label(),
            "message": self.message(),
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn missing_fields(fields: &str) -> Self {
        ApiError::BadRequest(format!("Missing required fields: {}", fields))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<crate::store::StoreError> for ApiError {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::NotFound(msg) => ApiError::not_found(msg),
            crate::store::StoreError::ConfigMissing(key) => {
                ApiError::service_unavailable(format!("Document store not configured: set {}", key))
            }
            crate::store::StoreError::MissingRelation(rel) => ApiError::service_unavailable(
                format!("Store relation '{}' is missing; restart the server to recreate the schema", rel),
            ),
            crate::store::StoreError::InvalidField(field) => {
                tracing::error!("Invalid query field: {}", field);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            crate::store::StoreError::Serialization(e) => {
                tracing::error!("Document serialization error: {}", e);
                ApiError::internal_server_error("Failed to format response")
            }
            crate::store::StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<crate::adapters::stripe::StripeError> for ApiError {
    fn from(err: crate::adapters::stripe::StripeError) -> Self {
        match err {
            crate::adapters::stripe::StripeError::NotConfigured => ApiError::service_unavailable(
                "Stripe not configured: set STRIPE_SECRET_KEY",
            ),
            crate::adapters::stripe::StripeError::Api { status, message } => {
                tracing::error!("Stripe API error ({}): {}", status, message);
                ApiError::bad_gateway(format!("Stripe request failed: {}", message))
            }
            crate::adapters::stripe::StripeError::Http(e) => {
                tracing::error!("Stripe HTTP error: {}", e);
                ApiError::bad_gateway("Stripe unreachable")
            }
        }
    }
}

impl From<crate::adapters::email::EmailError> for ApiError {
    fn from(err: crate::adapters::email::EmailError) -> Self {
        match err {
            crate::adapters::email::EmailError::NotConfigured => {
                ApiError::service_unavailable("Email not configured: set EMAIL_API_KEY")
            }
            crate::adapters::email::EmailError::Api { status, message } => {
                tracing::error!("Email API error ({}): {}", status, message);
                ApiError::bad_gateway("Email delivery failed")
            }
            crate::adapters::email::EmailError::Http(e) => {
                tracing::error!("Email HTTP error: {}", e);
                ApiError::bad_gateway("Email service unreachable")
            }
        }
    }
}

impl From<crate::services::fallback::FallbackError> for ApiError {
    fn from(err: crate::services::fallback::FallbackError) -> Self {
        ApiError::service_unavailable(err.to_string())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shape() {
        let err = ApiError::forbidden("Admin access required");
        let body = err.to_json();
        assert_eq!(body["error"], "Forbidden");
        assert_eq!(body["message"], "Admin access required");
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::missing_fields("code, name").status_code(), 400);
        assert_eq!(ApiError::unauthorized("x").status_code(), 401);
        assert_eq!(ApiError::not_found("x").status_code(), 404);
        assert_eq!(ApiError::conflict("x").status_code(), 409);
        assert_eq!(ApiError::service_unavailable("x").status_code(), 503);
    }

    #[test]
    fn missing_relation_maps_to_degraded_store() {
        let err: ApiError =
            crate::store::StoreError::MissingRelation("documents".to_string()).into();
        assert_eq!(err.status_code(), 503);

        let message = err.to_json()["message"].as_str().unwrap().to_string();
        assert!(message.contains("documents"));
        assert!(message.contains("restart the server"));
    }
}
