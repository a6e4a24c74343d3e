use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub security: SecurityConfig,
    pub stripe: StripeConfig,
    pub email: EmailConfig,
    pub content: ContentConfig,
    pub ingestion: IngestionConfig,
    pub plans: PlanConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
}

/// Stripe is optional at startup; endpoints that need it return 503 with a
/// remediation hint when the secret key is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub portal_return_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub sender_name: String,
    pub sender_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    pub fortnite_api_key: Option<String>,
    pub apify_token: Option<String>,
    /// Social accounts scraped by the ingestion pipeline.
    pub ingest_handles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Where the last known-good ingestion result is persisted.
    pub fallback_cache_path: String,
    /// Maximum age (hours) before the fallback cache is considered unusable.
    pub fallback_max_age_hours: i64,
}

/// Plan pricing in cents. Revenue/MRR estimates and payment intents all read
/// from here so the numbers cannot drift between handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    pub pro_monthly_cents: i64,
    pub pro_yearly_cents: i64,
    pub pro_name: String,
    pub pro_description: String,
}

impl PlanConfig {
    pub fn monthly_dollars(&self) -> f64 {
        self.pro_monthly_cents as f64 / 100.0
    }

    pub fn yearly_dollars(&self) -> f64 {
        self.pro_yearly_cents as f64 / 100.0
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        Self {
            environment,
            security: SecurityConfig {
                jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
                jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "pathgen-api".to_string()),
                jwt_expiry_hours: env_parse("JWT_EXPIRY_HOURS", 24),
                cors_origins: env::var("CORS_ORIGINS")
                    .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_default(),
            },
            stripe: StripeConfig {
                secret_key: env::var("STRIPE_SECRET_KEY").ok().filter(|v| !v.is_empty()),
                portal_return_url: env::var("STRIPE_PORTAL_RETURN_URL")
                    .unwrap_or_else(|_| "https://www.pathgen.dev/chat.html".to_string()),
            },
            email: EmailConfig {
                api_key: env::var("EMAIL_API_KEY").ok().filter(|v| !v.is_empty()),
                sender_name: env::var("EMAIL_SENDER_NAME").unwrap_or_else(|_| "PathGen".to_string()),
                sender_address: env::var("EMAIL_SENDER_ADDRESS")
                    .unwrap_or_else(|_| "noreply@pathgen.dev".to_string()),
            },
            content: ContentConfig {
                fortnite_api_key: env::var("FORTNITE_API_KEY").ok().filter(|v| !v.is_empty()),
                apify_token: env::var("APIFY_TOKEN").ok().filter(|v| !v.is_empty()),
                ingest_handles: env::var("INGEST_HANDLES")
                    .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_else(|_| {
                        vec!["KinchAnalytics".to_string(), "osirion_gg".to_string()]
                    }),
            },
            ingestion: IngestionConfig {
                fallback_cache_path: env::var("FALLBACK_CACHE_PATH")
                    .unwrap_or_else(|_| "data/ingestion/fallback-cache.json".to_string()),
                fallback_max_age_hours: env_parse("FALLBACK_MAX_AGE_HOURS", 24),
            },
            plans: PlanConfig {
                pro_monthly_cents: env_parse("PLAN_PRO_MONTHLY_CENTS", 699),
                pro_yearly_cents: env_parse("PLAN_PRO_YEARLY_CENTS", 6999),
                pro_name: "PathGen Pro".to_string(),
                pro_description: "AI coaching and replay analysis".to_string(),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_dollar_conversion() {
        let plans = PlanConfig {
            pro_monthly_cents: 699,
            pro_yearly_cents: 6999,
            pro_name: String::new(),
            pro_description: String::new(),
        };
        assert!((plans.monthly_dollars() - 6.99).abs() < f64::EPSILON);
        assert!((plans.yearly_dollars() - 69.99).abs() < f64::EPSILON);
    }
}
