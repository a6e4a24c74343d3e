use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed views over document-store payloads. Documents are schemaless; these
/// structs capture the fields the handlers rely on, with `#[serde(default)]`
/// so legacy documents missing newer fields still deserialize.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default = "default_plan")]
    pub active_plan_id: String,
    #[serde(default)]
    pub stripe_customer_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
}

fn default_role() -> String {
    "user".to_string()
}

fn default_plan() -> String {
    "free".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Affiliate {
    pub name: String,
    pub email: String,
    #[serde(default = "default_commission")]
    pub commission_percent: f64,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_commission() -> f64 {
    10.0
}

/// Derived affiliate stats, recomputed on read from the conversions
/// collection (store-side aggregates, never a full-collection fold).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffiliateStats {
    pub clicks: i64,
    pub signups: i64,
    pub paid: i64,
    pub revenue: f64,
    pub conversion_rate: f64,
}

impl AffiliateStats {
    pub fn compute(clicks: i64, signups: i64, paid: i64, revenue: f64) -> Self {
        let conversion_rate = if clicks > 0 {
            round2(signups as f64 / clicks as f64 * 100.0)
        } else {
            0.0
        };
        Self {
            clicks,
            signups,
            paid,
            revenue: round2(revenue),
            conversion_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    pub discount_percent: f64,
    #[serde(default = "default_duration")]
    pub duration: String,
    #[serde(default)]
    pub max_redemptions: Option<i64>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_duration() -> String {
    "1month".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default = "default_plan")]
    pub plan_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub stripe_customer_id: String,
    #[serde(default)]
    pub stripe_subscription_id: String,
    #[serde(default)]
    pub current_period_start: Option<String>,
    #[serde(default)]
    pub current_period_end: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Append-only administrative action record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub action: String,
    pub admin_id: String,
    #[serde(default)]
    pub target_user_id: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub kind: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
    #[serde(default)]
    pub target_user_id: Option<String>,
    #[serde(default)]
    pub to_all: bool,
    pub created_by: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Round to two decimals (money, percentages).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_rate_rounds_and_guards_zero() {
        let stats = AffiliateStats::compute(3, 1, 0, 0.0);
        assert_eq!(stats.conversion_rate, 33.33);

        let none = AffiliateStats::compute(0, 5, 0, 0.0);
        assert_eq!(none.conversion_rate, 0.0);
    }

    #[test]
    fn revenue_rounds_to_cents() {
        let stats = AffiliateStats::compute(10, 2, 1, 10.005);
        assert_eq!(stats.revenue, 10.01);
    }

    #[test]
    fn user_defaults_for_legacy_documents() {
        let user: User = serde_json::from_value(serde_json::json!({
            "email": "a@b.c"
        }))
        .unwrap();
        assert_eq!(user.role, "user");
        assert!(!user.is_admin);
        assert_eq!(user.active_plan_id, "free");
    }
}
