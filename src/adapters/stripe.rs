use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::config;

const API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("Stripe secret key not configured")]
    NotConfigured,

    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Stripe request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Thin client over the Stripe REST API. Requests are form-encoded, responses
/// come back as raw JSON values that handlers project fields out of.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
}

impl StripeClient {
    /// Build from config; absent secret key means billing is disabled and
    /// surfaces as 503 at the HTTP layer.
    pub fn from_config() -> Result<Self, StripeError> {
        let secret_key = config()
            .stripe
            .secret_key
            .clone()
            .ok_or(StripeError::NotConfigured)?;

        Ok(Self {
            http: reqwest::Client::new(),
            secret_key,
        })
    }

    async fn post(&self, path: &str, params: &[(&str, String)]) -> Result<Value, StripeError> {
        debug!("Stripe POST {}", path);
        let response = self
            .http
            .post(format!("{}{}", API_BASE, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(params)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, StripeError> {
        debug!("Stripe GET {}", path);
        let response = self
            .http
            .get(format!("{}{}", API_BASE, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .query(query)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn delete(&self, path: &str) -> Result<Value, StripeError> {
        debug!("Stripe DELETE {}", path);
        let response = self
            .http
            .delete(format!("{}{}", API_BASE, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse(response: reqwest::Response) -> Result<Value, StripeError> {
        let status = response.status();
        let body: Value = response.json().await?;

        if status.is_success() {
            Ok(body)
        } else {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown Stripe error")
                .to_string();
            Err(StripeError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    // ---- payments ----

    pub async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        user_id: &str,
        plan_id: &str,
    ) -> Result<Value, StripeError> {
        self.post(
            "/payment_intents",
            &[
                ("amount", amount_cents.to_string()),
                ("currency", currency.to_string()),
                ("automatic_payment_methods[enabled]", "true".to_string()),
                ("metadata[user_id]", user_id.to_string()),
                ("metadata[plan_id]", plan_id.to_string()),
            ],
        )
        .await
    }

    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<Value, StripeError> {
        self.get(&format!("/payment_intents/{}", id), &[]).await
    }

    pub async fn list_payment_intents(
        &self,
        customer: &str,
        limit: i64,
    ) -> Result<Value, StripeError> {
        self.get(
            "/payment_intents",
            &[
                ("customer", customer.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    pub async fn create_refund(&self, payment_intent_id: &str) -> Result<Value, StripeError> {
        self.post(
            "/refunds",
            &[("payment_intent", payment_intent_id.to_string())],
        )
        .await
    }

    // ---- checkout and portal ----

    /// Checkout session with line items expanded, for payment verification.
    pub async fn retrieve_checkout_session(&self, id: &str) -> Result<Value, StripeError> {
        self.get(
            &format!("/checkout/sessions/{}", id),
            &[("expand[]", "line_items".to_string())],
        )
        .await
    }

    pub async fn create_portal_session(
        &self,
        customer: &str,
        return_url: &str,
    ) -> Result<Value, StripeError> {
        self.post(
            "/billing_portal/sessions",
            &[
                ("customer", customer.to_string()),
                ("return_url", return_url.to_string()),
            ],
        )
        .await
    }

    // ---- subscriptions and invoices ----

    /// Flip the cancel-at-period-end flag; the subscription stays active
    /// until the paid period runs out.
    pub async fn set_subscription_cancellation(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<Value, StripeError> {
        self.post(
            &format!("/subscriptions/{}", subscription_id),
            &[(
                "cancel_at_period_end",
                cancel_at_period_end.to_string(),
            )],
        )
        .await
    }

    /// Immediate cancellation, used by admin-forced terminations.
    pub async fn cancel_subscription_now(
        &self,
        subscription_id: &str,
    ) -> Result<Value, StripeError> {
        self.delete(&format!("/subscriptions/{}", subscription_id))
            .await
    }

    pub async fn list_invoices(&self, customer: &str, limit: i64) -> Result<Value, StripeError> {
        self.get(
            "/invoices",
            &[
                ("customer", customer.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    pub async fn create_customer(&self, email: &str, user_id: &str) -> Result<Value, StripeError> {
        self.post(
            "/customers",
            &[
                ("email", email.to_string()),
                ("metadata[user_id]", user_id.to_string()),
            ],
        )
        .await
    }
}
