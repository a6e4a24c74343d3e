use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::config;

const API_BASE: &str = "https://api.brevo.com/v3";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email API key not configured")]
    NotConfigured,

    #[error("Email API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Email request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Transactional email sender (Brevo SMTP API).
pub struct EmailClient {
    http: reqwest::Client,
    api_key: String,
    sender_name: String,
    sender_address: String,
}

impl EmailClient {
    pub fn from_config() -> Result<Self, EmailError> {
        let cfg = &config().email;
        let api_key = cfg.api_key.clone().ok_or(EmailError::NotConfigured)?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            sender_name: cfg.sender_name.clone(),
            sender_address: cfg.sender_address.clone(),
        })
    }

    pub async fn send(&self, email: &OutboundEmail) -> Result<(), EmailError> {
        debug!("Sending transactional email to {}", email.to);

        let body = json!({
            "sender": {
                "name": self.sender_name,
                "email": self.sender_address,
            },
            "to": [{ "email": email.to }],
            "subject": email.subject,
            "htmlContent": email.html,
        });

        let response = self
            .http
            .post(format!("{}/smtp/email", API_BASE))
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(EmailError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
