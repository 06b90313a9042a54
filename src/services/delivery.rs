use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::modules::account::model::Purpose;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("mail provider rejected message with status {0}")]
    Rejected(u16),

    #[error("mail delivery timed out")]
    Timeout,
}

/// Sends a verification code to the owner of an email address.
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn dispatch(&self, email: &str, purpose: Purpose, code: &str) -> Result<(), DeliveryError>;
}

fn message_body(purpose: Purpose, code: &str, ttl_minutes: i64) -> String {
    format!(
        "Your verification code for {} is {}.\n\nIt expires in {} minutes and can be used once.\nIf you did not request it, ignore this message.",
        purpose, code, ttl_minutes
    )
}

// =============================================================================
// HTTP MAIL API
// =============================================================================

#[derive(Debug, Clone)]
pub struct MailApiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub from_address: String,
    pub timeout: Duration,
    pub code_ttl_minutes: i64,
}

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: String,
}

/// Posts messages to a transactional mail HTTP API.
pub struct HttpMailDelivery {
    client: Client,
    config: MailApiConfig,
}

impl HttpMailDelivery {
    /// Fails if the HTTP client cannot be built with the configured timeout.
    pub fn new(config: MailApiConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(format!("failed to build mail client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl CodeDelivery for HttpMailDelivery {
    async fn dispatch(&self, email: &str, purpose: Purpose, code: &str) -> Result<(), DeliveryError> {
        let message_id = Uuid::new_v4().to_string();
        let request = MailRequest {
            from: &self.config.from_address,
            to: email,
            subject: purpose.subject(),
            text: message_body(purpose, code, self.config.code_ttl_minutes),
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .header("X-Message-Id", &message_id)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected(status.as_u16()));
        }

        tracing::debug!(%email, %purpose, %message_id, "verification code handed to mail API");
        Ok(())
    }
}

// =============================================================================
// DEVELOPMENT
// =============================================================================

/// Writes codes to the log instead of sending mail. Only for local development.
pub struct LogDelivery;

#[async_trait]
impl CodeDelivery for LogDelivery {
    async fn dispatch(&self, email: &str, purpose: Purpose, code: &str) -> Result<(), DeliveryError> {
        tracing::debug!(%email, %purpose, %code, "mail delivery disabled, verification code logged");
        Ok(())
    }
}
