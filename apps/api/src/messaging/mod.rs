//! Outbound messaging: WhatsApp Business and Postmark e-mail.
//!
//! Both providers fall back to a simulated send when their token is not
//! configured, so local setups can exercise the OTP flow end to end.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::otp::OtpPurpose;

pub mod postmark;
pub mod whatsapp;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
    /// True when no provider token is configured and nothing left the process.
    pub simulated: bool,
}

impl DeliveryReceipt {
    pub(crate) fn simulated() -> Self {
        Self {
            message_id: format!("sim_{}", Uuid::new_v4().simple()),
            simulated: true,
        }
    }
}

/// A channel that can carry a one-time code to its recipient.
#[async_trait]
pub trait OtpDelivery: Send + Sync {
    async fn send_otp(
        &self,
        destination: &str,
        code: &str,
        purpose: OtpPurpose,
        ttl_minutes: i64,
    ) -> Result<DeliveryReceipt, MessagingError>;
}

/// Reads a provider's error body, truncated for logs.
pub(crate) async fn api_error(response: reqwest::Response) -> MessagingError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    MessagingError::Api {
        status,
        message: body.chars().take(500).collect(),
    }
}
