use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::{api_error, DeliveryReceipt, MessagingError, OtpDelivery};
use crate::config::WhatsAppConfig;
use crate::models::otp::OtpPurpose;
use crate::otp::code::mask_phone;

/// Country code prepended to bare national numbers.
const DEFAULT_COUNTRY_CODE: &str = "91";

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

/// WhatsApp Business Cloud API client.
#[derive(Clone)]
pub struct WhatsAppClient {
    http: Client,
    config: WhatsAppConfig,
}

impl WhatsAppClient {
    pub fn new(http: Client, config: WhatsAppConfig) -> Self {
        if config.api_token.is_none() {
            warn!("WHATSAPP_API_TOKEN not set; WhatsApp messages will be simulated");
        }
        Self { http, config }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.config.api_token, &self.config.phone_number_id) {
            (Some(token), Some(number_id)) => Some((token.as_str(), number_id.as_str())),
            _ => None,
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.credentials().is_none()
    }

    /// Sends a plain text message.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, MessagingError> {
        let to = format_phone(to)?;

        let Some((token, number_id)) = self.credentials() else {
            info!("[simulated] WhatsApp message to {}", mask_phone(&to));
            return Ok(DeliveryReceipt::simulated());
        };

        let url = format!("{}/{}/messages", self.config.api_url.trim_end_matches('/'), number_id);
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": { "body": body },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: SendResponse = response.json().await?;
        let message_id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .unwrap_or_default();

        info!("WhatsApp message sent to {} ({message_id})", mask_phone(&to));
        Ok(DeliveryReceipt {
            message_id,
            simulated: false,
        })
    }

    /// Checks the token against `GET {base}/me`. Simulation mode counts as valid.
    pub async fn verify_configuration(&self) -> Result<bool, MessagingError> {
        let Some((token, _)) = self.credentials() else {
            return Ok(true);
        };

        let url = format!("{}/me", self.config.api_url.trim_end_matches('/'));
        let response = self.http.get(url).bearer_auth(token).send().await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl OtpDelivery for WhatsAppClient {
    async fn send_otp(
        &self,
        destination: &str,
        code: &str,
        purpose: OtpPurpose,
        ttl_minutes: i64,
    ) -> Result<DeliveryReceipt, MessagingError> {
        self.send_text(destination, &otp_message(purpose, code, ttl_minutes))
            .await
    }
}

/// Digits only, with the default country code added to 10-digit numbers and
/// numbers written with a trunk `0`.
pub fn format_phone(raw: &str) -> Result<String, MessagingError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let formatted = if digits.len() == 10 {
        format!("{DEFAULT_COUNTRY_CODE}{digits}")
    } else if digits.len() == 11 && digits.starts_with('0') {
        format!("{DEFAULT_COUNTRY_CODE}{}", &digits[1..])
    } else {
        digits
    };

    if !(10..=15).contains(&formatted.len()) {
        return Err(MessagingError::InvalidRecipient(mask_phone(raw)));
    }
    Ok(formatted)
}

pub fn otp_message(purpose: OtpPurpose, code: &str, ttl_minutes: i64) -> String {
    let action = match purpose {
        OtpPurpose::Login => "log in to",
        OtpPurpose::Signup => "finish signing up for",
        OtpPurpose::PasswordReset => "reset your password on",
        OtpPurpose::Verification => "verify your account on",
    };
    format!(
        "Your Job Board code is {code}. Use it to {action} Job Board. \
         It expires in {ttl_minutes} minutes. Never share this code with anyone."
    )
}
