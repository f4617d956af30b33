use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{api_error, DeliveryReceipt, MessagingError, OtpDelivery};
use crate::config::PostmarkConfig;
use crate::models::otp::OtpPurpose;
use crate::otp::code::is_valid_email;

const POSTMARK_API_URL: &str = "https://api.postmarkapp.com/email";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkRequest<'a> {
    from: String,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_body: Option<&'a str>,
    message_stream: &'static str,
}

#[derive(Debug, Deserialize)]
struct PostmarkResponse {
    #[serde(rename = "MessageID", default)]
    message_id: String,
}

/// Transactional e-mail through Postmark.
#[derive(Clone)]
pub struct PostmarkClient {
    http: Client,
    config: PostmarkConfig,
}

impl PostmarkClient {
    pub fn new(http: Client, config: PostmarkConfig) -> Self {
        if config.server_token.is_none() {
            warn!("POSTMARK_SERVER_TOKEN not set; e-mails will be simulated");
        }
        Self { http, config }
    }

    pub fn is_simulated(&self) -> bool {
        self.config.server_token.is_none()
    }

    pub async fn send_email(&self, message: &EmailMessage) -> Result<DeliveryReceipt, MessagingError> {
        if !is_valid_email(&message.to) {
            return Err(MessagingError::InvalidRecipient(message.to.clone()));
        }

        let Some(token) = self.config.server_token.as_deref() else {
            info!("[simulated] E-mail to {}: {}", message.to, message.subject);
            return Ok(DeliveryReceipt::simulated());
        };

        let body = PostmarkRequest {
            from: format!("{} <{}>", self.config.from_name, self.config.from_email),
            to: &message.to,
            subject: &message.subject,
            text_body: &message.text_body,
            html_body: message.html_body.as_deref(),
            message_stream: "outbound",
        };

        let response = self
            .http
            .post(POSTMARK_API_URL)
            .header("Accept", "application/json")
            .header("X-Postmark-Server-Token", token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: PostmarkResponse = response.json().await?;
        info!("E-mail sent to {} ({})", message.to, parsed.message_id);
        Ok(DeliveryReceipt {
            message_id: parsed.message_id,
            simulated: false,
        })
    }
}

#[async_trait]
impl OtpDelivery for PostmarkClient {
    async fn send_otp(
        &self,
        destination: &str,
        code: &str,
        purpose: OtpPurpose,
        ttl_minutes: i64,
    ) -> Result<DeliveryReceipt, MessagingError> {
        self.send_email(&otp_email(destination, purpose, code, ttl_minutes))
            .await
    }
}

pub fn otp_subject(purpose: OtpPurpose) -> &'static str {
    match purpose {
        OtpPurpose::Login => "Your Job Board login code",
        OtpPurpose::Signup => "Confirm your Job Board account",
        OtpPurpose::PasswordReset => "Reset your Job Board password",
        OtpPurpose::Verification => "Your Job Board verification code",
    }
}

pub fn otp_email(to: &str, purpose: OtpPurpose, code: &str, ttl_minutes: i64) -> EmailMessage {
    let text_body = format!(
        "Your verification code is {code}.\n\n\
         It expires in {ttl_minutes} minutes. If you did not request it, ignore this e-mail."
    );
    let html_body = format!(
        "<p>Your verification code is</p>\
         <p style=\"font-size:28px;font-weight:bold;letter-spacing:6px\">{code}</p>\
         <p>It expires in {ttl_minutes} minutes. If you did not request it, ignore this e-mail.</p>"
    );
    EmailMessage {
        to: to.to_string(),
        subject: otp_subject(purpose).to_string(),
        text_body,
        html_body: Some(html_body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulated_client() -> PostmarkClient {
        PostmarkClient::new(
            Client::new(),
            PostmarkConfig {
                server_token: None,
                from_email: "no-reply@example.com".to_string(),
                from_name: "Job Board".to_string(),
            },
        )
    }

    #[test]
    fn test_otp_email_contents() {
        let email = otp_email("a@b.co", OtpPurpose::PasswordReset, "424242", 10);
        assert_eq!(email.subject, "Reset your Job Board password");
        assert!(email.text_body.contains("424242"));
        assert!(email.html_body.unwrap().contains("10 minutes"));
    }

    #[test]
    fn test_request_uses_postmark_field_names() {
        let body = PostmarkRequest {
            from: "Job Board <no-reply@example.com>".to_string(),
            to: "a@b.co",
            subject: "s",
            text_body: "t",
            html_body: None,
            message_stream: "outbound",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["To"], "a@b.co");
        assert_eq!(value["MessageStream"], "outbound");
        assert!(value.get("HtmlBody").is_none());
    }

    #[tokio::test]
    async fn test_simulated_send() {
        let receipt = simulated_client()
            .send_otp("user@example.com", "123456", OtpPurpose::Login, 10)
            .await
            .unwrap();
        assert!(receipt.simulated);
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_before_sending() {
        let err = simulated_client()
            .send_otp("not-an-email", "123456", OtpPurpose::Login, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::InvalidRecipient(_)));
    }
}
