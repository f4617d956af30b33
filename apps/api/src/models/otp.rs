use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    Whatsapp,
    Email,
}

impl OtpChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpChannel::Whatsapp => "whatsapp",
            OtpChannel::Email => "email",
        }
    }

    /// WhatsApp codes live 5 minutes, e-mail codes 10.
    pub fn ttl_minutes(&self) -> i64 {
        match self {
            OtpChannel::Whatsapp => 5,
            OtpChannel::Email => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Login,
    Signup,
    PasswordReset,
    #[default]
    Verification,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Login => "login",
            OtpPurpose::Signup => "signup",
            OtpPurpose::PasswordReset => "password_reset",
            OtpPurpose::Verification => "verification",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OtpRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub channel: String,
    pub destination: String,
    pub purpose: String,
    /// Hex SHA-256 of the code; the plain code is never stored.
    #[serde(skip_serializing)]
    pub code_hash: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}
