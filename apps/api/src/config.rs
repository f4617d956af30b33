use std::str::FromStr;

use anyhow::{Context, Result};

use crate::automation::config::AutomationConfig;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    /// Server-side key mixed into every stored OTP hash.
    pub otp_secret: String,
    /// Shared token expected in the `x-admin-token` header on admin routes.
    pub admin_api_token: String,
    pub port: u16,
    pub rust_log: String,
    pub providers: ProviderCredentials,
    pub whatsapp: WhatsAppConfig,
    pub postmark: PostmarkConfig,
    pub automation: AutomationConfig,
}

/// Job feed credentials. A provider without credentials is skipped.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub adzuna_app_id: Option<String>,
    pub adzuna_app_key: Option<String>,
    pub rapidapi_key: Option<String>,
    pub serpapi_key: Option<String>,
    pub jooble_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Missing token puts the client in simulation mode.
    pub api_token: Option<String>,
    pub api_url: String,
    pub phone_number_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PostmarkConfig {
    /// Missing token puts the client in simulation mode.
    pub server_token: Option<String>,
    pub from_email: String,
    pub from_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            otp_secret: require_env("OTP_SECRET")?,
            admin_api_token: require_env("ADMIN_API_TOKEN")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            providers: ProviderCredentials {
                adzuna_app_id: optional_env("ADZUNA_APP_ID"),
                adzuna_app_key: optional_env("ADZUNA_APP_KEY"),
                rapidapi_key: optional_env("RAPIDAPI_KEY").or_else(|| optional_env("JSEARCH_API_KEY")),
                serpapi_key: optional_env("SERPAPI_KEY"),
                jooble_api_key: optional_env("JOOBLE_API_KEY"),
            },
            whatsapp: WhatsAppConfig {
                api_token: optional_env("WHATSAPP_API_TOKEN"),
                api_url: std::env::var("WHATSAPP_API_URL")
                    .unwrap_or_else(|_| "https://graph.facebook.com/v18.0".to_string()),
                phone_number_id: optional_env("WHATSAPP_PHONE_NUMBER_ID"),
            },
            postmark: PostmarkConfig {
                server_token: optional_env("POSTMARK_SERVER_TOKEN"),
                from_email: std::env::var("POSTMARK_FROM_EMAIL")
                    .unwrap_or_else(|_| "no-reply@jobboard.local".to_string()),
                from_name: std::env::var("POSTMARK_FROM_NAME")
                    .unwrap_or_else(|_| "Job Board".to_string()),
            },
            automation: AutomationConfig::from_env()?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Returns the variable if it is set and not blank.
pub(crate) fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses the variable into `T`, falling back to `default` when unset.
pub(crate) fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'"))
}
