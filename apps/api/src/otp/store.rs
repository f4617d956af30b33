use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::otp::{OtpChannel, OtpPurpose, OtpRecord};

/// Values for a freshly issued code.
#[derive(Debug, Clone)]
pub struct NewOtp {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub channel: OtpChannel,
    pub destination: String,
    pub purpose: OtpPurpose,
    pub code_hash: String,
    pub max_attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct OtpCounts {
    pub total_generated: i64,
    pub total_verified: i64,
    pub total_expired: i64,
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Most recent record for the (channel, destination, purpose) triple.
    async fn latest(
        &self,
        channel: OtpChannel,
        destination: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>>;

    /// Marks every unused record for the triple as used.
    async fn supersede_active(
        &self,
        channel: OtpChannel,
        destination: &str,
        purpose: OtpPurpose,
    ) -> Result<u64>;

    async fn insert(&self, otp: &NewOtp) -> Result<()>;

    /// Consumes the record if it is still unused, unexpired and at
    /// `expected_attempts`. `false` means another submission got there first.
    async fn mark_verified(&self, id: Uuid, expected_attempts: i32, now: DateTime<Utc>) -> Result<bool>;

    /// Adds a failed attempt under the same guard. Returns the new count, or
    /// `None` if the guard did not hold.
    async fn record_failed_attempt(&self, id: Uuid, expected_attempts: i32) -> Result<Option<i32>>;

    /// Marks expired unused records as used.
    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64>;

    async fn counts_since(&self, since: DateTime<Utc>) -> Result<OtpCounts>;
}

#[derive(Clone)]
pub struct PgOtpStore {
    pool: PgPool,
}

impl PgOtpStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpStore for PgOtpStore {
    async fn latest(
        &self,
        channel: OtpChannel,
        destination: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpRecord>> {
        Ok(sqlx::query_as::<_, OtpRecord>(
            r#"
            SELECT * FROM otp_verifications
            WHERE channel = $1 AND destination = $2 AND purpose = $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(channel.as_str())
        .bind(destination)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn supersede_active(
        &self,
        channel: OtpChannel,
        destination: &str,
        purpose: OtpPurpose,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE otp_verifications
            SET is_used = TRUE
            WHERE channel = $1 AND destination = $2 AND purpose = $3 AND is_used = FALSE
            "#,
        )
        .bind(channel.as_str())
        .bind(destination)
        .bind(purpose.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert(&self, otp: &NewOtp) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_verifications
                (id, user_id, channel, destination, purpose, code_hash, attempts,
                 max_attempts, expires_at, is_used, is_verified, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, FALSE, FALSE, $9, $10)
            "#,
        )
        .bind(otp.id)
        .bind(otp.user_id)
        .bind(otp.channel.as_str())
        .bind(&otp.destination)
        .bind(otp.purpose.as_str())
        .bind(&otp.code_hash)
        .bind(otp.max_attempts)
        .bind(otp.expires_at)
        .bind(otp.ip_address.as_deref())
        .bind(otp.user_agent.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid, expected_attempts: i32, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE otp_verifications
            SET attempts = attempts + 1, is_used = TRUE, is_verified = TRUE, verified_at = $3
            WHERE id = $1
              AND attempts = $2
              AND attempts < max_attempts
              AND is_used = FALSE
              AND expires_at > $3
            "#,
        )
        .bind(id)
        .bind(expected_attempts)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_failed_attempt(&self, id: Uuid, expected_attempts: i32) -> Result<Option<i32>> {
        Ok(sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE otp_verifications
            SET attempts = attempts + 1
            WHERE id = $1 AND attempts = $2 AND attempts < max_attempts AND is_used = FALSE
            RETURNING attempts
            "#,
        )
        .bind(id)
        .bind(expected_attempts)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE otp_verifications SET is_used = TRUE WHERE is_used = FALSE AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn counts_since(&self, since: DateTime<Utc>) -> Result<OtpCounts> {
        Ok(sqlx::query_as::<_, OtpCounts>(
            r#"
            SELECT
                COUNT(*) AS total_generated,
                COUNT(*) FILTER (WHERE is_verified) AS total_verified,
                COUNT(*) FILTER (WHERE NOT is_verified AND expires_at <= NOW()) AS total_expired
            FROM otp_verifications
            WHERE created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?)
    }
}
