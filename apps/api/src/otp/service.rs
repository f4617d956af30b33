use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::messaging::OtpDelivery;
use crate::models::notification::NotificationKind;
use crate::models::otp::{OtpChannel, OtpPurpose};
use crate::notifications::{NewNotification, Notifier};
use crate::otp::code::{
    generate_code, hash_code, hashes_match, is_well_formed_code, mask_destination,
    normalize_destination,
};
use crate::otp::machine::{decide, VerifyOutcome, MAX_ATTEMPTS};
use crate::otp::store::{NewOtp, OtpStore};

/// Minimum gap between two codes for the same destination and purpose.
pub const RESEND_INTERVAL_SECS: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct SendOtpRequest {
    pub channel: OtpChannel,
    pub destination: String,
    #[serde(default)]
    pub purpose: OtpPurpose,
    pub user_id: Option<Uuid>,
}

/// Caller metadata stored alongside the code.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendOtpResponse {
    pub otp_id: Uuid,
    pub channel: OtpChannel,
    /// Masked destination.
    pub destination: String,
    pub expires_at: DateTime<Utc>,
    pub delivered: bool,
    pub message_id: Option<String>,
    pub simulated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpRequest {
    pub channel: OtpChannel,
    pub destination: String,
    #[serde(default)]
    pub purpose: OtpPurpose,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpResponse {
    pub verified: bool,
    pub otp_id: Uuid,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OtpStats {
    pub period_days: i64,
    pub total_generated: i64,
    pub total_verified: i64,
    pub total_expired: i64,
    /// Verified / generated, as a percentage.
    pub success_rate: f64,
}

pub struct OtpService {
    store: Arc<dyn OtpStore>,
    whatsapp: Arc<dyn OtpDelivery>,
    email: Arc<dyn OtpDelivery>,
    notifier: Arc<dyn Notifier>,
    secret: String,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        whatsapp: Arc<dyn OtpDelivery>,
        email: Arc<dyn OtpDelivery>,
        notifier: Arc<dyn Notifier>,
        secret: String,
    ) -> Self {
        Self {
            store,
            whatsapp,
            email,
            notifier,
            secret,
        }
    }

    fn delivery_for(&self, channel: OtpChannel) -> &dyn OtpDelivery {
        match channel {
            OtpChannel::Whatsapp => self.whatsapp.as_ref(),
            OtpChannel::Email => self.email.as_ref(),
        }
    }

    /// Issues a new code and hands it to the channel. A failed delivery is
    /// reported in the response but the code stays valid.
    pub async fn issue(&self, req: SendOtpRequest, client: ClientInfo) -> Result<SendOtpResponse, AppError> {
        let destination = normalize_destination(req.channel, &req.destination).ok_or_else(|| {
            AppError::Validation(match req.channel {
                OtpChannel::Whatsapp => "Phone number must have 10 to 15 digits".to_string(),
                OtpChannel::Email => "Invalid e-mail address".to_string(),
            })
        })?;
        let masked = mask_destination(req.channel, &destination);
        let now = Utc::now();

        if let Some(previous) = self.store.latest(req.channel, &destination, req.purpose).await? {
            let wait = resend_wait_secs(previous.created_at, now);
            if wait > 0 {
                return Err(AppError::TooManyRequests(format!(
                    "Please wait {wait} seconds before requesting a new code"
                )));
            }
        }

        let superseded = self
            .store
            .supersede_active(req.channel, &destination, req.purpose)
            .await?;
        if superseded > 0 {
            info!("Superseded {superseded} active code(s) for {masked}");
        }

        let id = Uuid::new_v4();
        let code = generate_code();
        let ttl_minutes = req.channel.ttl_minutes();
        let expires_at = now + Duration::minutes(ttl_minutes);

        self.store
            .insert(&NewOtp {
                id,
                user_id: req.user_id,
                channel: req.channel,
                destination: destination.clone(),
                purpose: req.purpose,
                code_hash: hash_code(&self.secret, id, &code),
                max_attempts: MAX_ATTEMPTS,
                expires_at,
                ip_address: client.ip_address,
                user_agent: client.user_agent,
            })
            .await?;

        let receipt = match self
            .delivery_for(req.channel)
            .send_otp(&destination, &code, req.purpose, ttl_minutes)
            .await
        {
            Ok(receipt) => Some(receipt),
            Err(e) => {
                warn!("OTP {id} delivery over {} to {masked} failed: {e}", req.channel.as_str());
                None
            }
        };

        info!(
            "Issued OTP {id} ({}, {}) to {masked}, delivered: {}",
            req.channel.as_str(),
            req.purpose.as_str(),
            receipt.is_some()
        );

        if let Some(user_id) = req.user_id {
            self.notify_best_effort(
                NewNotification::new(
                    user_id,
                    NotificationKind::OtpSent,
                    "Verification code sent",
                    format!("A verification code was sent to {masked}."),
                )
                .with_data(json!({ "otp_id": id, "channel": req.channel })),
            )
            .await;
        }

        Ok(SendOtpResponse {
            otp_id: id,
            channel: req.channel,
            destination: masked,
            expires_at,
            delivered: receipt.is_some(),
            simulated: receipt.as_ref().map(|r| r.simulated).unwrap_or(false),
            message_id: receipt.map(|r| r.message_id),
        })
    }

    /// Checks a submitted code against the latest record for its destination.
    pub async fn verify(&self, req: VerifyOtpRequest) -> Result<VerifyOtpResponse, AppError> {
        let code = req.code.trim();
        if !is_well_formed_code(code) {
            return Err(AppError::Validation("Code must be 6 digits".to_string()));
        }
        let destination = normalize_destination(req.channel, &req.destination)
            .ok_or_else(|| AppError::Validation("Invalid destination".to_string()))?;

        let record = self
            .store
            .latest(req.channel, &destination, req.purpose)
            .await?
            .ok_or_else(|| AppError::NotFound("No code was issued for this destination".to_string()))?;

        let now = Utc::now();
        let matches = hashes_match(&record.code_hash, &hash_code(&self.secret, record.id, code));

        match decide(&record, now, matches) {
            VerifyOutcome::Verified => {
                if !self.store.mark_verified(record.id, record.attempts, now).await? {
                    warn!("OTP {} was consumed by a concurrent submission", record.id);
                    return Err(AppError::Conflict("Code has already been used".to_string()));
                }
                info!("OTP {} verified", record.id);

                if let Some(user_id) = record.user_id {
                    self.notify_best_effort(
                        NewNotification::new(
                            user_id,
                            NotificationKind::OtpVerified,
                            "Verification successful",
                            format!(
                                "Your {} was verified.",
                                match req.channel {
                                    OtpChannel::Whatsapp => "phone number",
                                    OtpChannel::Email => "e-mail address",
                                }
                            ),
                        )
                        .with_data(json!({ "otp_id": record.id, "purpose": req.purpose })),
                    )
                    .await;
                }

                Ok(VerifyOtpResponse {
                    verified: true,
                    otp_id: record.id,
                    user_id: record.user_id,
                })
            }
            VerifyOutcome::InvalidCode { remaining } => {
                if self
                    .store
                    .record_failed_attempt(record.id, record.attempts)
                    .await?
                    .is_none()
                {
                    return Err(AppError::Conflict(
                        "Code state changed, request a new code".to_string(),
                    ));
                }
                if remaining == 0 {
                    Err(AppError::TooManyRequests(
                        "Too many failed attempts, request a new code".to_string(),
                    ))
                } else {
                    Err(AppError::Validation(format!(
                        "Invalid code, {remaining} attempt(s) remaining"
                    )))
                }
            }
            VerifyOutcome::Expired => Err(AppError::Validation(
                "Code has expired, request a new one".to_string(),
            )),
            VerifyOutcome::TooManyAttempts => Err(AppError::TooManyRequests(
                "Too many failed attempts, request a new code".to_string(),
            )),
            VerifyOutcome::AlreadyVerified => {
                Err(AppError::Conflict("Code has already been used".to_string()))
            }
        }
    }

    /// Marks expired unused codes as used.
    pub async fn cleanup_expired(&self) -> anyhow::Result<u64> {
        let expired = self.store.expire_stale(Utc::now()).await?;
        if expired > 0 {
            info!("Marked {expired} expired OTP(s) as used");
        }
        Ok(expired)
    }

    pub async fn stats(&self, period_days: i64) -> anyhow::Result<OtpStats> {
        let period_days = period_days.clamp(1, 365);
        let counts = self
            .store
            .counts_since(Utc::now() - Duration::days(period_days))
            .await?;
        let success_rate = if counts.total_generated > 0 {
            counts.total_verified as f64 / counts.total_generated as f64 * 100.0
        } else {
            0.0
        };
        Ok(OtpStats {
            period_days,
            total_generated: counts.total_generated,
            total_verified: counts.total_verified,
            total_expired: counts.total_expired,
            success_rate,
        })
    }

    async fn notify_best_effort(&self, notification: NewNotification) {
        let kind = notification.kind;
        if let Err(e) = self.notifier.notify(notification).await {
            warn!("Failed to record {} notification: {e}", kind.as_str());
        }
    }
}

/// Seconds left before another code may be issued; 0 when allowed.
pub fn resend_wait_secs(last_issued_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (RESEND_INTERVAL_SECS - (now - last_issued_at).num_seconds()).max(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::messaging::{DeliveryReceipt, MessagingError};
    use crate::notifications::tests::RecordingNotifier;
    use crate::otp::store::memory::MemoryOtpStore;

    const SECRET: &str = "test-secret";

    /// Captures the last code so tests can submit it.
    struct CapturingDelivery {
        fail: bool,
        last_code: Mutex<Option<String>>,
    }

    impl CapturingDelivery {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                last_code: Mutex::new(None),
            })
        }

        fn code(&self) -> String {
            self.last_code.lock().unwrap().clone().unwrap()
        }
    }

    #[async_trait]
    impl OtpDelivery for CapturingDelivery {
        async fn send_otp(
            &self,
            _destination: &str,
            code: &str,
            _purpose: OtpPurpose,
            _ttl_minutes: i64,
        ) -> Result<DeliveryReceipt, MessagingError> {
            *self.last_code.lock().unwrap() = Some(code.to_string());
            if self.fail {
                Err(MessagingError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                })
            } else {
                Ok(DeliveryReceipt {
                    message_id: "msg-1".to_string(),
                    simulated: false,
                })
            }
        }
    }

    struct Harness {
        service: OtpService,
        store: Arc<MemoryOtpStore>,
        whatsapp: Arc<CapturingDelivery>,
        email: Arc<CapturingDelivery>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(whatsapp_fails: bool) -> Harness {
        let store = Arc::new(MemoryOtpStore::default());
        let whatsapp = CapturingDelivery::new(whatsapp_fails);
        let email = CapturingDelivery::new(false);
        let notifier = Arc::new(RecordingNotifier::default());
        let service = OtpService::new(
            store.clone(),
            whatsapp.clone(),
            email.clone(),
            notifier.clone(),
            SECRET.to_string(),
        );
        Harness {
            service,
            store,
            whatsapp,
            email,
            notifier,
        }
    }

    fn send(channel: OtpChannel, destination: &str) -> SendOtpRequest {
        SendOtpRequest {
            channel,
            destination: destination.to_string(),
            purpose: OtpPurpose::Login,
            user_id: None,
        }
    }

    fn verify(channel: OtpChannel, destination: &str, code: &str) -> VerifyOtpRequest {
        VerifyOtpRequest {
            channel,
            destination: destination.to_string(),
            purpose: OtpPurpose::Login,
            code: code.to_string(),
        }
    }

    fn wrong_code(code: &str) -> String {
        if code == "000000" { "111111" } else { "000000" }.to_string()
    }

    #[tokio::test]
    async fn test_issue_stores_only_hash_with_channel_expiry() {
        let h = harness(false);
        let before = Utc::now();
        let sent = h
            .service
            .issue(send(OtpChannel::Whatsapp, "+91 98765 43210"), ClientInfo::default())
            .await
            .unwrap();

        assert!(sent.delivered);
        assert_eq!(sent.destination, "+********3210");

        let record = h.store.get(sent.otp_id).unwrap();
        let code = h.whatsapp.code();
        assert_ne!(record.code_hash, code);
        assert_eq!(record.code_hash, hash_code(SECRET, record.id, &code));
        assert_eq!(record.max_attempts, 3);
        let ttl = record.expires_at - before;
        assert!(ttl <= Duration::minutes(5) + Duration::seconds(1));
        assert!(ttl > Duration::minutes(4));
    }

    #[tokio::test]
    async fn test_email_codes_live_ten_minutes() {
        let h = harness(false);
        let before = Utc::now();
        let sent = h
            .service
            .issue(send(OtpChannel::Email, "Jane@Example.com"), ClientInfo::default())
            .await
            .unwrap();
        assert!(sent.expires_at - before > Duration::minutes(9));
        assert_eq!(h.store.get(sent.otp_id).unwrap().destination, "jane@example.com");
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_block_issuance() {
        let h = harness(true);
        let sent = h
            .service
            .issue(send(OtpChannel::Whatsapp, "9876543210"), ClientInfo::default())
            .await
            .unwrap();
        assert!(!sent.delivered);
        assert!(sent.message_id.is_none());

        let code = h.whatsapp.code();
        let verified = h
            .service
            .verify(verify(OtpChannel::Whatsapp, "9876543210", &code))
            .await
            .unwrap();
        assert!(verified.verified);
    }

    #[tokio::test]
    async fn test_invalid_destination_rejected() {
        let h = harness(false);
        let err = h
            .service
            .issue(send(OtpChannel::Email, "not-an-email"), ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_resend_within_interval_is_rate_limited() {
        let h = harness(false);
        h.service
            .issue(send(OtpChannel::Email, "jane@example.com"), ClientInfo::default())
            .await
            .unwrap();
        let err = h
            .service
            .issue(send(OtpChannel::Email, "jane@example.com"), ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TooManyRequests(_)));
    }

    #[tokio::test]
    async fn test_new_code_supersedes_previous() {
        let h = harness(false);
        let first = h
            .service
            .issue(send(OtpChannel::Email, "jane@example.com"), ClientInfo::default())
            .await
            .unwrap();
        let first_code = h.email.code();
        // Age the first record past the resend interval.
        h.store.update(first.otp_id, |r| {
            r.created_at = r.created_at - Duration::seconds(RESEND_INTERVAL_SECS + 1)
        });

        h.service
            .issue(send(OtpChannel::Email, "jane@example.com"), ClientInfo::default())
            .await
            .unwrap();
        let second_code = h.email.code();

        assert!(h.store.get(first.otp_id).unwrap().is_used);
        if first_code != second_code {
            assert!(h
                .service
                .verify(verify(OtpChannel::Email, "jane@example.com", &first_code))
                .await
                .is_err());
        }
        assert!(h
            .service
            .verify(verify(OtpChannel::Email, "jane@example.com", &second_code))
            .await
            .unwrap()
            .verified);
    }

    #[tokio::test]
    async fn test_verified_code_cannot_be_reused() {
        let h = harness(false);
        h.service
            .issue(send(OtpChannel::Email, "jane@example.com"), ClientInfo::default())
            .await
            .unwrap();
        let code = h.email.code();

        h.service
            .verify(verify(OtpChannel::Email, "jane@example.com", &code))
            .await
            .unwrap();
        let err = h
            .service
            .verify(verify(OtpChannel::Email, "jane@example.com", &code))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_three_wrong_attempts_exhaust_the_code() {
        let h = harness(false);
        let sent = h
            .service
            .issue(send(OtpChannel::Email, "jane@example.com"), ClientInfo::default())
            .await
            .unwrap();
        let code = h.email.code();
        let wrong = wrong_code(&code);

        let first = h
            .service
            .verify(verify(OtpChannel::Email, "jane@example.com", &wrong))
            .await
            .unwrap_err();
        assert!(matches!(first, AppError::Validation(_)));
        h.service
            .verify(verify(OtpChannel::Email, "jane@example.com", &wrong))
            .await
            .unwrap_err();
        let third = h
            .service
            .verify(verify(OtpChannel::Email, "jane@example.com", &wrong))
            .await
            .unwrap_err();
        assert!(matches!(third, AppError::TooManyRequests(_)));

        // The right code no longer works either.
        let after = h
            .service
            .verify(verify(OtpChannel::Email, "jane@example.com", &code))
            .await
            .unwrap_err();
        assert!(matches!(after, AppError::TooManyRequests(_)));
        assert_eq!(h.store.get(sent.otp_id).unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected() {
        let h = harness(false);
        let sent = h
            .service
            .issue(send(OtpChannel::Email, "jane@example.com"), ClientInfo::default())
            .await
            .unwrap();
        let code = h.email.code();
        h.store.update(sent.otp_id, |r| {
            r.expires_at = Utc::now() - Duration::seconds(1)
        });

        let err = h
            .service
            .verify(verify(OtpChannel::Email, "jane@example.com", &code))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!h.store.get(sent.otp_id).unwrap().is_verified);
    }

    #[tokio::test]
    async fn test_lost_race_is_rejected() {
        let h = harness(false);
        let sent = h
            .service
            .issue(send(OtpChannel::Email, "jane@example.com"), ClientInfo::default())
            .await
            .unwrap();
        let code = h.email.code();
        let record = h.store.get(sent.otp_id).unwrap();

        // A concurrent submission consumes the record first.
        assert!(h
            .store
            .mark_verified(record.id, record.attempts, Utc::now())
            .await
            .unwrap());
        assert!(!h
            .store
            .mark_verified(record.id, record.attempts, Utc::now())
            .await
            .unwrap());

        let err = h
            .service
            .verify(verify(OtpChannel::Email, "jane@example.com", &code))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_notifications_recorded_for_known_user() {
        let h = harness(false);
        let user_id = Uuid::new_v4();
        h.service
            .issue(
                SendOtpRequest {
                    user_id: Some(user_id),
                    ..send(OtpChannel::Email, "jane@example.com")
                },
                ClientInfo::default(),
            )
            .await
            .unwrap();
        let code = h.email.code();
        h.service
            .verify(verify(OtpChannel::Email, "jane@example.com", &code))
            .await
            .unwrap();

        let kinds: Vec<_> = h.notifier.sent.lock().unwrap().iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::OtpSent, NotificationKind::OtpVerified]);
    }

    #[tokio::test]
    async fn test_cleanup_and_stats() {
        let h = harness(false);
        let sent = h
            .service
            .issue(send(OtpChannel::Email, "jane@example.com"), ClientInfo::default())
            .await
            .unwrap();
        h.store.update(sent.otp_id, |r| {
            r.expires_at = Utc::now() - Duration::minutes(1)
        });

        assert_eq!(h.service.cleanup_expired().await.unwrap(), 1);
        assert_eq!(h.service.cleanup_expired().await.unwrap(), 0);

        let stats = h.service.stats(7).await.unwrap();
        assert_eq!(stats.total_generated, 1);
        assert_eq!(stats.total_expired, 1);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn test_resend_wait() {
        let now = Utc::now();
        assert_eq!(resend_wait_secs(now - Duration::seconds(20), now), 40);
        assert_eq!(resend_wait_secs(now - Duration::seconds(90), now), 0);
    }
}
