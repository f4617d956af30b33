//! OTP record lifecycle.
//!
//! ```text
//! issued ──(correct code)──────────────► verified
//!    │───(now >= expires_at, or used)───► expired
//!    └───(attempts == max_attempts)─────► exhausted
//! ```
//!
//! `verified`, `expired` and `exhausted` are terminal.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::otp::OtpRecord;

pub const MAX_ATTEMPTS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpState {
    Issued,
    Verified,
    Expired,
    Exhausted,
}

pub fn state_of(record: &OtpRecord, now: DateTime<Utc>) -> OtpState {
    if record.is_verified {
        OtpState::Verified
    } else if record.attempts >= record.max_attempts {
        OtpState::Exhausted
    } else if record.is_used || now >= record.expires_at {
        OtpState::Expired
    } else {
        OtpState::Issued
    }
}

/// What a single submission does to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    /// Wrong code; the attempt counts.
    InvalidCode { remaining: i32 },
    Expired,
    TooManyAttempts,
    AlreadyVerified,
}

/// Decides the outcome of submitting a code. `code_matches` is only consulted
/// while the record is still `issued`.
pub fn decide(record: &OtpRecord, now: DateTime<Utc>, code_matches: bool) -> VerifyOutcome {
    match state_of(record, now) {
        OtpState::Verified => VerifyOutcome::AlreadyVerified,
        OtpState::Exhausted => VerifyOutcome::TooManyAttempts,
        OtpState::Expired => VerifyOutcome::Expired,
        OtpState::Issued if code_matches => VerifyOutcome::Verified,
        OtpState::Issued => VerifyOutcome::InvalidCode {
            remaining: (record.max_attempts - record.attempts - 1).max(0),
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    pub(crate) fn record(expires_in: Duration) -> OtpRecord {
        let now = Utc::now();
        OtpRecord {
            id: Uuid::new_v4(),
            user_id: None,
            channel: "email".to_string(),
            destination: "jane@example.com".to_string(),
            purpose: "login".to_string(),
            code_hash: String::new(),
            attempts: 0,
            max_attempts: MAX_ATTEMPTS,
            expires_at: now + expires_in,
            is_used: false,
            is_verified: false,
            verified_at: None,
            ip_address: None,
            user_agent: None,
            created_at: now,
        }
    }

    #[test]
    fn test_fresh_record_is_issued() {
        let r = record(Duration::minutes(5));
        assert_eq!(state_of(&r, Utc::now()), OtpState::Issued);
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let r = record(Duration::minutes(5));
        assert_eq!(state_of(&r, r.expires_at), OtpState::Expired);
        assert_eq!(
            state_of(&r, r.expires_at - Duration::seconds(1)),
            OtpState::Issued
        );
    }

    #[test]
    fn test_correct_code_after_expiry_is_rejected() {
        let r = record(Duration::seconds(-1));
        assert_eq!(decide(&r, Utc::now(), true), VerifyOutcome::Expired);
    }

    #[test]
    fn test_wrong_codes_count_down_to_exhaustion() {
        let mut r = record(Duration::minutes(5));
        let now = Utc::now();
        assert_eq!(decide(&r, now, false), VerifyOutcome::InvalidCode { remaining: 2 });
        r.attempts = 2;
        assert_eq!(decide(&r, now, false), VerifyOutcome::InvalidCode { remaining: 0 });
        r.attempts = 3;
        assert_eq!(decide(&r, now, true), VerifyOutcome::TooManyAttempts);
    }

    #[test]
    fn test_verified_code_cannot_be_reused() {
        let mut r = record(Duration::minutes(5));
        r.attempts = 1;
        r.is_used = true;
        r.is_verified = true;
        assert_eq!(decide(&r, Utc::now(), true), VerifyOutcome::AlreadyVerified);
    }

    #[test]
    fn test_superseded_record_reads_as_expired() {
        let mut r = record(Duration::minutes(5));
        r.is_used = true;
        assert_eq!(decide(&r, Utc::now(), true), VerifyOutcome::Expired);
    }
}
