use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Welcome,
    JobMatch,
    ApplicationUpdate,
    System,
    InterviewScheduled,
    JobApplicationReceived,
    JobPosted,
    AdminAction,
    ResumeUploaded,
    OtpSent,
    OtpVerified,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Welcome => "WELCOME",
            NotificationKind::JobMatch => "JOB_MATCH",
            NotificationKind::ApplicationUpdate => "APPLICATION_UPDATE",
            NotificationKind::System => "SYSTEM",
            NotificationKind::InterviewScheduled => "INTERVIEW_SCHEDULED",
            NotificationKind::JobApplicationReceived => "JOB_APPLICATION_RECEIVED",
            NotificationKind::JobPosted => "JOB_POSTED",
            NotificationKind::AdminAction => "ADMIN_ACTION",
            NotificationKind::ResumeUploaded => "RESUME_UPLOADED",
            NotificationKind::OtpSent => "OTP_SENT",
            NotificationKind::OtpVerified => "OTP_VERIFIED",
        }
    }

    /// Kinds that are also mailed to the recipient.
    pub fn is_emailed(&self) -> bool {
        matches!(
            self,
            NotificationKind::ApplicationUpdate
                | NotificationKind::JobApplicationReceived
                | NotificationKind::InterviewScheduled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: Option<Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
