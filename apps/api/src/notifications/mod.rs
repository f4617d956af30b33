//! In-app notifications, with e-mail for the application-related kinds.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::messaging::postmark::{EmailMessage, PostmarkClient};
use crate::models::notification::{NotificationKind, NotificationRow};
use crate::pagination::{Page, PageParams};

pub mod handlers;

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Option<Value>,
}

impl NewNotification {
    pub fn new(user_id: Uuid, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Sink for user-facing notifications. Callers treat it as best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: NewNotification) -> Result<()>;

    /// Sends the same notification to every admin. Returns how many were created.
    async fn notify_admins(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        data: Value,
    ) -> Result<usize>;
}

pub struct PgNotifier {
    pool: PgPool,
    mailer: PostmarkClient,
}

impl PgNotifier {
    pub fn new(pool: PgPool, mailer: PostmarkClient) -> Self {
        Self { pool, mailer }
    }

    pub async fn create(&self, notification: &NewNotification) -> Result<NotificationRow, sqlx::Error> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (id, user_id, type, title, message, data, is_read)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.data)
        .fetch_one(&self.pool)
        .await?;

        if notification.kind.is_emailed() {
            self.email_copy(notification).await;
        }

        Ok(row)
    }

    async fn email_copy(&self, notification: &NewNotification) {
        let email: Option<String> = match sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
            .bind(notification.user_id)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(email) => email,
            Err(e) => {
                warn!("Could not look up e-mail for user {}: {e}", notification.user_id);
                return;
            }
        };

        let Some(email) = email else {
            return;
        };

        if let Err(e) = self.mailer.send_email(&notification_email(&email, notification)).await {
            warn!(
                "Notification e-mail ({}) to user {} failed: {e}",
                notification.kind.as_str(),
                notification.user_id
            );
        }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn notify(&self, notification: NewNotification) -> Result<()> {
        self.create(&notification).await?;
        Ok(())
    }

    async fn notify_admins(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        data: Value,
    ) -> Result<usize> {
        let admins: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE role = 'admin'")
            .fetch_all(&self.pool)
            .await?;

        for admin in &admins {
            let notification =
                NewNotification::new(*admin, kind, title, message).with_data(data.clone());
            self.create(&notification).await?;
        }
        Ok(admins.len())
    }
}

pub fn notification_email(to: &str, notification: &NewNotification) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: notification.title.clone(),
        text_body: format!("{}\n\n- Job Board", notification.message),
        html_body: Some(format!(
            "<h2>{}</h2><p>{}</p>",
            html_escape::encode_text(&notification.title),
            html_escape::encode_text(&notification.message)
        )),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(rename = "type")]
    pub kind: Option<NotificationKind>,
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    #[serde(flatten)]
    pub page: Page<NotificationRow>,
    pub unread_count: i64,
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    filter: &NotificationFilter,
    params: PageParams,
) -> Result<NotificationList, sqlx::Error> {
    let kind = filter.kind.map(|k| k.as_str());

    let rows = sqlx::query_as::<_, NotificationRow>(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1
          AND ($2 = FALSE OR is_read = FALSE)
          AND ($3::text IS NULL OR type = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(user_id)
    .bind(filter.unread_only)
    .bind(kind)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM notifications
        WHERE user_id = $1
          AND ($2 = FALSE OR is_read = FALSE)
          AND ($3::text IS NULL OR type = $3)
        "#,
    )
    .bind(user_id)
    .bind(filter.unread_only)
    .bind(kind)
    .fetch_one(pool)
    .await?;

    let unread_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    Ok(NotificationList {
        page: Page::new(rows, total, params),
        unread_count,
    })
}

/// Marks one notification read. Only its owner may do so.
pub async fn mark_read(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<NotificationRow, AppError> {
    let owner: Option<Uuid> = sqlx::query_scalar("SELECT user_id FROM notifications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match owner {
        None => return Err(AppError::NotFound(format!("Notification {id} not found"))),
        Some(owner) if owner != user_id => return Err(AppError::Forbidden),
        Some(_) => {}
    }

    Ok(sqlx::query_as::<_, NotificationRow>(
        "UPDATE notifications SET is_read = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(pool)
    .await?)
}

pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE, updated_at = NOW() WHERE user_id = $1 AND is_read = FALSE",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Deletes read notifications created before `cutoff`.
pub async fn delete_read_before(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notifications WHERE is_read = TRUE AND created_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records everything it is asked to send.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) sent: Mutex<Vec<NewNotification>>,
        pub(crate) admin_messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: NewNotification) -> Result<()> {
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }

        async fn notify_admins(
            &self,
            _kind: NotificationKind,
            _title: &str,
            message: &str,
            _data: Value,
        ) -> Result<usize> {
            self.admin_messages.lock().unwrap().push(message.to_string());
            Ok(1)
        }
    }

    #[test]
    fn test_notification_email() {
        let n = NewNotification::new(
            Uuid::new_v4(),
            NotificationKind::ApplicationUpdate,
            "Application shortlisted",
            "You were shortlisted for Rust Developer",
        );
        let email = notification_email("jane@example.com", &n);
        assert_eq!(email.subject, "Application shortlisted");
        assert!(email.text_body.starts_with("You were shortlisted"));
    }

    #[test]
    fn test_notification_email_escapes_html() {
        let n = NewNotification::new(
            Uuid::new_v4(),
            NotificationKind::JobPosted,
            "<script>alert(1)</script>",
            "Acme & Co <b>hiring</b>",
        );
        let html = notification_email("jane@example.com", &n).html_body.unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("Acme &amp; Co &lt;b&gt;hiring&lt;/b&gt;"));
    }

    #[test]
    fn test_filter_parses_type() {
        let filter: NotificationFilter =
            serde_json::from_value(serde_json::json!({ "unread_only": true, "type": "JOB_POSTED" }))
                .unwrap();
        assert!(filter.unread_only);
        assert_eq!(filter.kind, Some(NotificationKind::JobPosted));
    }
}
