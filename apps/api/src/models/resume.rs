use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub s3_key: String,
    /// Plain text pulled out of PDF uploads; `None` for Word documents.
    pub extracted_text: Option<String>,
    pub created_at: DateTime<Utc>,
}
