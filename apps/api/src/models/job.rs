use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Source tag for jobs posted by employers through the API.
pub const MANUAL_SOURCE: &str = "manual";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub source: String,
    pub source_id: Option<String>,
    pub title: String,
    pub company: Option<String>,
    pub company_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub location: Option<String>,
    pub country: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub apply_url: Option<String>,
    pub salary: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub skills: Vec<String>,
    pub is_remote: bool,
    pub is_hybrid: bool,
    pub is_urgent: bool,
    pub is_featured: bool,
    pub sector: Option<String>,
    pub quality_score: Option<f64>,
    /// Last time the quality score was computed; drives the rescore rotation.
    pub scored_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub expiry_date: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub raw_json: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A posting as mapped from any external feed, before it touches the database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedJob {
    pub source_id: Option<String>,
    pub title: String,
    pub company: String,
    pub location: String,
    pub country: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub apply_url: Option<String>,
    pub salary: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub skills: Vec<String>,
    pub is_remote: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub raw: Value,
}
