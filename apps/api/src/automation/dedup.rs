use serde::{Deserialize, Serialize};

use crate::models::job::{JobRow, NormalizedJob};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Same feed and same upstream id.
    SourceId,
    /// Same title, company and location, ignoring case and surrounding whitespace.
    Identity,
}

/// Normalized identity of a posting used for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupKey {
    pub title: String,
    pub company: String,
    pub location: String,
}

impl DedupKey {
    pub fn new(title: &str, company: &str, location: &str) -> Self {
        Self {
            title: normalize(title),
            company: normalize(company),
            location: normalize(location),
        }
    }

    pub fn from_incoming(job: &NormalizedJob) -> Self {
        Self::new(&job.title, &job.company, &job.location)
    }

    pub fn from_row(row: &JobRow) -> Self {
        Self::new(
            &row.title,
            row.company.as_deref().unwrap_or(""),
            row.location.as_deref().unwrap_or(""),
        )
    }
}

pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Decides whether `existing` is the same posting as `incoming` from `source`.
/// Mirrors the predicate used by the SQL duplicate lookup.
pub fn duplicate_reason(
    source: &str,
    incoming: &NormalizedJob,
    existing: &JobRow,
) -> Option<DuplicateReason> {
    if let Some(source_id) = incoming.source_id.as_deref() {
        if existing.source == source && existing.source_id.as_deref() == Some(source_id) {
            return Some(DuplicateReason::SourceId);
        }
    }

    if DedupKey::from_incoming(incoming) == DedupKey::from_row(existing) {
        return Some(DuplicateReason::Identity);
    }

    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    pub(crate) fn row(source: &str, source_id: Option<&str>, title: &str, company: &str, location: &str) -> JobRow {
        JobRow {
            id: Uuid::new_v4(),
            source: source.to_string(),
            source_id: source_id.map(String::from),
            title: title.to_string(),
            company: Some(company.to_string()),
            company_id: None,
            created_by: None,
            location: Some(location.to_string()),
            country: "IN".to_string(),
            description: String::new(),
            requirements: vec![],
            apply_url: None,
            salary: None,
            salary_min: None,
            salary_max: None,
            salary_currency: None,
            job_type: None,
            experience_level: None,
            skills: vec![],
            is_remote: false,
            is_hybrid: false,
            is_urgent: false,
            is_featured: false,
            sector: None,
            quality_score: None,
            scored_at: None,
            is_active: true,
            expiry_date: None,
            approved_at: None,
            raw_json: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn incoming(source_id: Option<&str>, title: &str, company: &str, location: &str) -> NormalizedJob {
        NormalizedJob {
            source_id: source_id.map(String::from),
            title: title.to_string(),
            company: company.to_string(),
            location: location.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_identity_match_ignores_case_and_whitespace() {
        let existing = row("adzuna", Some("a-1"), "Rust Developer", "Acme", "Pune");
        let candidate = incoming(None, "  rust developer ", "ACME", "pune");
        assert_eq!(
            duplicate_reason("jooble", &candidate, &existing),
            Some(DuplicateReason::Identity)
        );
    }

    #[test]
    fn test_source_id_match_requires_same_source() {
        let existing = row("adzuna", Some("42"), "Rust Developer", "Acme", "Pune");
        let same_feed = incoming(Some("42"), "Renamed", "Other", "Elsewhere");
        assert_eq!(
            duplicate_reason("adzuna", &same_feed, &existing),
            Some(DuplicateReason::SourceId)
        );
        assert_eq!(duplicate_reason("jsearch", &same_feed, &existing), None);
    }

    #[test]
    fn test_different_location_is_not_duplicate() {
        let existing = row("adzuna", None, "Rust Developer", "Acme", "Pune");
        let candidate = incoming(None, "Rust Developer", "Acme", "Delhi");
        assert_eq!(duplicate_reason("adzuna", &candidate, &existing), None);
    }
}
