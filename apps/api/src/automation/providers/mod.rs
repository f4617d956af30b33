//! External job feeds.
//!
//! Every feed client lives here and implements [`JobFeed`]; the sync pipeline
//! only ever sees `NormalizedJob`s. Calls are made once per sync tick with no
//! retry: a failed feed is logged and the next tick tries again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::automation::config::AutomationConfig;
use crate::config::ProviderCredentials;
use crate::models::job::NormalizedJob;

pub mod adzuna;
pub mod google_jobs;
pub mod jooble;
pub mod jsearch;

const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Postings from one search. Entries that could not be mapped are skipped
/// and counted in `malformed`.
#[derive(Debug, Clone, Default)]
pub struct FeedBatch {
    pub jobs: Vec<NormalizedJob>,
    pub malformed: usize,
}

#[async_trait]
pub trait JobFeed: Send + Sync {
    /// Stable source tag stored in `jobs.source`.
    fn source(&self) -> &'static str;

    /// Runs the feed's fixed search for `country` and maps the results.
    async fn fetch(&self, country: &str) -> Result<FeedBatch, ProviderError>;
}

/// Maps raw results one by one; a bad entry never sinks the rest.
pub(crate) fn map_each(
    source: &str,
    raws: Vec<Value>,
    mut map: impl FnMut(Value) -> Result<NormalizedJob, ProviderError>,
) -> FeedBatch {
    let mut batch = FeedBatch::default();
    for raw in raws {
        match map(raw) {
            Ok(job) => batch.jobs.push(job),
            Err(e) => {
                warn!("Skipping malformed {source} posting: {e}");
                batch.malformed += 1;
            }
        }
    }
    batch
}

/// Shared HTTP client for all feeds.
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(concat!("jobboard-api/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Builds every feed that is both enabled and has credentials.
pub fn build_feeds(
    config: &AutomationConfig,
    credentials: &ProviderCredentials,
    client: Client,
) -> Vec<Arc<dyn JobFeed>> {
    let mut feeds: Vec<Arc<dyn JobFeed>> = Vec::new();

    if config.enable_adzuna {
        match (&credentials.adzuna_app_id, &credentials.adzuna_app_key) {
            (Some(id), Some(key)) => feeds.push(Arc::new(adzuna::AdzunaFeed::new(
                client.clone(),
                id.clone(),
                key.clone(),
            ))),
            _ => warn!("Adzuna enabled but ADZUNA_APP_ID/ADZUNA_APP_KEY are not set; skipping"),
        }
    }

    if config.enable_jsearch {
        match &credentials.rapidapi_key {
            Some(key) => feeds.push(Arc::new(jsearch::JSearchFeed::new(client.clone(), key.clone()))),
            None => warn!("JSearch enabled but RAPIDAPI_KEY is not set; skipping"),
        }
    }

    if config.enable_google_jobs {
        match &credentials.serpapi_key {
            Some(key) => feeds.push(Arc::new(google_jobs::GoogleJobsFeed::new(
                client.clone(),
                key.clone(),
            ))),
            None => warn!("Google Jobs enabled but SERPAPI_KEY is not set; skipping"),
        }
    }

    if config.enable_jooble {
        match &credentials.jooble_api_key {
            Some(key) => feeds.push(Arc::new(jooble::JoobleFeed::new(client, key.clone()))),
            None => warn!("Jooble enabled but JOOBLE_API_KEY is not set; skipping"),
        }
    }

    info!(
        "Job feeds configured: [{}]",
        feeds.iter().map(|f| f.source()).collect::<Vec<_>>().join(", ")
    );
    feeds
}

/// Turns a non-2xx response into `ProviderError::Api`.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        message: body.chars().take(500).collect(),
    })
}

const COMMON_SKILLS: &[&str] = &[
    "JavaScript", "TypeScript", "Python", "Java", "Rust", "Go", "React", "Node.js", "Angular",
    "Vue.js", "SQL", "PostgreSQL", "MongoDB", "Redis", "GraphQL", "REST API", "Git", "AWS",
    "Docker", "Kubernetes", "Microservices",
];

/// Picks well-known skills out of free text, for feeds that don't list any.
pub fn extract_skills(title: &str, description: &str) -> Vec<String> {
    let text = format!("{title} {description}").to_lowercase();
    COMMON_SKILLS
        .iter()
        .filter(|skill| contains_word(&text, &skill.to_lowercase()))
        .map(|s| s.to_string())
        .collect()
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    let is_word = |c: Option<char>| c.map(|c| c.is_alphanumeric()).unwrap_or(false);
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !is_word(before) && !is_word(after)
    })
}

/// Lines of a description that read like requirements, at most five.
pub fn extract_requirements(description: &str) -> Vec<String> {
    const MARKERS: &[&str] = &["requirement", "qualification", "experience", "skill"];
    description
        .lines()
        .map(str::trim)
        .filter(|line| {
            let lower = line.to_lowercase();
            !line.is_empty() && MARKERS.iter().any(|m| lower.contains(m))
        })
        .take(5)
        .map(String::from)
        .collect()
}

pub fn currency_for(country: &str) -> &'static str {
    match country.to_ascii_uppercase().as_str() {
        "IN" => "INR",
        "GB" => "GBP",
        "AE" => "AED",
        "CA" => "CAD",
        "AU" => "AUD",
        _ => "USD",
    }
}

/// Accepts RFC 3339 and the zone-less `YYYY-MM-DDTHH:MM:SS` some feeds emit.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|n| n.and_utc())
        })
}

/// `"min - max CUR"` style display string when at least one bound is known.
pub fn format_salary(min: Option<f64>, max: Option<f64>, currency: &str) -> Option<String> {
    match (min, max) {
        (Some(lo), Some(hi)) => Some(format!("{lo:.0} - {hi:.0} {currency}")),
        (Some(lo), None) => Some(format!("{lo:.0}+ {currency}")),
        (None, Some(hi)) => Some(format!("up to {hi:.0} {currency}")),
        (None, None) => None,
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_skills_respects_word_boundaries() {
        let skills = extract_skills("Frontend engineer", "We use JavaScript and React daily");
        assert!(skills.contains(&"JavaScript".to_string()));
        assert!(skills.contains(&"React".to_string()));
        assert!(!skills.contains(&"Java".to_string()));
    }

    #[test]
    fn test_extract_requirements_limits_to_five() {
        let description = (0..8)
            .map(|i| format!("Requirement {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(extract_requirements(&description).len(), 5);
    }

    #[test]
    fn test_currency_lookup() {
        assert_eq!(currency_for("in"), "INR");
        assert_eq!(currency_for("BR"), "USD");
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2024-03-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-03-01T10:00:00.000").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_format_salary() {
        assert_eq!(
            format_salary(Some(1000.0), Some(2000.0), "INR").as_deref(),
            Some("1000 - 2000 INR")
        );
        assert_eq!(format_salary(None, None, "INR"), None);
    }

    #[test]
    fn test_map_each_skips_and_counts_failures() {
        let raws = vec![serde_json::json!({ "ok": true }), serde_json::json!({ "ok": false })];
        let batch = map_each("test", raws, |raw| {
            if raw["ok"].as_bool() == Some(true) {
                Ok(NormalizedJob {
                    title: "Rust Engineer".to_string(),
                    ..Default::default()
                })
            } else {
                Err(ProviderError::Api {
                    status: 200,
                    message: "bad entry".to_string(),
                })
            }
        });
        assert_eq!(batch.jobs.len(), 1);
        assert_eq!(batch.malformed, 1);
    }

    #[test]
    fn test_build_feeds_skips_missing_credentials() {
        let config = AutomationConfig::default();
        let credentials = ProviderCredentials {
            serpapi_key: Some("serp".into()),
            ..Default::default()
        };
        let feeds = build_feeds(&config, &credentials, Client::new());
        let sources: Vec<_> = feeds.iter().map(|f| f.source()).collect();
        assert_eq!(sources, vec!["google"]);
    }
}
