use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{
    check_status, currency_for, extract_requirements, extract_skills, format_salary, map_each,
    non_empty, parse_timestamp, FeedBatch, JobFeed, ProviderError,
};
use crate::models::job::NormalizedJob;

const BASE_URL: &str = "https://api.adzuna.com/v1/api/jobs";
const QUERY: &str = "software engineer";
const RESULTS_PER_PAGE: u32 = 50;

pub struct AdzunaFeed {
    client: Client,
    app_id: String,
    app_key: String,
}

impl AdzunaFeed {
    pub fn new(client: Client, app_id: String, app_key: String) -> Self {
        Self {
            client,
            app_id,
            app_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct AdzunaJob {
    id: Option<Value>,
    title: Option<String>,
    description: Option<String>,
    created: Option<String>,
    redirect_url: Option<String>,
    company: Option<DisplayName>,
    location: Option<DisplayName>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    contract_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DisplayName {
    display_name: Option<String>,
}

#[async_trait]
impl JobFeed for AdzunaFeed {
    fn source(&self) -> &'static str {
        "adzuna"
    }

    async fn fetch(&self, country: &str) -> Result<FeedBatch, ProviderError> {
        let url = format!("{BASE_URL}/{}/search/1", country.to_lowercase());
        let per_page = RESULTS_PER_PAGE.to_string();
        let response = self
            .client
            .get(url)
            .query(&[
                ("app_id", self.app_id.as_str()),
                ("app_key", self.app_key.as_str()),
                ("what", QUERY),
                ("results_per_page", per_page.as_str()),
                ("content-type", "application/json"),
            ])
            .send()
            .await?;

        let body: SearchResponse = check_status(response).await?.json().await?;
        debug!("Adzuna returned {} results", body.results.len());
        Ok(map_results(body.results, country))
    }
}

fn map_results(raws: Vec<Value>, country: &str) -> FeedBatch {
    map_each("adzuna", raws, |raw| map_job(raw, country))
}

fn map_job(raw: Value, country: &str) -> Result<NormalizedJob, ProviderError> {
    let job: AdzunaJob = serde_json::from_value(raw.clone())?;
    let title = non_empty(job.title.as_deref()).unwrap_or_else(|| "Job Title".to_string());
    let description = job.description.unwrap_or_default();
    let currency = currency_for(country);

    Ok(NormalizedJob {
        source_id: job.id.as_ref().and_then(id_to_string),
        skills: extract_skills(&title, &description),
        requirements: extract_requirements(&description),
        company: job
            .company
            .and_then(|c| c.display_name)
            .unwrap_or_else(|| "Company".to_string()),
        location: job
            .location
            .and_then(|l| l.display_name)
            .unwrap_or_default(),
        country: country.to_uppercase(),
        apply_url: job.redirect_url,
        salary: format_salary(job.salary_min, job.salary_max, currency),
        salary_min: job.salary_min,
        salary_max: job.salary_max,
        salary_currency: Some(currency.to_string()),
        job_type: job.contract_time,
        experience_level: None,
        is_remote: title.to_lowercase().contains("remote"),
        posted_at: job.created.as_deref().and_then(parse_timestamp),
        title,
        description,
        raw,
    })
}

pub(super) fn id_to_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bad_result_does_not_drop_good_ones() {
        let raws = vec![
            json!({ "id": "1", "title": "Rust Engineer", "salary_min": 50000.0 }),
            json!({ "id": "2", "title": "Go Engineer", "salary_min": "50000" }),
        ];
        let batch = map_results(raws, "IN");
        assert_eq!(batch.jobs.len(), 1);
        assert_eq!(batch.jobs[0].source_id.as_deref(), Some("1"));
        assert_eq!(batch.malformed, 1);
    }

    #[test]
    fn test_map_full_result() {
        let raw = json!({
            "id": "4316385062",
            "title": "Remote Rust Engineer",
            "description": "Build services in Rust and PostgreSQL.\nExperience with Docker required.",
            "created": "2024-05-02T08:15:00Z",
            "redirect_url": "https://www.adzuna.in/details/4316385062",
            "company": { "display_name": "Acme Labs" },
            "location": { "display_name": "Bengaluru, Karnataka" },
            "salary_min": 1200000.0,
            "salary_max": 1800000.0,
            "contract_time": "full_time"
        });

        let job = map_job(raw, "IN").unwrap();
        assert_eq!(job.source_id.as_deref(), Some("4316385062"));
        assert_eq!(job.company, "Acme Labs");
        assert_eq!(job.location, "Bengaluru, Karnataka");
        assert_eq!(job.salary_currency.as_deref(), Some("INR"));
        assert!(job.is_remote);
        assert!(job.posted_at.is_some());
        assert!(job.skills.contains(&"Rust".to_string()));
        assert_eq!(job.requirements.len(), 1);
    }

    #[test]
    fn test_map_sparse_result_uses_placeholders() {
        let job = map_job(json!({ "id": 17 }), "GB").unwrap();
        assert_eq!(job.source_id.as_deref(), Some("17"));
        assert_eq!(job.title, "Job Title");
        assert_eq!(job.company, "Company");
        assert_eq!(job.salary, None);
        assert_eq!(job.salary_currency.as_deref(), Some("GBP"));
    }
}
