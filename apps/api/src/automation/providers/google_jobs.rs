use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{
    check_status, extract_requirements, extract_skills, map_each, non_empty, FeedBatch, JobFeed,
    ProviderError,
};
use crate::models::job::NormalizedJob;

/// Google Jobs results are fetched through SerpApi.
const SEARCH_URL: &str = "https://serpapi.com/search.json";
const QUERY: &str = "software engineer";

pub struct GoogleJobsFeed {
    client: Client,
    api_key: String,
}

impl GoogleJobsFeed {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    jobs_results: Vec<Value>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GoogleJob {
    job_id: Option<String>,
    title: Option<String>,
    company_name: Option<String>,
    location: Option<String>,
    description: Option<String>,
    detected_extensions: Option<Extensions>,
    apply_options: Vec<ApplyOption>,
    share_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Extensions {
    schedule_type: Option<String>,
    salary: Option<String>,
    work_from_home: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApplyOption {
    link: Option<String>,
}

#[async_trait]
impl JobFeed for GoogleJobsFeed {
    fn source(&self) -> &'static str {
        "google"
    }

    async fn fetch(&self, country: &str) -> Result<FeedBatch, ProviderError> {
        let gl = country.to_lowercase();
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("engine", "google_jobs"),
                ("q", QUERY),
                ("gl", gl.as_str()),
                ("hl", "en"),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let body: SearchResponse = check_status(response).await?.json().await?;
        if let Some(message) = body.error {
            // SerpApi reports an empty search as an error with a 200 status.
            if message.contains("hasn't returned any results") {
                return Ok(FeedBatch::default());
            }
            return Err(ProviderError::Api {
                status: 200,
                message,
            });
        }
        debug!("Google Jobs returned {} results", body.jobs_results.len());
        Ok(map_results(body.jobs_results, country))
    }
}

fn map_results(raws: Vec<Value>, country: &str) -> FeedBatch {
    map_each("google", raws, |raw| map_job(raw, country))
}

fn map_job(raw: Value, country: &str) -> Result<NormalizedJob, ProviderError> {
    let job: GoogleJob = serde_json::from_value(raw.clone())?;
    let title = non_empty(job.title.as_deref()).unwrap_or_else(|| "Job Title".to_string());
    let description = job.description.unwrap_or_default();
    let extensions = job.detected_extensions.unwrap_or_default();

    let apply_url = job
        .apply_options
        .into_iter()
        .find_map(|o| o.link)
        .or(job.share_link);

    Ok(NormalizedJob {
        source_id: non_empty(job.job_id.as_deref()),
        skills: extract_skills(&title, &description),
        requirements: extract_requirements(&description),
        company: non_empty(job.company_name.as_deref())
            .unwrap_or_else(|| "Company Not Listed".to_string()),
        location: job.location.map(|l| l.trim().to_string()).unwrap_or_default(),
        country: country.to_uppercase(),
        apply_url,
        salary: non_empty(extensions.salary.as_deref()),
        salary_min: None,
        salary_max: None,
        salary_currency: None,
        job_type: extensions.schedule_type,
        experience_level: None,
        is_remote: extensions.work_from_home.unwrap_or(false),
        posted_at: None,
        title,
        description,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bad_result_does_not_drop_good_ones() {
        let raws = vec![
            json!({ "job_id": "ok", "title": "Rust Engineer" }),
            json!({ "job_id": "bad", "title": 42 }),
        ];
        let batch = map_results(raws, "IN");
        assert_eq!(batch.jobs.len(), 1);
        assert_eq!(batch.jobs[0].source_id.as_deref(), Some("ok"));
        assert_eq!(batch.malformed, 1);
    }

    #[test]
    fn test_map_prefers_apply_option_link() {
        let raw = json!({
            "job_id": "eyJqb2JfdGl0bGUi",
            "title": "Software Engineer II",
            "company_name": "Initech",
            "location": "  Hyderabad, Telangana ",
            "description": "Kubernetes and Go.",
            "detected_extensions": {
                "schedule_type": "Full-time",
                "salary": "₹15L–₹25L a year",
                "work_from_home": true
            },
            "apply_options": [
                { "title": "LinkedIn" },
                { "title": "Company site", "link": "https://initech.example/jobs/1" }
            ],
            "share_link": "https://www.google.com/search?ibp=htl;jobs"
        });

        let job = map_job(raw, "IN").unwrap();
        assert_eq!(job.apply_url.as_deref(), Some("https://initech.example/jobs/1"));
        assert_eq!(job.location, "Hyderabad, Telangana");
        assert_eq!(job.salary.as_deref(), Some("₹15L–₹25L a year"));
        assert!(job.is_remote);
        assert!(job.skills.contains(&"Kubernetes".to_string()));
    }

    #[test]
    fn test_map_without_company() {
        let job = map_job(json!({ "title": "Analyst" }), "IN").unwrap();
        assert_eq!(job.company, "Company Not Listed");
        assert_eq!(job.apply_url, None);
    }
}
