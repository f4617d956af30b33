use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::adzuna::id_to_string;
use super::{
    check_status, extract_requirements, extract_skills, map_each, non_empty, parse_timestamp,
    FeedBatch, JobFeed, ProviderError,
};
use crate::models::job::NormalizedJob;

const BASE_URL: &str = "https://jooble.org/api";
const KEYWORDS: &str = "developer";

pub struct JoobleFeed {
    client: Client,
    api_key: String,
}

impl JoobleFeed {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    jobs: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JoobleJob {
    id: Option<Value>,
    title: Option<String>,
    location: Option<String>,
    snippet: Option<String>,
    salary: Option<String>,
    #[serde(rename = "type")]
    job_type: Option<String>,
    link: Option<String>,
    company: Option<String>,
    updated: Option<String>,
}

#[async_trait]
impl JobFeed for JoobleFeed {
    fn source(&self) -> &'static str {
        "jooble"
    }

    async fn fetch(&self, country: &str) -> Result<FeedBatch, ProviderError> {
        let url = format!("{BASE_URL}/{}", self.api_key);
        let response = self
            .client
            .post(url)
            .json(&json!({
                "keywords": KEYWORDS,
                "location": location_for(country),
            }))
            .send()
            .await?;

        let body: SearchResponse = check_status(response).await?.json().await?;
        debug!("Jooble returned {} results", body.jobs.len());
        Ok(map_results(body.jobs, country))
    }
}

fn map_results(raws: Vec<Value>, country: &str) -> FeedBatch {
    map_each("jooble", raws, |raw| map_job(raw, country))
}

fn location_for(country: &str) -> &'static str {
    match country.to_ascii_uppercase().as_str() {
        "IN" => "India",
        "US" => "United States",
        "GB" => "United Kingdom",
        "AE" => "United Arab Emirates",
        "CA" => "Canada",
        "AU" => "Australia",
        _ => "",
    }
}

/// Jooble snippets carry inline HTML highlighting.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ").trim().to_string()
}

fn map_job(raw: Value, country: &str) -> Result<NormalizedJob, ProviderError> {
    let job: JoobleJob = serde_json::from_value(raw.clone())?;
    let title = non_empty(job.title.as_deref().map(strip_tags).as_deref())
        .unwrap_or_else(|| "Job Title".to_string());
    let description = job.snippet.as_deref().map(strip_tags).unwrap_or_default();

    Ok(NormalizedJob {
        source_id: job.id.as_ref().and_then(id_to_string),
        skills: extract_skills(&title, &description),
        requirements: extract_requirements(&description),
        company: non_empty(job.company.as_deref()).unwrap_or_else(|| "Company".to_string()),
        location: job.location.unwrap_or_default(),
        country: country.to_uppercase(),
        apply_url: job.link,
        salary: non_empty(job.salary.as_deref()),
        salary_min: None,
        salary_max: None,
        salary_currency: None,
        job_type: non_empty(job.job_type.as_deref()),
        experience_level: None,
        is_remote: title.to_lowercase().contains("remote"),
        posted_at: job.updated.as_deref().and_then(parse_timestamp),
        title,
        description,
        raw,
    })
}
