use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{
    check_status, extract_requirements, extract_skills, format_salary, map_each, non_empty,
    parse_timestamp, FeedBatch, JobFeed, ProviderError,
};
use crate::models::job::NormalizedJob;

const SEARCH_URL: &str = "https://jsearch.p.rapidapi.com/search";
const RAPIDAPI_HOST: &str = "jsearch.p.rapidapi.com";
const QUERY: &str = "developer";

pub struct JSearchFeed {
    client: Client,
    api_key: String,
}

impl JSearchFeed {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JSearchJob {
    job_id: Option<String>,
    job_title: Option<String>,
    employer_name: Option<String>,
    job_city: Option<String>,
    job_state: Option<String>,
    job_country: Option<String>,
    job_description: Option<String>,
    job_apply_link: Option<String>,
    job_posted_at_datetime_utc: Option<String>,
    job_employment_type: Option<String>,
    job_is_remote: Option<bool>,
    job_min_salary: Option<f64>,
    job_max_salary: Option<f64>,
    job_salary_currency: Option<String>,
    job_highlights: Option<Highlights>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Highlights {
    #[serde(rename = "Qualifications")]
    qualifications: Vec<String>,
}

#[async_trait]
impl JobFeed for JSearchFeed {
    fn source(&self) -> &'static str {
        "jsearch"
    }

    async fn fetch(&self, country: &str) -> Result<FeedBatch, ProviderError> {
        let country_param = country.to_lowercase();
        let response = self
            .client
            .get(SEARCH_URL)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", RAPIDAPI_HOST)
            .query(&[
                ("query", QUERY),
                ("page", "1"),
                ("num_pages", "1"),
                ("country", country_param.as_str()),
            ])
            .send()
            .await?;

        let body: SearchResponse = check_status(response).await?.json().await?;
        debug!("JSearch returned {} results", body.data.len());
        Ok(map_results(body.data, country))
    }
}

fn map_results(raws: Vec<Value>, country: &str) -> FeedBatch {
    map_each("jsearch", raws, |raw| map_job(raw, country))
}

fn map_job(raw: Value, country: &str) -> Result<NormalizedJob, ProviderError> {
    let job: JSearchJob = serde_json::from_value(raw.clone())?;
    let title = non_empty(job.job_title.as_deref()).unwrap_or_else(|| "Job Title".to_string());
    let description = job.job_description.unwrap_or_default();

    let location = match (non_empty(job.job_city.as_deref()), non_empty(job.job_state.as_deref())) {
        (Some(city), Some(state)) => format!("{city}, {state}"),
        (Some(one), None) | (None, Some(one)) => one,
        (None, None) => job.job_country.clone().unwrap_or_default(),
    };

    let qualifications = job
        .job_highlights
        .map(|h| h.qualifications)
        .unwrap_or_default();
    let requirements = if qualifications.is_empty() {
        extract_requirements(&description)
    } else {
        qualifications
    };

    let currency = job
        .job_salary_currency
        .clone()
        .unwrap_or_else(|| "USD".to_string());

    Ok(NormalizedJob {
        source_id: non_empty(job.job_id.as_deref()),
        skills: extract_skills(&title, &description),
        requirements,
        company: non_empty(job.employer_name.as_deref()).unwrap_or_else(|| "Company".to_string()),
        location,
        country: job
            .job_country
            .unwrap_or_else(|| country.to_string())
            .to_uppercase(),
        apply_url: job.job_apply_link,
        salary: format_salary(job.job_min_salary, job.job_max_salary, &currency),
        salary_min: job.job_min_salary,
        salary_max: job.job_max_salary,
        salary_currency: Some(currency),
        job_type: job.job_employment_type,
        experience_level: None,
        is_remote: job.job_is_remote.unwrap_or(false),
        posted_at: job
            .job_posted_at_datetime_utc
            .as_deref()
            .and_then(parse_timestamp),
        title,
        description,
        raw,
    })
}
