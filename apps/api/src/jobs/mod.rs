//! Job postings: public listing and employer CRUD.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::automation::categorize::categorize;
use crate::automation::quality::{compute_quality_score, QualitySignals};
use crate::errors::AppError;
use crate::models::job::{JobRow, MANUAL_SOURCE};
use crate::models::user::{User, UserRole};
use crate::pagination::{Page, PageParams};

pub mod handlers;

const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateJobRequest {
    /// Posting employer.
    pub user_id: Uuid,
    pub company_id: Option<Uuid>,
    pub company: Option<String>,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub apply_url: Option<String>,
    pub salary: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub is_remote: bool,
    #[serde(default)]
    pub is_hybrid: bool,
    #[serde(default)]
    pub is_urgent: bool,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateJobRequest {
    pub user_id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub apply_url: Option<String>,
    pub salary: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub skills: Option<Vec<String>>,
    pub is_remote: Option<bool>,
    pub is_hybrid: Option<bool>,
    pub is_urgent: Option<bool>,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    /// Free text over title, company and description.
    pub q: Option<String>,
    pub location: Option<String>,
    pub sector: Option<String>,
    pub job_type: Option<String>,
    pub remote: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let len = title.trim().chars().count();
    if len == 0 {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if len > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "Title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_salary_range(min: Option<f64>, max: Option<f64>) -> Result<(), AppError> {
    match (min, max) {
        (Some(lo), _) if lo < 0.0 => Err(AppError::Validation("Salary cannot be negative".to_string())),
        (Some(lo), Some(hi)) if lo > hi => Err(AppError::Validation(
            "salary_min cannot exceed salary_max".to_string(),
        )),
        _ => Ok(()),
    }
}

pub fn validate_new_job(req: &CreateJobRequest) -> Result<(), AppError> {
    validate_title(&req.title)?;
    if req.description.trim().is_empty() {
        return Err(AppError::Validation("Description is required".to_string()));
    }
    validate_salary_range(req.salary_min, req.salary_max)
}

pub fn validate_job_update(req: &UpdateJobRequest, current: &JobRow) -> Result<(), AppError> {
    if let Some(title) = &req.title {
        validate_title(title)?;
    }
    if matches!(&req.description, Some(d) if d.trim().is_empty()) {
        return Err(AppError::Validation("Description cannot be empty".to_string()));
    }
    validate_salary_range(
        req.salary_min.or(current.salary_min),
        req.salary_max.or(current.salary_max),
    )
}

pub async fn find_job(pool: &PgPool, id: Uuid) -> Result<JobRow, AppError> {
    sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

/// Loads the job and checks that `user_id` posted it.
pub async fn find_owned_job(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<JobRow, AppError> {
    let job = find_job(pool, id).await?;
    if job.created_by != Some(user_id) {
        return Err(AppError::Forbidden);
    }
    Ok(job)
}

pub async fn list_active(pool: &PgPool, query: &JobListQuery) -> Result<Page<JobRow>, AppError> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let text = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));
    let location = query.location.as_deref().map(|l| format!("%{}%", l.trim()));

    const FILTER: &str = r#"
        WHERE is_active = TRUE
          AND ($1::text IS NULL OR title ILIKE $1 OR company ILIKE $1 OR description ILIKE $1)
          AND ($2::text IS NULL OR location ILIKE $2)
          AND ($3::text IS NULL OR sector = $3)
          AND ($4::text IS NULL OR job_type = $4)
          AND ($5::bool IS NULL OR is_remote = $5)
    "#;

    let rows = sqlx::query_as::<_, JobRow>(&format!(
        "SELECT * FROM jobs {FILTER} ORDER BY is_featured DESC, created_at DESC LIMIT $6 OFFSET $7"
    ))
    .bind(&text)
    .bind(&location)
    .bind(query.sector.as_deref())
    .bind(query.job_type.as_deref())
    .bind(query.remote)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM jobs {FILTER}"))
        .bind(&text)
        .bind(&location)
        .bind(query.sector.as_deref())
        .bind(query.job_type.as_deref())
        .bind(query.remote)
        .fetch_one(pool)
        .await?;

    Ok(Page::new(rows, total, params))
}

/// Creates an employer posting. It starts unapproved; the sync pipeline
/// approves it on its next run.
pub async fn create_job(pool: &PgPool, req: CreateJobRequest) -> Result<JobRow, AppError> {
    validate_new_job(&req)?;

    let author = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(req.user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", req.user_id)))?;
    if author.role != UserRole::Employer.as_str() && author.role != UserRole::Admin.as_str() {
        return Err(AppError::Forbidden);
    }

    let company_name = match req.company_id {
        Some(company_id) => Some(
            sqlx::query_scalar::<_, String>("SELECT name FROM companies WHERE id = $1")
                .bind(company_id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Company {company_id} not found")))?,
        ),
        None => req.company.clone(),
    };

    let score = compute_quality_score(QualitySignals {
        title: &req.title,
        description: &req.description,
        company: company_name.as_deref().unwrap_or(""),
        location: req.location.as_deref().unwrap_or(""),
        salary: req.salary.as_deref(),
        salary_min: req.salary_min,
        salary_max: req.salary_max,
        skills: &req.skills,
    });
    let sector = categorize(&req.title, &req.description, &req.skills);

    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs
            (id, source, title, company, company_id, created_by, location, country, description,
             requirements, apply_url, salary, salary_min, salary_max, salary_currency, job_type,
             experience_level, skills, is_remote, is_hybrid, is_urgent, is_featured, sector,
             quality_score, scored_at, is_active, expiry_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'IN', $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, FALSE, $21, $22, NOW(), TRUE, $23)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(MANUAL_SOURCE)
    .bind(req.title.trim())
    .bind(company_name)
    .bind(req.company_id)
    .bind(req.user_id)
    .bind(&req.location)
    .bind(&req.description)
    .bind(&req.requirements)
    .bind(&req.apply_url)
    .bind(&req.salary)
    .bind(req.salary_min)
    .bind(req.salary_max)
    .bind(&req.salary_currency)
    .bind(&req.job_type)
    .bind(&req.experience_level)
    .bind(&req.skills)
    .bind(req.is_remote)
    .bind(req.is_hybrid)
    .bind(req.is_urgent)
    .bind(sector)
    .bind(score)
    .bind(req.expiry_date)
    .fetch_one(pool)
    .await?)
}

pub async fn update_job(pool: &PgPool, id: Uuid, req: UpdateJobRequest) -> Result<JobRow, AppError> {
    let current = find_owned_job(pool, id, req.user_id).await?;
    validate_job_update(&req, &current)?;

    let mut merged = current.clone();
    if let Some(title) = &req.title {
        merged.title = title.trim().to_string();
    }
    if let Some(description) = &req.description {
        merged.description = description.clone();
    }
    if req.location.is_some() {
        merged.location = req.location.clone();
    }
    if req.salary.is_some() {
        merged.salary = req.salary.clone();
    }
    merged.salary_min = req.salary_min.or(merged.salary_min);
    merged.salary_max = req.salary_max.or(merged.salary_max);
    if let Some(skills) = &req.skills {
        merged.skills = skills.clone();
    }
    let score = compute_quality_score(QualitySignals::from(&merged));

    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs SET
            title = $2, description = $3, location = $4, salary = $5, salary_min = $6,
            salary_max = $7, skills = $8,
            requirements = COALESCE($9, requirements),
            apply_url = COALESCE($10, apply_url),
            job_type = COALESCE($11, job_type),
            experience_level = COALESCE($12, experience_level),
            is_remote = COALESCE($13, is_remote),
            is_hybrid = COALESCE($14, is_hybrid),
            is_urgent = COALESCE($15, is_urgent),
            expiry_date = COALESCE($16, expiry_date),
            quality_score = $17,
            scored_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&merged.title)
    .bind(&merged.description)
    .bind(&merged.location)
    .bind(&merged.salary)
    .bind(merged.salary_min)
    .bind(merged.salary_max)
    .bind(&merged.skills)
    .bind(&req.requirements)
    .bind(&req.apply_url)
    .bind(&req.job_type)
    .bind(&req.experience_level)
    .bind(req.is_remote)
    .bind(req.is_hybrid)
    .bind(req.is_urgent)
    .bind(req.expiry_date)
    .bind(score)
    .fetch_one(pool)
    .await?)
}

/// Soft delete: the posting is deactivated, applications keep their job.
pub async fn deactivate_job(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    find_owned_job(pool, id, user_id).await?;
    sqlx::query("UPDATE jobs SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
