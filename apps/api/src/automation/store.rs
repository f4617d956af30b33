use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::automation::dedup::DedupKey;
use crate::models::job::{JobRow, NormalizedJob, MANUAL_SOURCE};

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct JobTotals {
    pub total_jobs: i64,
    pub active_jobs: i64,
    pub external_jobs: i64,
    pub employer_jobs: i64,
    pub manual_jobs: i64,
    pub average_quality: Option<f64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SourceCount {
    pub source: String,
    pub active_jobs: i64,
}

/// Persistence used by the sync pipeline.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Existing posting with the same (source, source_id), or the same
    /// case-insensitive (title, company, location).
    async fn find_duplicate(&self, source: &str, job: &NormalizedJob) -> Result<Option<JobRow>>;

    async fn insert_external(
        &self,
        source: &str,
        job: &NormalizedJob,
        quality_score: Option<f64>,
        sector: Option<&str>,
    ) -> Result<Uuid>;

    /// Overwrites the mutable fields of a duplicate and reactivates it. A
    /// `None` score or sector keeps the stored value.
    async fn refresh_existing(
        &self,
        id: Uuid,
        job: &NormalizedJob,
        quality_score: Option<f64>,
        sector: Option<&str>,
    ) -> Result<()>;

    /// Deactivates active postings past their expiry date or older than `max_age`.
    async fn expire_stale(&self, now: DateTime<Utc>, max_age: Duration) -> Result<u64>;

    /// Employer postings created after `since` that have not been approved yet.
    async fn pending_employer_jobs(&self, since: DateTime<Utc>) -> Result<Vec<JobRow>>;

    async fn approve_employer_job(
        &self,
        id: Uuid,
        quality_score: Option<f64>,
        featured: bool,
        approved_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Active postings scored longest ago, never-scored ones first.
    async fn active_jobs_for_rescore(&self, limit: i64) -> Result<Vec<JobRow>>;

    /// Stamps `scored_at` even when both values are `None`.
    async fn set_quality(&self, id: Uuid, quality_score: Option<f64>, sector: Option<&str>) -> Result<()>;

    async fn totals(&self) -> Result<JobTotals>;

    async fn active_by_source(&self) -> Result<Vec<SourceCount>>;
}

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn find_duplicate(&self, source: &str, job: &NormalizedJob) -> Result<Option<JobRow>> {
        let key = DedupKey::from_incoming(job);
        Ok(sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM jobs
            WHERE ($2::text IS NOT NULL AND source = $1 AND source_id = $2)
               OR (lower(trim(title)) = $3
                   AND lower(trim(coalesce(company, ''))) = $4
                   AND lower(trim(coalesce(location, ''))) = $5)
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(source)
        .bind(job.source_id.as_deref())
        .bind(&key.title)
        .bind(&key.company)
        .bind(&key.location)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_external(
        &self,
        source: &str,
        job: &NormalizedJob,
        quality_score: Option<f64>,
        sector: Option<&str>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let source_id = job
            .source_id
            .clone()
            .unwrap_or_else(|| format!("ext-{id}"));
        let raw = json!({
            "source": source,
            "synced_at": Utc::now().to_rfc3339(),
            "posted_at": job.posted_at.map(|d| d.to_rfc3339()),
            "payload": job.raw,
        });

        sqlx::query(
            r#"
            INSERT INTO jobs
                (id, source, source_id, title, company, location, country, description,
                 requirements, apply_url, salary, salary_min, salary_max, salary_currency,
                 job_type, experience_level, skills, is_remote, is_hybrid, is_urgent,
                 is_featured, sector, quality_score, scored_at, is_active, raw_json)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, FALSE, FALSE, FALSE, $19, $20,
                    CASE WHEN $20 IS NULL THEN NULL ELSE NOW() END, TRUE, $21)
            "#,
        )
        .bind(id)
        .bind(source)
        .bind(source_id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.country)
        .bind(&job.description)
        .bind(&job.requirements)
        .bind(job.apply_url.as_deref())
        .bind(job.salary.as_deref())
        .bind(job.salary_min)
        .bind(job.salary_max)
        .bind(job.salary_currency.as_deref())
        .bind(job.job_type.as_deref())
        .bind(job.experience_level.as_deref())
        .bind(&job.skills)
        .bind(job.is_remote)
        .bind(sector)
        .bind(quality_score)
        .bind(raw)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn refresh_existing(
        &self,
        id: Uuid,
        job: &NormalizedJob,
        quality_score: Option<f64>,
        sector: Option<&str>,
    ) -> Result<()> {
        let raw = json!({
            "refreshed_at": Utc::now().to_rfc3339(),
            "payload": job.raw,
        });
        sqlx::query(
            r#"
            UPDATE jobs
            SET title = $2, description = $3, salary = $4, salary_min = $5, salary_max = $6,
                is_active = TRUE, raw_json = $7,
                quality_score = COALESCE($8, quality_score),
                scored_at = CASE WHEN $8 IS NULL THEN scored_at ELSE NOW() END,
                sector = COALESCE($9, sector),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(job.salary.as_deref())
        .bind(job.salary_min)
        .bind(job.salary_max)
        .bind(raw)
        .bind(quality_score)
        .bind(sector)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn expire_stale(&self, now: DateTime<Utc>, max_age: Duration) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET is_active = FALSE, updated_at = NOW()
            WHERE is_active = TRUE
              AND (expiry_date < $1 OR created_at < $2)
            "#,
        )
        .bind(now)
        .bind(now - max_age)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn pending_employer_jobs(&self, since: DateTime<Utc>) -> Result<Vec<JobRow>> {
        Ok(sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM jobs
            WHERE source = $1 AND is_active = TRUE AND approved_at IS NULL AND created_at >= $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(MANUAL_SOURCE)
        .bind(since)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn approve_employer_job(
        &self,
        id: Uuid,
        quality_score: Option<f64>,
        featured: bool,
        approved_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET approved_at = $2, quality_score = COALESCE($3, quality_score),
                scored_at = CASE WHEN $3 IS NULL THEN scored_at ELSE NOW() END,
                is_featured = is_featured OR $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(approved_at)
        .bind(quality_score)
        .bind(featured)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_jobs_for_rescore(&self, limit: i64) -> Result<Vec<JobRow>> {
        Ok(sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM jobs
            WHERE is_active = TRUE
            ORDER BY scored_at ASC NULLS FIRST, updated_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_quality(&self, id: Uuid, quality_score: Option<f64>, sector: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET quality_score = COALESCE($2, quality_score), sector = COALESCE($3, sector),
                scored_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(quality_score)
        .bind(sector)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn totals(&self) -> Result<JobTotals> {
        Ok(sqlx::query_as::<_, JobTotals>(
            r#"
            SELECT
                COUNT(*) AS total_jobs,
                COUNT(*) FILTER (WHERE is_active) AS active_jobs,
                COUNT(*) FILTER (WHERE source <> $1) AS external_jobs,
                COUNT(*) FILTER (WHERE source = $1 AND company_id IS NOT NULL) AS employer_jobs,
                COUNT(*) FILTER (WHERE source = $1 AND company_id IS NULL) AS manual_jobs,
                AVG(quality_score) FILTER (WHERE is_active) AS average_quality
            FROM jobs
            "#,
        )
        .bind(MANUAL_SOURCE)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn active_by_source(&self) -> Result<Vec<SourceCount>> {
        Ok(sqlx::query_as::<_, SourceCount>(
            r#"
            SELECT source, COUNT(*) AS active_jobs
            FROM jobs
            WHERE is_active = TRUE
            GROUP BY source
            ORDER BY source
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }
}
