//! Job applications and their status workflow.

use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::errors::{conflict_on_unique, AppError};
use crate::jobs::{find_job, find_owned_job};
use crate::models::application::{ApplicationRow, ApplicationStatus};
use crate::models::notification::NotificationKind;
use crate::notifications::{NewNotification, Notifier};
use crate::otp::code::is_valid_email;
use crate::pagination::{Page, PageParams};

pub mod handlers;

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyRequest {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub cover_letter: Option<String>,
    pub expected_salary: Option<String>,
    pub resume_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Applicant,
    Employer,
}

/// Who may move an application where. Final states never move; applicants
/// can only withdraw; employers can set anything but `submitted`/`withdrawn`.
pub fn check_transition(
    current: ApplicationStatus,
    next: ApplicationStatus,
    actor: Actor,
) -> Result<(), AppError> {
    if current.is_final() {
        return Err(AppError::Conflict(format!(
            "Application is already {}",
            current.as_str()
        )));
    }
    let allowed = match actor {
        Actor::Applicant => next == ApplicationStatus::Withdrawn,
        Actor::Employer => !matches!(
            next,
            ApplicationStatus::Submitted | ApplicationStatus::Withdrawn
        ),
    };
    if !allowed {
        return Err(AppError::Validation(format!(
            "Cannot change status to {}",
            next.as_str()
        )));
    }
    Ok(())
}

fn validate_application(req: &ApplyRequest) -> Result<(), AppError> {
    if req.full_name.trim().is_empty() {
        return Err(AppError::Validation("Full name is required".to_string()));
    }
    if !is_valid_email(req.email.trim()) {
        return Err(AppError::Validation("Invalid e-mail address".to_string()));
    }
    Ok(())
}

fn parse_status(raw: &str) -> Result<ApplicationStatus, AppError> {
    ApplicationStatus::parse(raw)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Unknown application status '{raw}'")))
}

pub async fn find_application(pool: &PgPool, id: Uuid) -> Result<ApplicationRow, AppError> {
    sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))
}

pub async fn apply(
    pool: &PgPool,
    notifier: &dyn Notifier,
    req: ApplyRequest,
) -> Result<ApplicationRow, AppError> {
    validate_application(&req)?;

    let job = find_job(pool, req.job_id).await?;
    if !job.is_active {
        return Err(AppError::Validation("This job is no longer accepting applications".to_string()));
    }

    if let Some(resume_id) = req.resume_id {
        let owner: Option<Uuid> = sqlx::query_scalar("SELECT user_id FROM resumes WHERE id = $1")
            .bind(resume_id)
            .fetch_optional(pool)
            .await?;
        if owner != Some(req.user_id) {
            return Err(AppError::Validation("Resume not found for this user".to_string()));
        }
    }

    let application = sqlx::query_as::<_, ApplicationRow>(
        r#"
        INSERT INTO applications
            (id, job_id, user_id, full_name, email, phone, cover_letter, expected_salary,
             resume_id, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.job_id)
    .bind(req.user_id)
    .bind(req.full_name.trim())
    .bind(req.email.trim().to_lowercase())
    .bind(&req.phone)
    .bind(&req.cover_letter)
    .bind(&req.expected_salary)
    .bind(req.resume_id)
    .bind(ApplicationStatus::Submitted.as_str())
    .fetch_one(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "Application for this job"))?;

    if let Some(employer) = job.created_by {
        let notification = NewNotification::new(
            employer,
            NotificationKind::JobApplicationReceived,
            "New application received",
            format!("{} applied for \"{}\".", application.full_name, job.title),
        )
        .with_data(json!({ "application_id": application.id, "job_id": job.id }));
        if let Err(e) = notifier.notify(notification).await {
            warn!("Failed to notify employer {employer} of application {}: {e}", application.id);
        }
    }

    Ok(application)
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    status: Option<ApplicationStatus>,
    params: PageParams,
) -> Result<Page<ApplicationRow>, AppError> {
    let status = status.map(|s| s.as_str());
    let rows = sqlx::query_as::<_, ApplicationRow>(
        r#"
        SELECT * FROM applications
        WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY applied_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(status)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM applications WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)",
    )
    .bind(user_id)
    .bind(status)
    .fetch_one(pool)
    .await?;

    Ok(Page::new(rows, total, params))
}

/// Applications for a job, visible to the employer who posted it.
pub async fn list_for_job(
    pool: &PgPool,
    job_id: Uuid,
    employer_id: Uuid,
) -> Result<Vec<ApplicationRow>, AppError> {
    find_owned_job(pool, job_id, employer_id).await?;
    Ok(sqlx::query_as::<_, ApplicationRow>(
        "SELECT * FROM applications WHERE job_id = $1 ORDER BY applied_at DESC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?)
}

async fn set_status(
    pool: &PgPool,
    id: Uuid,
    current: ApplicationStatus,
    next: ApplicationStatus,
) -> Result<ApplicationRow, AppError> {
    sqlx::query_as::<_, ApplicationRow>(
        r#"
        UPDATE applications SET status = $3, updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(current.as_str())
    .bind(next.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Conflict("Application changed concurrently, reload and retry".to_string()))
}

/// Employer moves an application along and the applicant is told.
pub async fn update_status(
    pool: &PgPool,
    notifier: &dyn Notifier,
    id: Uuid,
    employer_id: Uuid,
    next: ApplicationStatus,
) -> Result<ApplicationRow, AppError> {
    let application = find_application(pool, id).await?;
    let job = find_owned_job(pool, application.job_id, employer_id).await?;
    let current = parse_status(&application.status)?;
    check_transition(current, next, Actor::Employer)?;

    let updated = set_status(pool, id, current, next).await?;

    let kind = if next == ApplicationStatus::Interview {
        NotificationKind::InterviewScheduled
    } else {
        NotificationKind::ApplicationUpdate
    };
    let notification = NewNotification::new(
        updated.user_id,
        kind,
        "Application update",
        format!("Your application for \"{}\" is now {}.", job.title, next.as_str()),
    )
    .with_data(json!({ "application_id": id, "job_id": job.id, "status": next }));
    if let Err(e) = notifier.notify(notification).await {
        warn!("Failed to notify applicant {} about application {id}: {e}", updated.user_id);
    }

    Ok(updated)
}

pub async fn withdraw(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<ApplicationRow, AppError> {
    let application = find_application(pool, id).await?;
    if application.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    let current = parse_status(&application.status)?;
    check_transition(current, ApplicationStatus::Withdrawn, Actor::Applicant)?;
    set_status(pool, id, current, ApplicationStatus::Withdrawn).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employer_can_progress_application() {
        assert!(check_transition(
            ApplicationStatus::Submitted,
            ApplicationStatus::Shortlisted,
            Actor::Employer
        )
        .is_ok());
        assert!(check_transition(
            ApplicationStatus::Interview,
            ApplicationStatus::Hired,
            Actor::Employer
        )
        .is_ok());
    }

    #[test]
    fn test_employer_cannot_withdraw_or_reset() {
        for next in [ApplicationStatus::Withdrawn, ApplicationStatus::Submitted] {
            assert!(matches!(
                check_transition(ApplicationStatus::Reviewed, next, Actor::Employer),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_applicant_can_only_withdraw() {
        assert!(check_transition(
            ApplicationStatus::Shortlisted,
            ApplicationStatus::Withdrawn,
            Actor::Applicant
        )
        .is_ok());
        assert!(check_transition(
            ApplicationStatus::Submitted,
            ApplicationStatus::Hired,
            Actor::Applicant
        )
        .is_err());
    }

    #[test]
    fn test_final_states_do_not_move() {
        assert!(matches!(
            check_transition(
                ApplicationStatus::Rejected,
                ApplicationStatus::Interview,
                Actor::Employer
            ),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            check_transition(
                ApplicationStatus::Withdrawn,
                ApplicationStatus::Withdrawn,
                Actor::Applicant
            ),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_application_validation() {
        let mut req = ApplyRequest {
            job_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            full_name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: None,
            cover_letter: None,
            expected_salary: None,
            resume_id: None,
        };
        assert!(validate_application(&req).is_ok());
        req.email = "jane".to_string();
        assert!(validate_application(&req).is_err());
    }
}
