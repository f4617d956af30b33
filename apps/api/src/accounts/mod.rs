//! Users and companies.

use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::errors::{conflict_on_unique, AppError};
use crate::models::company::CompanyRow;
use crate::models::notification::NotificationKind;
use crate::models::user::{User, UserRole};
use crate::notifications::{NewNotification, Notifier};
use crate::otp::code::{is_valid_email, normalize_phone};
use crate::pagination::{Page, PageParams};

pub mod handlers;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCompanyRequest {
    pub user_id: Uuid,
    pub name: String,
    pub website: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub industry: Option<String>,
}

/// Normalized registration values: lowercased e-mail, digits-only phone and
/// a role that is never `admin`.
pub fn normalize_registration(
    req: &RegisterUserRequest,
) -> Result<(String, Option<String>, UserRole), AppError> {
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid e-mail address".to_string()));
    }
    let phone = match req.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => Some(normalize_phone(raw).ok_or_else(|| {
            AppError::Validation("Phone number must have 10 to 15 digits".to_string())
        })?),
        None => None,
    };
    let role = match req.role.unwrap_or(UserRole::Jobseeker) {
        UserRole::Admin => return Err(AppError::Forbidden),
        role => role,
    };
    Ok((email, phone, role))
}

pub async fn register_user(
    pool: &PgPool,
    notifier: &dyn Notifier,
    req: RegisterUserRequest,
) -> Result<User, AppError> {
    let (email, phone, role) = normalize_registration(&req)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, name, phone, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(req.name.as_deref().map(str::trim))
    .bind(phone)
    .bind(role.as_str())
    .fetch_one(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "User with this e-mail"))?;

    let notification = NewNotification::new(
        user.id,
        NotificationKind::Welcome,
        "Welcome to Job Board",
        "Your account is ready. Upload a resume to start applying.",
    )
    .with_data(json!({ "role": role }));
    if let Err(e) = notifier.notify(notification).await {
        warn!("Failed to send welcome notification to {}: {e}", user.id);
    }

    Ok(user)
}

pub async fn find_user(pool: &PgPool, id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
}

pub async fn create_company(pool: &PgPool, req: CreateCompanyRequest) -> Result<CompanyRow, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Company name is required".to_string()));
    }
    let owner = find_user(pool, req.user_id).await?;
    if owner.role == UserRole::Jobseeker.as_str() {
        return Err(AppError::Forbidden);
    }

    sqlx::query_as::<_, CompanyRow>(
        r#"
        INSERT INTO companies (id, name, website, description, location, industry, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(&req.website)
    .bind(&req.description)
    .bind(&req.location)
    .bind(&req.industry)
    .bind(req.user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| conflict_on_unique(e, "Company"))
}

pub async fn find_company(pool: &PgPool, id: Uuid) -> Result<CompanyRow, AppError> {
    sqlx::query_as::<_, CompanyRow>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {id} not found")))
}

pub async fn list_companies(
    pool: &PgPool,
    search: Option<&str>,
    params: PageParams,
) -> Result<Page<CompanyRow>, AppError> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let rows = sqlx::query_as::<_, CompanyRow>(
        r#"
        SELECT * FROM companies
        WHERE ($1::text IS NULL OR name ILIKE $1)
        ORDER BY name
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&pattern)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM companies WHERE ($1::text IS NULL OR name ILIKE $1)")
            .bind(&pattern)
            .fetch_one(pool)
            .await?;

    Ok(Page::new(rows, total, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, phone: Option<&str>, role: Option<UserRole>) -> RegisterUserRequest {
        RegisterUserRequest {
            email: email.to_string(),
            name: Some("Jane".to_string()),
            phone: phone.map(String::from),
            role,
        }
    }

    #[test]
    fn test_registration_defaults_to_jobseeker() {
        let (email, phone, role) =
            normalize_registration(&request(" Jane@Example.com ", None, None)).unwrap();
        assert_eq!(email, "jane@example.com");
        assert_eq!(phone, None);
        assert_eq!(role, UserRole::Jobseeker);
    }

    #[test]
    fn test_registration_normalizes_phone() {
        let (_, phone, role) = normalize_registration(&request(
            "boss@acme.io",
            Some("+91 98765 43210"),
            Some(UserRole::Employer),
        ))
        .unwrap();
        assert_eq!(phone.as_deref(), Some("919876543210"));
        assert_eq!(role, UserRole::Employer);
    }

    #[test]
    fn test_cannot_self_register_as_admin() {
        let err = normalize_registration(&request("a@b.co", None, Some(UserRole::Admin))).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[test]
    fn test_bad_contact_details() {
        assert!(normalize_registration(&request("nope", None, None)).is_err());
        assert!(normalize_registration(&request("a@b.co", Some("123"), None)).is_err());
    }
}
