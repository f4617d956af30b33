use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::accounts::{self, CreateCompanyRequest, RegisterUserRequest};
use crate::errors::{ApiResponse, AppError};
use crate::models::company::CompanyRow;
use crate::models::user::User;
use crate::pagination::{Page, PageParams};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CompanyListQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// POST /api/users
pub async fn handle_register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), AppError> {
    let user = accounts::register_user(&state.db, state.notifier.as_ref(), req).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(user)))
}

/// GET /api/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    Ok(ApiResponse::ok(accounts::find_user(&state.db, id).await?))
}

/// POST /api/companies
pub async fn handle_create_company(
    State(state): State<AppState>,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CompanyRow>>), AppError> {
    let company = accounts::create_company(&state.db, req).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(company)))
}

/// GET /api/companies
pub async fn handle_list_companies(
    State(state): State<AppState>,
    Query(query): Query<CompanyListQuery>,
) -> Result<Json<ApiResponse<Page<CompanyRow>>>, AppError> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    Ok(ApiResponse::ok(
        accounts::list_companies(&state.db, query.q.as_deref(), params).await?,
    ))
}

/// GET /api/companies/:id
pub async fn handle_get_company(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CompanyRow>>, AppError> {
    Ok(ApiResponse::ok(accounts::find_company(&state.db, id).await?))
}
