use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::applications::{self, ApplyRequest};
use crate::errors::{ApiResponse, AppError};
use crate::models::application::{ApplicationRow, ApplicationStatus};
use crate::pagination::{Page, PageParams};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListApplicationsQuery {
    pub user_id: Uuid,
    pub status: Option<ApplicationStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct EmployerQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub user_id: Uuid,
    pub status: ApplicationStatus,
}

#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub user_id: Uuid,
}

/// POST /api/applications
pub async fn handle_apply(
    State(state): State<AppState>,
    Json(req): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ApplicationRow>>), AppError> {
    let application = applications::apply(&state.db, state.notifier.as_ref(), req).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(application)))
}

/// GET /api/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    Query(query): Query<ListApplicationsQuery>,
) -> Result<Json<ApiResponse<Page<ApplicationRow>>>, AppError> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = applications::list_for_user(&state.db, query.user_id, query.status, params).await?;
    Ok(ApiResponse::ok(page))
}

/// GET /api/jobs/:id/applications
pub async fn handle_list_job_applications(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<EmployerQuery>,
) -> Result<Json<ApiResponse<Vec<ApplicationRow>>>, AppError> {
    let rows = applications::list_for_job(&state.db, job_id, query.user_id).await?;
    Ok(ApiResponse::ok(rows))
}

/// PATCH /api/applications/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<ApiResponse<ApplicationRow>>, AppError> {
    let updated = applications::update_status(
        &state.db,
        state.notifier.as_ref(),
        id,
        req.user_id,
        req.status,
    )
    .await?;
    Ok(ApiResponse::ok(updated))
}

/// POST /api/applications/:id/withdraw
pub async fn handle_withdraw(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<ApiResponse<ApplicationRow>>, AppError> {
    let updated = applications::withdraw(&state.db, id, req.user_id).await?;
    Ok(ApiResponse::ok(updated))
}
