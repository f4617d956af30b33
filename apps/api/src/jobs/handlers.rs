use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::jobs::{self, CreateJobRequest, JobListQuery, UpdateJobRequest};
use crate::models::job::JobRow;
use crate::pagination::Page;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// GET /api/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Result<Json<ApiResponse<Page<JobRow>>>, AppError> {
    Ok(ApiResponse::ok(jobs::list_active(&state.db, &query).await?))
}

/// GET /api/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<JobRow>>, AppError> {
    Ok(ApiResponse::ok(jobs::find_job(&state.db, id).await?))
}

/// POST /api/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<JobRow>>), AppError> {
    let job = jobs::create_job(&state.db, req).await?;
    tracing::info!("Employer job {} created: {}", job.id, job.title);
    Ok((StatusCode::CREATED, ApiResponse::ok(job)))
}

/// PUT /api/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<ApiResponse<JobRow>>, AppError> {
    Ok(ApiResponse::ok(jobs::update_job(&state.db, id, req).await?))
}

/// DELETE /api/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    jobs::deactivate_job(&state.db, id, params.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
