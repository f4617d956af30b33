use axum::{extract::State, Json};
use serde::Serialize;

use crate::automation::system::{AutomationStatus, SyncReport};
use crate::errors::{ApiResponse, AppError};
use crate::routes::admin::AdminGuard;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SchedulerToggle {
    pub running: bool,
    /// False when the scheduler was already in the requested state.
    pub changed: bool,
}

/// GET /api/admin/automation/status
pub async fn handle_status(
    _admin: AdminGuard,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AutomationStatus>>, AppError> {
    Ok(ApiResponse::ok(state.automation.status().await?))
}

/// POST /api/admin/automation/run
/// Runs a sync and waits for its report. 409 when another run holds the lock.
pub async fn handle_run_now(
    _admin: AdminGuard,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SyncReport>>, AppError> {
    match state.automation.run_detached().await? {
        Some(report) => Ok(ApiResponse::ok(report)),
        None => Err(AppError::Conflict("A job sync is already running".to_string())),
    }
}

/// POST /api/admin/automation/start
pub async fn handle_start(
    _admin: AdminGuard,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SchedulerToggle>>, AppError> {
    let changed = state.automation.start().await?;
    Ok(ApiResponse::ok(SchedulerToggle {
        running: true,
        changed,
    }))
}

/// POST /api/admin/automation/stop
pub async fn handle_stop(
    _admin: AdminGuard,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SchedulerToggle>>, AppError> {
    let changed = state.automation.stop().await?;
    Ok(ApiResponse::ok(SchedulerToggle {
        running: false,
        changed,
    }))
}
