use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::models::notification::{NotificationKind, NotificationRow};
use crate::notifications::{self, NotificationFilter, NotificationList};
use crate::pagination::PageParams;
use crate::state::AppState;

// Kept flat: serde(flatten) cannot parse numbers out of query strings.
#[derive(Deserialize)]
pub struct ListNotificationsQuery {
    pub user_id: Uuid,
    #[serde(default)]
    pub unread_only: bool,
    #[serde(rename = "type")]
    pub kind: Option<NotificationKind>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct UserIdBody {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// GET /api/notifications
pub async fn handle_list_notifications(
    State(state): State<AppState>,
    Query(params): Query<ListNotificationsQuery>,
) -> Result<Json<ApiResponse<NotificationList>>, AppError> {
    let filter = NotificationFilter {
        unread_only: params.unread_only,
        kind: params.kind,
    };
    let page = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let list = notifications::list_for_user(&state.db, params.user_id, &filter, page).await?;
    Ok(ApiResponse::ok(list))
}

/// PATCH /api/notifications/:id/read
pub async fn handle_mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UserIdBody>,
) -> Result<Json<ApiResponse<NotificationRow>>, AppError> {
    let row = notifications::mark_read(&state.db, id, body.user_id).await?;
    Ok(ApiResponse::ok(row))
}

/// POST /api/notifications/read-all
pub async fn handle_mark_all_read(
    State(state): State<AppState>,
    Json(body): Json<UserIdBody>,
) -> Result<Json<ApiResponse<MarkAllReadResponse>>, AppError> {
    let updated = notifications::mark_all_read(&state.db, body.user_id).await?;
    Ok(ApiResponse::ok(MarkAllReadResponse { updated }))
}
