use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::{ApiResponse, AppError};
use crate::models::notification::NotificationKind;
use crate::models::resume::ResumeRow;
use crate::notifications::NewNotification;
use crate::resumes::{self, ResumeUpload};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// POST /api/resumes (multipart: `user_id`, `file`)
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<ResumeRow>>), AppError> {
    let mut user_id: Option<Uuid> = None;
    let mut file: Option<(String, Option<String>, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("user_id") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid user_id field: {e}")))?;
                user_id = Some(
                    raw.trim()
                        .parse()
                        .map_err(|_| AppError::Validation("user_id must be a UUID".to_string()))?,
                );
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("resume").to_string();
                let content_type = field.content_type().map(String::from);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
                file = Some((file_name, content_type, data));
            }
            _ => {}
        }
    }

    let user_id = user_id.ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;
    let (file_name, content_type, data) =
        file.ok_or_else(|| AppError::Validation("file is required".to_string()))?;

    let resume = resumes::store_resume(
        &state.db,
        state.resume_storage.as_ref(),
        ResumeUpload {
            user_id,
            file_name,
            content_type,
            data,
        },
    )
    .await?;

    let notification = NewNotification::new(
        user_id,
        NotificationKind::ResumeUploaded,
        "Resume uploaded",
        format!("{} was uploaded successfully.", resume.file_name),
    )
    .with_data(json!({ "resume_id": resume.id }));
    if let Err(e) = state.notifier.notify(notification).await {
        tracing::warn!("Failed to record resume upload notification: {e}");
    }

    Ok((StatusCode::CREATED, ApiResponse::ok(resume)))
}

/// GET /api/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ApiResponse<Vec<ResumeRow>>>, AppError> {
    Ok(ApiResponse::ok(
        resumes::list_for_user(&state.db, params.user_id).await?,
    ))
}

/// GET /api/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ApiResponse<ResumeRow>>, AppError> {
    Ok(ApiResponse::ok(
        resumes::find_owned(&state.db, id, params.user_id).await?,
    ))
}

/// DELETE /api/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    resumes::delete_resume(&state.db, state.resume_storage.as_ref(), id, params.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
