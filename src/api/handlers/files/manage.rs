use crate::AppState;
use crate::api::error::AppError;
use crate::models::FileRecord;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use validator::Validate;

use super::types::{DeleteQuery, DeleteResponse, UpdateFileRequest};

#[utoipa::path(
    put,
    path = "/files/{id}",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    request_body = UpdateFileRequest,
    responses(
        (status = 200, description = "Updated record", body = FileRecord),
        (status = 400, description = "Invalid metadata"),
        (status = 403, description = "Not the owner or an administrator"),
        (status = 404, description = "File not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn update_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFileRequest>,
) -> Result<Json<FileRecord>, AppError> {
    req.validate()?;

    let record = state
        .file_service
        .update(&id, req.into(), &claims.principal())
        .await?;

    Ok(Json(record))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(
        ("id" = String, Path, description = "File ID"),
        DeleteQuery
    ),
    responses(
        (status = 200, description = "File deleted", body = DeleteResponse),
        (status = 403, description = "Not the owner or an administrator"),
        (status = 404, description = "File not found"),
        (status = 500, description = "File could not be removed from disk; record kept")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    let principal = claims.principal();
    let permanent = query.permanent.unwrap_or(false);

    let message = if permanent {
        state.file_service.permanent_delete(&id, &principal).await?;
        "File permanently deleted"
    } else {
        state.file_service.soft_delete(&id, &principal).await?;
        "File moved to trash"
    };

    Ok(Json(DeleteResponse {
        id,
        permanent,
        message: message.to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/files/{id}/restore",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "Restored record", body = FileRecord),
        (status = 403, description = "Not the owner or an administrator"),
        (status = 404, description = "File not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn restore_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<FileRecord>, AppError> {
    let record = state
        .file_service
        .restore(&id, &claims.principal())
        .await?;

    Ok(Json(record))
}
