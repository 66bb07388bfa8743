use crate::AppState;
use crate::api::error::AppError;
use crate::models::{Category, FileRecord, Principal};
use crate::services::file_service::NewFileMeta;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, Query, State, multipart::MultipartError},
    http::StatusCode,
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

use super::types::UploadQuery;

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

fn optional_text(text: String) -> Option<String> {
    Some(text).filter(|t| !t.trim().is_empty())
}

/// Streams every file part of the form to disk and registers them together.
async fn receive_upload(
    state: &AppState,
    principal: &Principal,
    query: UploadQuery,
    multipart: &mut Multipart,
    max_files: Option<usize>,
) -> Result<Vec<FileRecord>, AppError> {
    let started = match query.category.as_deref() {
        Some(raw) => raw.parse::<Category>().map_err(AppError::from),
        None => Ok(Category::default()),
    }
    .and_then(|category| state.file_service.begin_upload(principal, category));

    let mut batch = match started {
        Ok(batch) => batch,
        Err(e) => {
            drain_remaining(multipart, &e).await;
            return Err(e);
        }
    };
    if let Some(max_files) = max_files {
        batch = batch.limit_files(max_files);
    }
    let mut meta = NewFileMeta::default();

    let result: Result<(), AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                "file" | "files" => {
                    let original_name = field.file_name().unwrap_or("unnamed").to_string();
                    let content_type = field.content_type().map(|s| s.to_string());

                    let body_with_io_error = field.map_err(std::io::Error::other);
                    let reader = StreamReader::new(body_with_io_error);

                    batch
                        .add(&original_name, content_type.as_deref(), reader)
                        .await?;
                }
                "category" => {
                    let text = field.text().await.map_err(multipart_error)?;
                    batch.set_category(text.parse::<Category>()?)?;
                }
                "description" => {
                    meta.description = optional_text(field.text().await.map_err(multipart_error)?);
                }
                "tags" => {
                    meta.tags.push(field.text().await.map_err(multipart_error)?);
                }
                "associatedEntityType" => {
                    meta.associated_entity_type =
                        optional_text(field.text().await.map_err(multipart_error)?);
                }
                "associatedEntityId" => {
                    meta.associated_entity_id =
                        optional_text(field.text().await.map_err(multipart_error)?);
                }
                other => tracing::debug!("Ignoring form field '{}'", other),
            }
        }
        Ok(())
    }
    .await;

    match result {
        Ok(()) => batch.commit(meta).await,
        Err(e) => {
            batch.abort().await;
            drain_remaining(multipart, &e).await;
            Err(e)
        }
    }
}

/// Reads the rest of the body so the client sees the error instead of a reset.
async fn drain_remaining(multipart: &mut Multipart, error: &AppError) {
    tracing::warn!("Upload failed early: {}. Consuming remaining stream...", error);
    while let Ok(Some(mut field)) = multipart.next_field().await {
        while let Ok(Some(_)) = field.chunk().await {}
    }
}

#[utoipa::path(
    post,
    path = "/files/upload",
    params(UploadQuery),
    request_body(content = Multipart, description = "One `file` part plus optional category, description, tags, associatedEntityType, associatedEntityId"),
    responses(
        (status = 201, description = "File stored and registered", body = FileRecord),
        (status = 400, description = "Invalid form or metadata"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Uploader lacks the admin or editor role"),
        (status = 413, description = "File exceeds the category size limit"),
        (status = 415, description = "File type not allowed in the category")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileRecord>), AppError> {
    let principal = claims.principal();
    let mut records = receive_upload(&state, &principal, query, &mut multipart, Some(1)).await?;
    let record = records
        .pop()
        .ok_or_else(|| AppError::Internal("Upload produced no record".to_string()))?;

    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    post,
    path = "/files/upload/multiple",
    params(UploadQuery),
    request_body(content = Multipart, description = "Several `files` parts plus optional shared metadata"),
    responses(
        (status = 201, description = "All files stored and registered", body = Vec<FileRecord>),
        (status = 400, description = "Invalid form, metadata or too many files"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Uploader lacks the admin or editor role"),
        (status = 413, description = "A file exceeds the category size limit"),
        (status = 415, description = "A file type is not allowed in the category")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn upload_multiple(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<FileRecord>>), AppError> {
    let principal = claims.principal();
    let records = receive_upload(&state, &principal, query, &mut multipart, None).await?;

    Ok((StatusCode::CREATED, Json(records)))
}
