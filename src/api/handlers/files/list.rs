use crate::AppState;
use crate::api::error::AppError;
use crate::models::{Category, FileRecord};
use crate::services::file_service::{FileFilter, FilePage, PageRequest};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use validator::Validate;

use super::types::ListFilesQuery;

#[utoipa::path(
    get,
    path = "/files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "Page of files, newest first", body = FilePage),
        (status = 400, description = "Invalid filter or pagination"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<FilePage>, AppError> {
    query.validate()?;
    let principal = claims.principal();

    let category = query
        .category
        .as_deref()
        .map(str::parse::<Category>)
        .transpose()?;
    let is_active = query.is_active.unwrap_or(true);

    // Soft-deleted files of other members stay hidden from non-admins
    let owner_id = if !is_active && !principal.is_admin() {
        Some(principal.id.clone())
    } else {
        query.owner_id.clone()
    };

    let filter = FileFilter {
        category,
        owner_id,
        associated_entity_type: query.associated_entity_type.clone(),
        associated_entity_id: query.associated_entity_id.clone(),
        tags: query.tag_list(),
        is_active,
    };
    let page = PageRequest {
        page: query.page,
        page_size: query.page_size,
    };

    let result = state.file_service.list(filter, page).await?;
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File record", body = FileRecord),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn get_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<FileRecord>, AppError> {
    let record = state.file_service.get(&id).await?;

    if !record.is_active && !claims.principal().can_manage(&record.owner_id) {
        return Err(AppError::NotFound(format!("File '{}' not found", id)));
    }

    Ok(Json(record))
}
