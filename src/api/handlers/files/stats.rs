use crate::AppState;
use crate::api::error::AppError;
use crate::services::file_service::FileStats;
use crate::utils::auth::Claims;
use axum::{Extension, Json, extract::State};

#[utoipa::path(
    get,
    path = "/files/stats",
    responses(
        (status = 200, description = "Active files per category", body = FileStats),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Administrators only")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "files"
)]
pub async fn file_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FileStats>, AppError> {
    if !claims.principal().is_admin() {
        return Err(AppError::Forbidden(
            "File statistics are available to administrators only".to_string(),
        ));
    }

    let stats = state.file_service.stats_by_category().await?;
    Ok(Json(stats))
}
