pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::file_service::FileService;
use crate::services::storage::StorageService;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::files::upload::upload_file,
        api::handlers::files::upload::upload_multiple,
        api::handlers::files::list::list_files,
        api::handlers::files::list::get_file,
        api::handlers::files::manage::update_file,
        api::handlers::files::manage::delete_file,
        api::handlers::files::manage::restore_file,
        api::handlers::files::stats::file_stats,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            models::FileRecord,
            models::Category,
            api::handlers::files::UpdateFileRequest,
            api::handlers::files::TagsInput,
            api::handlers::files::DeleteResponse,
            services::file_service::FilePage,
            services::file_service::Pagination,
            services::file_service::FileStats,
            services::file_service::CategoryStats,
            services::file_service::StatsTotals,
            api::handlers::health::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "files", description = "Uploaded file management endpoints"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub file_service: Arc<FileService>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, config: AppConfig) -> Self {
        let file_service = Arc::new(FileService::new(db.clone(), storage.clone(), config.clone()));
        Self {
            db,
            storage,
            file_service,
            config,
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(api::middleware::request_id::REQUEST_ID_HEADER),
        ])
}

pub fn create_app(state: AppState) -> Router {
    let auth = from_fn_with_state(state.clone(), api::middleware::auth::auth_middleware);

    let files = Router::new()
        .route("/files", get(api::handlers::files::list_files))
        .route("/files/stats", get(api::handlers::files::file_stats))
        .route(
            "/files/upload",
            post(api::handlers::files::upload_file),
        )
        .route(
            "/files/upload/multiple",
            post(api::handlers::files::upload_multiple),
        )
        .route(
            "/files/:id",
            get(api::handlers::files::get_file)
                .put(api::handlers::files::update_file)
                .delete(api::handlers::files::delete_file),
        )
        .route(
            "/files/:id/restore",
            post(api::handlers::files::restore_file),
        )
        .layer(auth);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .merge(files)
        .nest_service(
            &state.config.public_base_path,
            ServeDir::new(&state.config.upload_root),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_request_size,
        ))
        .with_state(state)
}
