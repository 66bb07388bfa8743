use crate::config::AppConfig;
use crate::services::{ingestion::IngestionService, storage::StorageService};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod delete;
pub mod metadata;
pub mod query;
pub mod types;
pub mod upload;

pub use types::{
    CategoryStats, FileFilter, FilePage, FilePatch, FileStats, NewFileMeta, PageRequest,
    Pagination, StatsTotals,
};
pub use upload::{UploadBatch, UploadSource};

/// Registry of uploaded files: records, lifecycle transitions and queries.
pub struct FileService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    ingestion: IngestionService,
    config: AppConfig,
}

impl FileService {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, config: AppConfig) -> Self {
        let ingestion = IngestionService::new(storage.clone(), config.public_base_path.clone());
        Self {
            db,
            storage,
            ingestion,
            config,
        }
    }
}
