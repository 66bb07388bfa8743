use crate::config::AppConfig;
use crate::models::Category;
use crate::services::storage::{LocalStorageService, StorageService};
use std::sync::Arc;
use tracing::info;

/// Creates the upload root and one directory per category. Runs once at
/// startup and may be repeated without effect.
pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<dyn StorageService>> {
    info!("📁 Upload root: {}", config.upload_root.display());

    tokio::fs::create_dir_all(&config.upload_root).await?;
    let storage = LocalStorageService::new(&config.upload_root);

    for category in Category::ALL {
        storage.ensure_dir(category.as_str()).await?;
    }

    info!(
        "✅ Upload directories ready ({} categories)",
        Category::ALL.len()
    );

    Ok(Arc::new(storage))
}
