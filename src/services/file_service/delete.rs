use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::{FileRecord, Principal};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};

use super::FileService;

impl FileService {
    async fn set_active(
        &self,
        id: &str,
        principal: &Principal,
        is_active: bool,
    ) -> Result<FileRecord, AppError> {
        let model = self.find_model(id).await?;
        self.authorize(principal, &model)?;

        if model.is_active == is_active {
            return self.record_of(model).await;
        }

        let mut active: uploaded_files::ActiveModel = model.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.db).await?;

        tracing::info!(
            "File {} {} by {}",
            updated.id,
            if is_active { "restored" } else { "soft-deleted" },
            principal.id
        );

        self.record_of(updated).await
    }

    /// Hides the record from default listings. The file stays on disk.
    pub async fn soft_delete(&self, id: &str, principal: &Principal) -> Result<FileRecord, AppError> {
        self.set_active(id, principal, false).await
    }

    pub async fn restore(&self, id: &str, principal: &Principal) -> Result<FileRecord, AppError> {
        self.set_active(id, principal, true).await
    }

    /// Removes the file from disk, then the record and its tags.
    ///
    /// A missing file is not an error. Any other removal failure keeps the
    /// record so the file is never orphaned without its metadata.
    pub async fn permanent_delete(&self, id: &str, principal: &Principal) -> Result<(), AppError> {
        let model = self.find_model(id).await?;
        self.authorize(principal, &model)?;

        match self.storage.remove(&model.relative_path).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                "File {} was already missing from disk at {}",
                model.id,
                model.relative_path
            ),
            Err(e) => {
                tracing::error!("Failed to remove {}: {}", model.relative_path, e);
                return Err(e.into());
            }
        }

        let txn = self.db.begin().await?;
        FileTags::delete_many()
            .filter(file_tags::Column::FileId.eq(&model.id))
            .exec(&txn)
            .await?;
        UploadedFiles::delete_by_id(model.id.clone())
            .exec(&txn)
            .await?;
        txn.commit().await?;

        tracing::info!("File {} permanently deleted by {}", model.id, principal.id);

        Ok(())
    }
}
