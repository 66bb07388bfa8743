use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::{FileRecord, Principal};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::HashMap;

use super::upload::{clean_optional, prepare_tags, replace_tags};
use super::{FileService, types::FilePatch};

/// Tags for each of `file_ids`, sorted.
pub(super) async fn load_tags<C>(
    conn: &C,
    file_ids: &[String],
) -> Result<HashMap<String, Vec<String>>, AppError>
where
    C: ConnectionTrait,
{
    let mut by_file: HashMap<String, Vec<String>> = HashMap::new();
    if file_ids.is_empty() {
        return Ok(by_file);
    }

    let rows = FileTags::find()
        .filter(file_tags::Column::FileId.is_in(file_ids.iter().cloned()))
        .order_by_asc(file_tags::Column::Tag)
        .all(conn)
        .await?;

    for row in rows {
        by_file.entry(row.file_id).or_default().push(row.tag);
    }
    Ok(by_file)
}

pub(super) async fn to_records<C>(
    conn: &C,
    models: Vec<uploaded_files::Model>,
) -> Result<Vec<FileRecord>, AppError>
where
    C: ConnectionTrait,
{
    let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
    let mut tags = load_tags(conn, &ids).await?;

    models
        .into_iter()
        .map(|model| {
            let file_tags = tags.remove(&model.id).unwrap_or_default();
            FileRecord::from_model(model, file_tags).map_err(|e| AppError::Internal(e.to_string()))
        })
        .collect()
}

/// `Some("")` clears, `Some(text)` sets, `None` keeps the current value.
fn patch_optional(current: Option<String>, patch: Option<String>) -> Option<String> {
    match patch {
        Some(value) => clean_optional(Some(value)),
        None => current,
    }
}

impl FileService {
    pub(super) async fn find_model(&self, id: &str) -> Result<uploaded_files::Model, AppError> {
        UploadedFiles::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File '{}' not found", id)))
    }

    pub(super) fn authorize(
        &self,
        principal: &Principal,
        model: &uploaded_files::Model,
    ) -> Result<(), AppError> {
        if principal.can_manage(&model.owner_id) {
            Ok(())
        } else {
            tracing::warn!(
                "{} is not allowed to modify file {} owned by {}",
                principal.id,
                model.id,
                model.owner_id
            );
            Err(AppError::Forbidden(
                "Only the owner or an administrator may modify this file".to_string(),
            ))
        }
    }

    pub(super) async fn record_of(&self, model: uploaded_files::Model) -> Result<FileRecord, AppError> {
        let mut records = to_records(&self.db, vec![model]).await?;
        records
            .pop()
            .ok_or_else(|| AppError::Internal("Record conversion lost the file".to_string()))
    }

    /// Fetches a record whether or not it is active.
    pub async fn get(&self, id: &str) -> Result<FileRecord, AppError> {
        let model = self.find_model(id).await?;
        self.record_of(model).await
    }

    pub async fn update(
        &self,
        id: &str,
        patch: FilePatch,
        principal: &Principal,
    ) -> Result<FileRecord, AppError> {
        let model = self.find_model(id).await?;
        self.authorize(principal, &model)?;

        let tags = patch.tags.as_deref().map(prepare_tags).transpose()?;

        let description = patch_optional(model.description.clone(), patch.description);
        let entity_type =
            patch_optional(model.associated_entity_type.clone(), patch.associated_entity_type);
        let entity_id =
            patch_optional(model.associated_entity_id.clone(), patch.associated_entity_id);

        let txn = self.db.begin().await?;

        let mut active: uploaded_files::ActiveModel = model.into();
        active.description = Set(description);
        active.associated_entity_type = Set(entity_type);
        active.associated_entity_id = Set(entity_id);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        if let Some(tags) = &tags {
            replace_tags(&txn, &updated.id, tags).await?;
        }

        let mut records = to_records(&txn, vec![updated]).await?;
        txn.commit().await?;

        records
            .pop()
            .ok_or_else(|| AppError::Internal("Record conversion lost the file".to_string()))
    }
}
