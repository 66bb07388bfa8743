use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::{Category, FileDraft, FileRecord, Principal};
use crate::services::ingestion::IngestRequest;
use crate::services::storage::resolve_under;
use crate::utils::validation::{normalize_tags, validate_tags};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, TransactionTrait};
use tokio::io::AsyncRead;
use tokio::runtime::Handle;
use uuid::Uuid;

use super::{FileService, types::NewFileMeta};

/// One file of a programmatic upload.
pub struct UploadSource<R> {
    pub original_name: String,
    pub declared_mime: Option<String>,
    pub reader: R,
}

/// Files written for one request that are not persisted yet. Either
/// `commit` turns all of them into records or every file is removed again.
pub struct UploadBatch<'s> {
    service: &'s FileService,
    owner: Principal,
    category: Category,
    max_files: Option<usize>,
    drafts: Vec<FileDraft>,
}

/// Trims optional text, treating blank input as absent.
pub(super) fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(super) fn prepare_tags(raw: &[String]) -> Result<Vec<String>, AppError> {
    let mut tags = normalize_tags(raw);
    tags.sort();
    validate_tags(&tags).map_err(|e| AppError::Validation(e.message))?;
    Ok(tags)
}

pub(super) async fn replace_tags<C>(conn: &C, file_id: &str, tags: &[String]) -> Result<(), AppError>
where
    C: ConnectionTrait,
{
    use sea_orm::{ColumnTrait, QueryFilter};

    FileTags::delete_many()
        .filter(file_tags::Column::FileId.eq(file_id))
        .exec(conn)
        .await?;

    if !tags.is_empty() {
        FileTags::insert_many(tags.iter().map(|tag| file_tags::ActiveModel {
            file_id: Set(file_id.to_string()),
            tag: Set(tag.clone()),
        }))
        .exec_without_returning(conn)
        .await?;
    }

    Ok(())
}

async fn insert_record<C>(
    conn: &C,
    draft: FileDraft,
    owner_id: &str,
    meta: &NewFileMeta,
    tags: Vec<String>,
) -> Result<FileRecord, AppError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let model = uploaded_files::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        stored_name: Set(draft.stored_name),
        original_name: Set(draft.original_name),
        relative_path: Set(draft.relative_path),
        public_url: Set(draft.public_url),
        size_bytes: Set(draft.size_bytes),
        mime_type: Set(draft.mime_type),
        category: Set(draft.category.as_str().to_string()),
        owner_id: Set(owner_id.to_string()),
        associated_entity_type: Set(clean_optional(meta.associated_entity_type.clone())),
        associated_entity_id: Set(clean_optional(meta.associated_entity_id.clone())),
        description: Set(clean_optional(meta.description.clone())),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    replace_tags(conn, &model.id, &tags).await?;

    FileRecord::from_model(model, tags).map_err(|e| AppError::Internal(e.to_string()))
}

impl FileService {
    fn validate_draft(&self, draft: &FileDraft, owner_id: &str) -> Result<(), AppError> {
        let missing = [
            ("owner", owner_id),
            ("stored name", draft.stored_name.as_str()),
            ("relative path", draft.relative_path.as_str()),
            ("original name", draft.original_name.as_str()),
            ("MIME type", draft.mime_type.as_str()),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());

        if let Some((field, _)) = missing {
            return Err(AppError::Validation(format!("File {} is required", field)));
        }

        let expected = format!("{}/{}", draft.category.as_str(), draft.stored_name);
        if draft.relative_path != expected
            || resolve_under(self.storage.root(), &draft.relative_path).is_err()
        {
            return Err(AppError::Validation(format!(
                "Relative path '{}' does not match category '{}'",
                draft.relative_path, draft.category
            )));
        }

        Ok(())
    }

    /// Persists one ingested file as a new active record owned by `owner`.
    pub async fn create(
        &self,
        draft: FileDraft,
        owner: &Principal,
        meta: NewFileMeta,
    ) -> Result<FileRecord, AppError> {
        let mut records = self.create_many(vec![draft], owner, meta).await?;
        records
            .pop()
            .ok_or_else(|| AppError::Internal("Insert returned no record".to_string()))
    }

    /// Persists several drafts in one transaction: all records or none.
    pub async fn create_many(
        &self,
        drafts: Vec<FileDraft>,
        owner: &Principal,
        meta: NewFileMeta,
    ) -> Result<Vec<FileRecord>, AppError> {
        for draft in &drafts {
            self.validate_draft(draft, &owner.id)?;
        }
        let tags = prepare_tags(&meta.tags)?;

        let txn = self.db.begin().await?;
        let mut records = Vec::with_capacity(drafts.len());
        for draft in drafts {
            records.push(insert_record(&txn, draft, &owner.id, &meta, tags.clone()).await?);
        }
        txn.commit().await?;

        Ok(records)
    }

    /// Starts an upload on behalf of `principal`, who must be an admin or editor.
    pub fn begin_upload(
        &self,
        principal: &Principal,
        category: Category,
    ) -> Result<UploadBatch<'_>, AppError> {
        if !principal.can_upload() {
            return Err(AppError::Forbidden(
                "Uploading files requires the admin or editor role".to_string(),
            ));
        }

        Ok(UploadBatch {
            service: self,
            owner: principal.clone(),
            category,
            max_files: None,
            drafts: Vec::new(),
        })
    }

    /// Ingests and records `files` as a unit.
    pub async fn upload<R>(
        &self,
        principal: &Principal,
        category: Category,
        files: Vec<UploadSource<R>>,
        meta: NewFileMeta,
    ) -> Result<Vec<FileRecord>, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut batch = self.begin_upload(principal, category)?;
        for file in files {
            batch
                .add(&file.original_name, file.declared_mime.as_deref(), file.reader)
                .await?;
        }
        batch.commit(meta).await
    }
}

impl UploadBatch<'_> {
    /// Caps the batch below the category's own per-request limit.
    pub fn limit_files(mut self, max_files: usize) -> Self {
        self.max_files = Some(max_files);
        self
    }

    fn max_files(&self) -> usize {
        let policy_max = self.category.policy().max_files_per_request;
        self.max_files.map_or(policy_max, |m| m.min(policy_max))
    }

    /// The category is fixed once the first file has been written.
    pub fn set_category(&mut self, category: Category) -> Result<(), AppError> {
        if !self.drafts.is_empty() && category != self.category {
            return Err(AppError::BadRequest(
                "The category field must be sent before any file".to_string(),
            ));
        }
        self.category = category;
        Ok(())
    }

    /// Streams one file to disk. On failure every file of the batch is removed.
    pub async fn add<R>(
        &mut self,
        original_name: &str,
        declared_mime: Option<&str>,
        reader: R,
    ) -> Result<(), AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let max_files = self.max_files();
        if self.drafts.len() >= max_files {
            self.discard_all().await;
            return Err(AppError::Validation(format!(
                "At most {} file(s) may be uploaded to '{}' in one request",
                max_files, self.category
            )));
        }

        let request = IngestRequest {
            category: self.category,
            original_name,
            declared_mime,
        };
        match self.service.ingestion.ingest(request, reader).await {
            Ok(draft) => {
                self.drafts.push(draft);
                Ok(())
            }
            Err(e) => {
                self.discard_all().await;
                Err(e)
            }
        }
    }

    pub async fn commit(mut self, meta: NewFileMeta) -> Result<Vec<FileRecord>, AppError> {
        if self.drafts.is_empty() {
            return Err(AppError::Validation("No file was provided".to_string()));
        }

        // Ownership of the files moves to the records from here on
        let drafts = std::mem::take(&mut self.drafts);
        match self
            .service
            .create_many(drafts.clone(), &self.owner, meta)
            .await
        {
            Ok(records) => {
                tracing::info!(
                    "Registered {} file(s) in '{}' for {}",
                    records.len(),
                    self.category,
                    self.owner.id
                );
                Ok(records)
            }
            Err(e) => {
                tracing::warn!("Discarding {} unpersisted upload(s)", drafts.len());
                self.service.ingestion.discard(&drafts).await;
                Err(e)
            }
        }
    }

    /// Drops the batch, removing whatever was written so far.
    pub async fn abort(mut self) {
        self.discard_all().await;
    }

    async fn discard_all(&mut self) {
        if self.drafts.is_empty() {
            return;
        }
        tracing::warn!("Discarding {} unpersisted upload(s)", self.drafts.len());
        let drafts = std::mem::take(&mut self.drafts);
        self.service.ingestion.discard(&drafts).await;
    }
}

impl Drop for UploadBatch<'_> {
    /// Covers a request future dropped mid-upload, e.g. on client disconnect.
    fn drop(&mut self) {
        if self.drafts.is_empty() {
            return;
        }
        let drafts = std::mem::take(&mut self.drafts);
        let storage = self.service.storage.clone();

        match Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("Upload abandoned, removing {} file(s)", drafts.len());
                handle.spawn(async move {
                    for draft in drafts {
                        if let Err(e) = storage.remove(&draft.relative_path).await {
                            tracing::error!(
                                "Failed to remove orphaned upload {}: {}",
                                draft.relative_path,
                                e
                            );
                        }
                    }
                });
            }
            Err(_) => {
                for draft in &drafts {
                    tracing::error!("Upload abandoned outside a runtime, left {}", draft.relative_path);
                }
            }
        }
    }
}
