use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::category::{Category, UnknownCategory};
use crate::entities::uploaded_files;

/// Descriptor produced by ingestion: the file is on disk, but no record
/// exists yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDraft {
    pub stored_name: String,
    pub original_name: String,
    pub relative_path: String,
    pub public_url: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub stored_name: String,
    pub original_name: String,
    pub relative_path: String,
    pub public_url: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub category: Category,
    pub owner_id: String,
    pub associated_entity_type: Option<String>,
    pub associated_entity_id: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn from_model(
        model: uploaded_files::Model,
        tags: Vec<String>,
    ) -> Result<Self, UnknownCategory> {
        let category = model.category.parse::<Category>()?;
        Ok(Self {
            id: model.id,
            stored_name: model.stored_name,
            original_name: model.original_name,
            relative_path: model.relative_path,
            public_url: model.public_url,
            size_bytes: model.size_bytes,
            mime_type: model.mime_type,
            category,
            owner_id: model.owner_id,
            associated_entity_type: model.associated_entity_type,
            associated_entity_id: model.associated_entity_id,
            description: model.description,
            tags,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
