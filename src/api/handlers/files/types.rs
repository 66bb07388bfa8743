use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::services::file_service::FilePatch;
use crate::utils::validation::normalize_tags;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// Target category when the form carries no `category` field
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListFilesQuery {
    pub category: Option<String>,
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, message = "pageSize must be at least 1"))]
    pub page_size: Option<u64>,
    pub owner_id: Option<String>,
    pub associated_entity_type: Option<String>,
    pub associated_entity_id: Option<String>,
    /// Comma separated; matches files carrying any of them
    pub tags: Option<String>,
    pub is_active: Option<bool>,
}

impl ListFilesQuery {
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|t| normalize_tags([t]))
            .unwrap_or_default()
    }
}

/// Tags may be sent as a JSON array or a single comma separated string.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Csv(String),
}

impl TagsInput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            TagsInput::List(tags) => tags,
            TagsInput::Csv(raw) => vec![raw],
        }
    }
}

/// Mutable metadata only. An empty string clears the field.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    #[validate(length(max = 1000, message = "description is limited to 1000 characters"))]
    pub description: Option<String>,
    pub tags: Option<TagsInput>,
    #[validate(length(max = 100))]
    pub associated_entity_type: Option<String>,
    #[validate(length(max = 100))]
    pub associated_entity_id: Option<String>,
}

impl From<UpdateFileRequest> for FilePatch {
    fn from(req: UpdateFileRequest) -> Self {
        FilePatch {
            description: req.description,
            tags: req.tags.map(TagsInput::into_vec),
            associated_entity_type: req.associated_entity_type,
            associated_entity_id: req.associated_entity_id,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteQuery {
    /// Remove the file from disk and drop its record
    pub permanent: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub id: String,
    pub permanent: bool,
    pub message: String,
}
