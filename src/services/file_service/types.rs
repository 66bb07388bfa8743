use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Category, FileRecord};

/// Caller-supplied fields recorded alongside a freshly ingested file.
#[derive(Debug, Clone, Default)]
pub struct NewFileMeta {
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub associated_entity_type: Option<String>,
    pub associated_entity_id: Option<String>,
}

/// Partial update. `None` leaves a field alone, an empty string clears it.
/// `tags` replaces the whole set.
#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub associated_entity_type: Option<String>,
    pub associated_entity_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileFilter {
    pub category: Option<Category>,
    pub owner_id: Option<String>,
    pub associated_entity_type: Option<String>,
    pub associated_entity_id: Option<String>,
    /// Matches records carrying any of these tags.
    pub tags: Vec<String>,
    pub is_active: bool,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self {
            category: None,
            owner_id: None,
            associated_entity_type: None,
            associated_entity_id: None,
            tags: Vec::new(),
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PageRequest {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub page_count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FilePage {
    pub items: Vec<FileRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category: Category,
    pub count: u64,
    pub total_size: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatsTotals {
    pub files: u64,
    pub size: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileStats {
    pub categories: Vec<CategoryStats>,
    pub totals: StatsTotals,
}
