use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

const MB: u64 = 1024 * 1024;

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

const PDF_TYPES: &[&str] = &["application/pdf"];

const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

const MIXED_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// Storage bucket an upload belongs to. Each category maps to its own
/// directory under the upload root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Images,
    Pdfs,
    Documents,
    Gallery,
    Projects,
    MeetingMinutes,
    Events,
    Blogs,
    #[default]
    General,
}

/// Upload limits for a category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryPolicy {
    pub allowed_mime_types: &'static [&'static str],
    pub max_size_bytes: u64,
    pub max_files_per_request: usize,
}

impl CategoryPolicy {
    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.contains(&mime_type)
    }
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Images,
        Category::Pdfs,
        Category::Documents,
        Category::Gallery,
        Category::Projects,
        Category::MeetingMinutes,
        Category::Events,
        Category::Blogs,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Images => "images",
            Category::Pdfs => "pdfs",
            Category::Documents => "documents",
            Category::Gallery => "gallery",
            Category::Projects => "projects",
            Category::MeetingMinutes => "meeting-minutes",
            Category::Events => "events",
            Category::Blogs => "blogs",
            Category::General => "general",
        }
    }

    pub fn policy(&self) -> CategoryPolicy {
        match self {
            Category::Images | Category::Gallery => CategoryPolicy {
                allowed_mime_types: IMAGE_TYPES,
                max_size_bytes: 5 * MB,
                max_files_per_request: 10,
            },
            Category::Projects | Category::Blogs => CategoryPolicy {
                allowed_mime_types: IMAGE_TYPES,
                max_size_bytes: 5 * MB,
                max_files_per_request: 5,
            },
            Category::Pdfs => CategoryPolicy {
                allowed_mime_types: PDF_TYPES,
                max_size_bytes: 15 * MB,
                max_files_per_request: 10,
            },
            Category::MeetingMinutes => CategoryPolicy {
                allowed_mime_types: PDF_TYPES,
                max_size_bytes: 15 * MB,
                max_files_per_request: 5,
            },
            Category::Documents => CategoryPolicy {
                allowed_mime_types: DOCUMENT_TYPES,
                max_size_bytes: 15 * MB,
                max_files_per_request: 10,
            },
            Category::Events | Category::General => CategoryPolicy {
                allowed_mime_types: MIXED_TYPES,
                max_size_bytes: 10 * MB,
                max_files_per_request: 10,
            },
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
