use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::api::error::AppError;
use crate::models::{Category, FileDraft};
use crate::services::storage::{StorageError, StorageService};
use crate::utils::validation::{generate_stored_name, resolve_mime_type};

/// Bytes inspected for magic-byte sniffing before anything touches disk.
const HEADER_PEEK_SIZE: usize = 8 * 1024;

/// Fresh names tried when `create_new` reports a collision.
const MAX_NAME_ATTEMPTS: usize = 5;

const MAX_ORIGINAL_NAME_CHARS: usize = 255;

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone)]
pub struct IngestRequest<'n> {
    pub category: Category,
    pub original_name: &'n str,
    pub declared_mime: Option<&'n str>,
}

/// Writes incoming streams into the category directories. Knows nothing
/// about the database.
pub struct IngestionService {
    storage: Arc<dyn StorageService>,
    public_base_path: String,
}

/// `<base>/<percent-encoded relative path>`
pub fn build_public_url(public_base_path: &str, relative_path: &str) -> String {
    let encoded: Vec<String> = relative_path
        .split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect();
    format!(
        "{}/{}",
        public_base_path.trim_end_matches('/'),
        encoded.join("/")
    )
}

fn display_name(original: &str) -> String {
    let trimmed = original.trim();
    if trimmed.is_empty() {
        return "file".to_string();
    }
    trimmed.chars().take(MAX_ORIGINAL_NAME_CHARS).collect()
}

impl IngestionService {
    pub fn new(storage: Arc<dyn StorageService>, public_base_path: impl Into<String>) -> Self {
        Self {
            storage,
            public_base_path: public_base_path.into(),
        }
    }

    pub async fn ingest<R>(
        &self,
        request: IngestRequest<'_>,
        mut reader: R,
    ) -> Result<FileDraft, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let policy = request.category.policy();

        // 1. Peek into stream for magic bytes
        let header = fill_header(&mut reader)
            .await
            .map_err(|e| AppError::Storage(format!("Read error: {}", e)))?;
        if header.is_empty() {
            return Err(AppError::Validation(format!(
                "File '{}' is empty",
                request.original_name
            )));
        }

        // 2. Type checks happen before the first byte is written
        let mime_type = resolve_mime_type(request.declared_mime, &header)
            .map_err(|e| AppError::UnsupportedMediaType(e.message))?;
        if !policy.allows(&mime_type) {
            return Err(AppError::UnsupportedMediaType(format!(
                "File type '{}' is not allowed in category '{}'",
                mime_type, request.category
            )));
        }

        // 3. Stream to disk under a fresh name
        let directory = request.category.as_str();
        self.storage.ensure_dir(directory).await?;

        let mut chained = Cursor::new(header).chain(reader);
        let mut attempt = 0;
        let (stored_name, relative_path, size) = loop {
            attempt += 1;
            let stored_name = generate_stored_name(request.original_name);
            let relative_path = format!("{}/{}", directory, stored_name);

            match self
                .storage
                .write_new(&relative_path, Box::new(&mut chained), policy.max_size_bytes)
                .await
            {
                Ok(size) => break (stored_name, relative_path, size),
                Err(StorageError::AlreadyExists(path)) if attempt < MAX_NAME_ATTEMPTS => {
                    tracing::warn!("Stored name collision on {}, retrying", path);
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::info!(
            "Stored {} ({} bytes, {}) as {}",
            request.original_name,
            size,
            mime_type,
            relative_path
        );

        Ok(FileDraft {
            public_url: build_public_url(&self.public_base_path, &relative_path),
            stored_name,
            original_name: display_name(request.original_name),
            relative_path,
            size_bytes: size as i64,
            mime_type,
            category: request.category,
        })
    }

    /// Best-effort removal of files written for drafts that will never be
    /// persisted.
    pub async fn discard(&self, drafts: &[FileDraft]) {
        for draft in drafts {
            if let Err(e) = self.storage.remove(&draft.relative_path).await {
                tracing::error!(
                    "Failed to remove orphaned upload {}: {}",
                    draft.relative_path,
                    e
                );
            }
        }
    }
}

/// Reads until the peek buffer is full or the stream ends. A single `read`
/// on a multipart stream may return only part of the first chunk.
async fn fill_header<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut header = vec![0u8; HEADER_PEEK_SIZE];
    let mut filled = 0;
    while filled < HEADER_PEEK_SIZE {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header.truncate(filled);
    Ok(header)
}
