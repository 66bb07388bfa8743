use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

const WRITE_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file exceeds the limit of {limit} bytes")]
    LimitExceeded { limit: u64 },

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("path escapes the upload root: {0}")]
    OutsideRoot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte storage addressed by paths relative to a fixed root.
#[async_trait]
pub trait StorageService: Send + Sync {
    fn root(&self) -> &Path;

    /// Creates `relative_dir` (and parents) if missing. Calling it again is a no-op.
    async fn ensure_dir(&self, relative_dir: &str) -> Result<(), StorageError>;

    /// Streams `reader` into a file that must not exist yet and returns the
    /// number of bytes written. On any failure the partial file is removed.
    async fn write_new<'a>(
        &self,
        relative_path: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        limit: u64,
    ) -> Result<u64, StorageError>;

    /// Returns `false` when there was nothing to remove.
    async fn remove(&self, relative_path: &str) -> Result<bool, StorageError>;

    async fn exists(&self, relative_path: &str) -> Result<bool, StorageError>;
}

/// Resolves a `/`-separated relative path under `root`, refusing anything
/// that could leave it.
pub fn resolve_under(root: &Path, relative_path: &str) -> Result<PathBuf, StorageError> {
    if relative_path.is_empty() || relative_path.contains('\\') {
        return Err(StorageError::OutsideRoot(relative_path.to_string()));
    }

    let mut resolved = root.to_path_buf();
    for segment in relative_path.split('/') {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => resolved.push(part),
            _ => return Err(StorageError::OutsideRoot(relative_path.to_string())),
        }
    }

    Ok(resolved)
}

pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn discard_partial(path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::error!("Failed to remove partial file {}: {}", path.display(), e);
            }
        }
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_dir(&self, relative_dir: &str) -> Result<(), StorageError> {
        let dir = resolve_under(&self.root, relative_dir)?;
        fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn write_new<'a>(
        &self,
        relative_path: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        limit: u64,
    ) -> Result<u64, StorageError> {
        let path = resolve_under(&self.root, relative_path)?;

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(relative_path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut buffer = vec![0u8; WRITE_BUFFER_SIZE];
        let mut written: u64 = 0;

        let outcome: Result<u64, StorageError> = async {
            loop {
                let n = reader.read(&mut buffer).await?;
                if n == 0 {
                    break;
                }
                written += n as u64;
                if written > limit {
                    return Err(StorageError::LimitExceeded { limit });
                }
                file.write_all(&buffer[..n]).await?;
            }
            file.flush().await?;
            Ok(written)
        }
        .await;

        if outcome.is_err() {
            drop(file);
            Self::discard_partial(&path).await;
        }

        outcome
    }

    async fn remove(&self, relative_path: &str) -> Result<bool, StorageError> {
        let path = resolve_under(&self.root, relative_path)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, relative_path: &str) -> Result<bool, StorageError> {
        let path = resolve_under(&self.root, relative_path)?;
        Ok(fs::try_exists(&path).await?)
    }
}
