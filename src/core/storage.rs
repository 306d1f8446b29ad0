//! Image storage on local disk
//!
//! Files land in `{root}/storage/{uuid}_{unix_millis}.{ext}` and are served
//! back under `/storage/...`. Upload bodies arrive as blocking readers
//! (multipart spools to a temp file), so the copy runs in `spawn_blocking`.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::core::validation::{MAX_IMAGE_BYTES, image_extension};

/// URL prefix and subdirectory for stored files
pub const STORAGE_PREFIX: &str = "storage";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("File exceeds {max} bytes")]
    TooLarge { max: u64 },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A file written by [`ImageStore::store`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    /// Public path, e.g. `/storage/<name>`
    pub file_path: String,
    pub full_path: PathBuf,
    pub filename: String,
    pub extension: String,
    pub mimetype: &'static str,
}

/// An image received from a client, not yet written to the store
pub struct ImageUpload {
    pub filename: String,
    pub content: Box<dyn Read + Send>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, content: impl Read + Send + 'static) -> Self {
        Self {
            filename: filename.into(),
            content: Box::new(content),
        }
    }
}

impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that `/storage` is served from
    pub fn storage_dir(&self) -> PathBuf {
        self.root.join(STORAGE_PREFIX)
    }

    /// Write an uploaded image, rejecting unsupported types and oversized bodies
    pub async fn store<R>(&self, original_name: &str, reader: R) -> Result<StoredImage, StorageError>
    where
        R: Read + Send + 'static,
    {
        let extension = image_extension(original_name)
            .ok_or_else(|| StorageError::UnsupportedType(original_name.to_string()))?;

        let filename = format!(
            "{}_{}.{}",
            Uuid::new_v4(),
            Utc::now().timestamp_millis(),
            extension
        );
        let dir = self.storage_dir();
        let full_path = dir.join(&filename);

        let target = full_path.clone();
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<u64> {
            std::fs::create_dir_all(&dir)?;
            let mut file = std::fs::File::create(&target)?;
            // One byte past the limit is enough to detect oversize input
            std::io::copy(&mut reader.take(MAX_IMAGE_BYTES + 1), &mut file)
        })
        .await??;

        if written > MAX_IMAGE_BYTES {
            let _ = tokio::fs::remove_file(&full_path).await;
            return Err(StorageError::TooLarge {
                max: MAX_IMAGE_BYTES,
            });
        }

        tracing::debug!(file = %filename, bytes = written, "Image stored");

        Ok(StoredImage {
            file_path: format!("/{STORAGE_PREFIX}/{filename}"),
            mimetype: mimetype_for(&extension),
            full_path,
            filename,
            extension,
        })
    }

    pub async fn store_upload(&self, upload: ImageUpload) -> Result<StoredImage, StorageError> {
        self.store(&upload.filename, upload.content).await
    }

    /// Store several uploads; on failure the ones already written are removed
    pub async fn store_all(
        &self,
        uploads: Vec<ImageUpload>,
    ) -> Result<Vec<StoredImage>, StorageError> {
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.store_upload(upload).await {
                Ok(image) => stored.push(image),
                Err(e) => {
                    self.discard(stored.into_iter().map(|s| s.file_path).collect())
                        .await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    /// Best-effort removal used when a later step fails
    ///
    /// Takes owned paths so resolver futures holding the call stay `Send`.
    pub async fn discard(&self, paths: Vec<String>) {
        for path in paths {
            if let Err(e) = self.delete(&path).await {
                tracing::warn!(file = %path, error = %e, "Failed to remove stored image");
            }
        }
    }

    /// Remove a stored image by its public path. Returns false if it was already gone.
    pub async fn delete(&self, file_path: &str) -> Result<bool, StorageError> {
        // Only the final component is trusted, so `..` can't escape the store
        let Some(name) = Path::new(file_path).file_name() else {
            return Ok(false);
        };

        match tokio::fs::remove_file(self.storage_dir().join(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn mimetype_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        _ => "image/jpeg",
    }
}
