/// Disk-based file storage backend
use crate::{
    error::{HerdError, HerdResult},
    file_store::{FileStore, IncomingFile, StoredFile},
};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Disk storage backend
///
/// Writes each upload to `{base}/{millis}-{uuid}.{ext}`. The path handed
/// to the classifier is absolute so the classifier does not need to share
/// our working directory.
#[derive(Clone)]
pub struct DiskFileStore {
    base_path: PathBuf,
}

impl DiskFileStore {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Generate a collision-free file name that keeps a sane extension
    fn generate_filename(original_name: &str, mime_type: &str) -> String {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| extension_for_mime(mime_type).to_string());

        format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension
        )
    }

    /// Ensure the upload directory exists and return its absolute path
    async fn ensure_base_dir(&self) -> HerdResult<PathBuf> {
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            HerdError::Storage(format!("Failed to create upload directory: {}", e))
        })?;

        fs::canonicalize(&self.base_path).await.map_err(|e| {
            HerdError::Storage(format!("Failed to resolve upload directory: {}", e))
        })
    }
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        _ => "bin",
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn store(&self, file: IncomingFile, mime_type: &str) -> HerdResult<StoredFile> {
        let base = self.ensure_base_dir().await?;
        let filename = Self::generate_filename(&file.original_name, mime_type);
        let storage_path = base.join(&filename);
        let size_bytes = file.data.len() as i64;

        fs::write(&storage_path, file.data).await.map_err(|e| {
            HerdError::Storage(format!("Failed to write upload {}: {}", filename, e))
        })?;

        tracing::debug!("Stored upload {} ({} bytes)", storage_path.display(), size_bytes);

        Ok(StoredFile {
            filename,
            original_name: file.original_name,
            storage_path,
            size_bytes,
            mime_type: mime_type.to_string(),
        })
    }

    async fn remove(&self, file: &StoredFile) -> HerdResult<()> {
        match fs::remove_file(&file.storage_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HerdError::Storage(format!(
                "Failed to delete upload {}: {}",
                file.filename, e
            ))),
        }
    }
}
