/// Uploaded file storage
///
/// Persists the raw bytes of uploaded images and hands back the stored
/// file reference that image records and the classifier work from.

pub mod disk;

pub use disk::DiskFileStore;

use crate::error::{HerdError, HerdResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Image types accepted for analysis
pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
];

/// File as received from the client, not yet stored
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Reference to a file that has been written to storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub filename: String,
    pub original_name: String,
    pub storage_path: PathBuf,
    pub size_bytes: i64,
    pub mime_type: String,
}

/// File storage backend trait
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write the file and return where it landed
    async fn store(&self, file: IncomingFile, mime_type: &str) -> HerdResult<StoredFile>;

    /// Remove a stored file; missing files are not an error
    async fn remove(&self, file: &StoredFile) -> HerdResult<()>;
}

/// Check size and type of an incoming file and return its MIME type
///
/// A missing or generic content type is replaced by the format sniffed
/// from the bytes.
pub fn validate_incoming(file: &IncomingFile, max_size: usize) -> HerdResult<String> {
    if file.data.is_empty() {
        return Err(HerdError::Validation("Image file is empty".to_string()));
    }

    if file.data.len() > max_size {
        return Err(HerdError::PayloadTooLarge(format!(
            "Image is {} bytes, limit is {} bytes",
            file.data.len(),
            max_size
        )));
    }

    let declared = file
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

    let mime_type = match declared {
        Some(ct) => ct,
        None => image::guess_format(&file.data)
            .map(|format| format.to_mime_type().to_string())
            .map_err(|_| HerdError::Validation("Unrecognized image format".to_string()))?,
    };

    if !ACCEPTED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(HerdError::Validation(format!(
            "Unsupported file type: {}",
            mime_type
        )));
    }

    Ok(mime_type)
}
