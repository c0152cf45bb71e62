//! Object storage for page documents, page rasters and original uploads.
//!
//! Keys are opaque once issued: they are persisted on the records that own
//! them and never re-derived.

use chrono::{DateTime, Datelike, Utc};

use crate::error::StorageError;
use crate::sanitize::sanitize_filename;

pub mod filesystem;

pub use filesystem::FileStorage;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Key/value blob storage.
pub trait ObjectStore: Send + Sync {
    /// Writes a new object. Existing keys are never overwritten.
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Artifact kinds stored per split page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageArtifact {
    Document,
    Raster,
}

impl PageArtifact {
    pub fn extension(&self) -> &'static str {
        match self {
            PageArtifact::Document => "pdf",
            PageArtifact::Raster => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            PageArtifact::Document => PDF_CONTENT_TYPE,
            PageArtifact::Raster => PNG_CONTENT_TYPE,
        }
    }
}

fn date_prefix(root: &str, date: DateTime<Utc>) -> String {
    format!(
        "{}/{:04}/{:02}/{:02}",
        root,
        date.year(),
        date.month(),
        date.day()
    )
}

/// `labels/{yyyy}/{mm}/{dd}/{upload}/page_{NNN}.{ext}`
pub fn page_key(
    date: DateTime<Utc>,
    upload_id: &str,
    page_number: u32,
    artifact: PageArtifact,
) -> String {
    format!(
        "{}/{}/page_{:03}.{}",
        date_prefix("labels", date),
        upload_id,
        page_number,
        artifact.extension()
    )
}

/// `uploads/{yyyy}/{mm}/{dd}/{owner}_{millis}_{name}`
pub fn upload_key(date: DateTime<Utc>, owner_id: &str, original_name: &str) -> String {
    format!(
        "{}/{}_{}_{}",
        date_prefix("uploads", date),
        sanitize_filename(owner_id),
        date.timestamp_millis(),
        sanitize_filename(original_name)
    )
}

/// Rejects keys that could escape the store root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = |reason: &str| StorageError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.starts_with('/') || key.contains('\\') || key.contains(':') {
        return Err(invalid("key must be a relative path"));
    }
    for segment in key.split('/') {
        match segment {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative path segment")),
            _ => {}
        }
    }
    Ok(())
}
