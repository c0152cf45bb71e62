use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{StorageError, WorkerError};

/// Failure of a single page. Counted against the upload, never propagated
/// past the page boundary.
#[derive(Error, Debug)]
pub enum PageError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] WorkerError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Persistence failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Page task aborted: {0}")]
    Task(String),
}

impl PageError {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PageError::Extraction(WorkerError::Timeout { .. }) => "timeout",
            PageError::Extraction(WorkerError::Crash { .. }) => "crash",
            PageError::Extraction(_) => "extraction",
            PageError::Storage(_) => "storage",
            PageError::Database(_) => "database",
            PageError::Task(_) => "task",
        }
    }
}

/// Non-fatal problems on a page that was otherwise recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    RasterFailed { page: u32, error: String },
    FieldsMissing { page: u32, missing: Vec<&'static str> },
}
