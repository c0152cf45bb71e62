//! Upload progress, derived entirely from persisted rows.
//!
//! Nothing here keeps its own counters: processed pages are the split page
//! rows (or every page once the upload is finished), succeeded pages are the
//! pooled labels enrolled from the upload.

use serde::Serialize;

use crate::db::{page_repo, pool_repo, upload_repo, Database};
use crate::error::{LabelPoolError, Result};
use crate::model::{BulkUpload, UploadStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatus {
    pub upload_id: String,
    pub status: UploadStatus,
    pub total_pages: u32,
    pub processed_pages: u32,
    pub succeeded_pages: u32,
    pub failed_pages: u32,
    pub percentage: u8,
}

impl ProcessingStatus {
    fn derive(upload: &BulkUpload, split_pages: u32, enrolled: u32) -> Self {
        let total = upload.total_pages;
        // A finished upload attempted every page, including those that left
        // no row behind.
        let processed = if upload.status == UploadStatus::Completed {
            total
        } else {
            split_pages
        };
        let succeeded = enrolled.min(processed);
        let percentage = if total == 0 {
            if upload.status == UploadStatus::Completed {
                100
            } else {
                0
            }
        } else {
            ((f64::from(processed) / f64::from(total)) * 100.0).round().min(100.0) as u8
        };

        Self {
            upload_id: upload.id.clone(),
            status: upload.status,
            total_pages: total,
            processed_pages: processed,
            succeeded_pages: succeeded,
            failed_pages: processed - succeeded,
            percentage,
        }
    }
}

pub fn processing_status(db: &Database, upload_id: &str) -> Result<ProcessingStatus> {
    let upload = upload_repo::find_by_id(db, upload_id)?
        .ok_or_else(|| LabelPoolError::UploadNotFound(upload_id.to_string()))?;
    let split_pages = page_repo::count_by_upload(db, upload_id)?;
    let enrolled = pool_repo::count_by_upload(db, upload_id)?;
    Ok(ProcessingStatus::derive(&upload, split_pages, enrolled))
}
