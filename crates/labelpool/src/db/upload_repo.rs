//! Upload repository: the `bulk_uploads` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{get_optional_timestamp, get_timestamp, Database, DatabaseError};
use crate::model::{format_timestamp, BulkUpload, UploadStatus};

impl BulkUpload {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            courier_service_id: row.get("courier_service_id")?,
            original_file_name: row.get("original_file_name")?,
            original_file_key: row.get("original_file_key")?,
            original_file_size: row.get::<_, i64>("original_file_size")?.max(0) as u64,
            total_pages: row.get("total_pages")?,
            status: row.get("status")?,
            uploaded_at: get_timestamp(row, "uploaded_at")?,
            processing_started_at: get_optional_timestamp(row, "processing_started_at")?,
            processing_ended_at: get_optional_timestamp(row, "processing_ended_at")?,
        })
    }
}

pub fn insert(db: &Database, upload: &BulkUpload) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO bulk_uploads (id, owner_id, courier_service_id, original_file_name,
             original_file_key, original_file_size, total_pages, status, uploaded_at,
             processing_started_at, processing_ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                upload.id,
                upload.owner_id,
                upload.courier_service_id,
                upload.original_file_name,
                upload.original_file_key,
                upload.original_file_size as i64,
                upload.total_pages,
                upload.status,
                format_timestamp(upload.uploaded_at),
                upload.processing_started_at.map(format_timestamp),
                upload.processing_ended_at.map(format_timestamp),
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<BulkUpload>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM bulk_uploads WHERE id = ?1",
                params![id],
                BulkUpload::from_row,
            )
            .optional()?)
    })
}

/// Uploads for an owner, newest first.
pub fn list_by_owner(db: &Database, owner_id: &str) -> Result<Vec<BulkUpload>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM bulk_uploads WHERE owner_id = ?1 ORDER BY uploaded_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![owner_id], BulkUpload::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    })
}

/// Moves an upload to `PROCESSING`. Returns `false` if no such upload
/// exists.
pub fn mark_processing(db: &Database, id: &str, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE bulk_uploads SET status = ?2, processing_started_at = ?3 WHERE id = ?1",
            params![id, UploadStatus::Processing, format_timestamp(now)],
        )?;
        Ok(changed == 1)
    })
}

pub fn set_total_pages(db: &Database, id: &str, total_pages: u32) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE bulk_uploads SET total_pages = ?2 WHERE id = ?1",
            params![id, total_pages],
        )?;
        Ok(changed == 1)
    })
}

/// Records the terminal status of an upload.
pub fn mark_finished(
    db: &Database,
    id: &str,
    status: UploadStatus,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE bulk_uploads SET status = ?2, processing_ended_at = ?3 WHERE id = ?1",
            params![id, status, format_timestamp(now)],
        )?;
        Ok(changed == 1)
    })
}
