//! Split page repository: the `split_pages` table.
//!
//! Pages are insert-only.

use rusqlite::{params, OptionalExtension, Row};

use super::{get_timestamp, Database, DatabaseError};
use crate::model::{format_timestamp, SplitPage};

impl SplitPage {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            upload_id: row.get("upload_id")?,
            page_number: row.get("page_number")?,
            document_key: row.get("document_key")?,
            raster_key: row.get("raster_key")?,
            tracking_number: row.get("tracking_number")?,
            order_reference: row.get("order_reference")?,
            recipient_name: row.get("recipient_name")?,
            confidence: row.get::<_, i64>("confidence")?.clamp(0, 100) as u8,
            status: row.get("status")?,
            created_at: get_timestamp(row, "created_at")?,
        })
    }
}

pub fn insert(db: &Database, page: &SplitPage) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO split_pages (id, upload_id, page_number, document_key, raster_key,
             tracking_number, order_reference, recipient_name, confidence, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                page.id,
                page.upload_id,
                page.page_number,
                page.document_key,
                page.raster_key,
                page.tracking_number,
                page.order_reference,
                page.recipient_name,
                page.confidence,
                page.status,
                format_timestamp(page.created_at),
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<SplitPage>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM split_pages WHERE id = ?1",
                params![id],
                SplitPage::from_row,
            )
            .optional()?)
    })
}

/// Pages of an upload in page order.
pub fn list_by_upload(db: &Database, upload_id: &str) -> Result<Vec<SplitPage>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM split_pages WHERE upload_id = ?1 ORDER BY page_number")?;
        let rows = stmt.query_map(params![upload_id], SplitPage::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    })
}

pub fn count_by_upload(db: &Database, upload_id: &str) -> Result<u32, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM split_pages WHERE upload_id = ?1",
            params![upload_id],
            |r| r.get(0),
        )?)
    })
}
