//! Pool repository: the `pooled_labels` table.
//!
//! Every state change is one conditional `UPDATE ... WHERE status = ...`.
//! The statement's WHERE clause is the compare of the compare-and-swap; a
//! caller that loses the race simply sees zero rows come back.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{get_optional_timestamp, get_timestamp, Database, DatabaseError};
use crate::model::{format_timestamp, LabelStatus, PooledLabel};

impl PooledLabel {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            upload_id: row.get("upload_id")?,
            split_page_id: row.get("split_page_id")?,
            order_reference: row.get("order_reference")?,
            tracking_number: row.get("tracking_number")?,
            courier_service_id: row.get("courier_service_id")?,
            owner_id: row.get("owner_id")?,
            status: row.get("status")?,
            claimed_by: row.get("claimed_by")?,
            claimed_at: get_optional_timestamp(row, "claimed_at")?,
            created_at: get_timestamp(row, "created_at")?,
            expires_at: get_timestamp(row, "expires_at")?,
        })
    }
}

/// Result of a claim attempt. Losing a race is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(PooledLabel),
    /// The label exists but was not `AVAILABLE` at the time of the update.
    Unavailable { status: LabelStatus },
    NotFound,
}

impl ClaimOutcome {
    pub fn into_label(self) -> Option<PooledLabel> {
        match self {
            ClaimOutcome::Claimed(label) => Some(label),
            _ => None,
        }
    }
}

/// Per-status label counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: u32,
    pub available: u32,
    pub claimed: u32,
    pub expired: u32,
    pub cancelled: u32,
}

pub fn insert(db: &Database, label: &PooledLabel) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO pooled_labels (id, upload_id, split_page_id, order_reference,
             tracking_number, courier_service_id, owner_id, status, claimed_by, claimed_at,
             created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                label.id,
                label.upload_id,
                label.split_page_id,
                label.order_reference,
                label.tracking_number,
                label.courier_service_id,
                label.owner_id,
                label.status,
                label.claimed_by,
                label.claimed_at.map(format_timestamp),
                format_timestamp(label.created_at),
                format_timestamp(label.expires_at),
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<PooledLabel>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM pooled_labels WHERE id = ?1",
                params![id],
                PooledLabel::from_row,
            )
            .optional()?)
    })
}

/// The earliest-created available, unexpired label for the triple.
pub fn find_available(
    db: &Database,
    order_reference: &str,
    courier_service_id: &str,
    owner_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<PooledLabel>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM pooled_labels
                 WHERE order_reference = ?1 AND courier_service_id = ?2 AND owner_id = ?3
                   AND status = ?4 AND expires_at > ?5
                 ORDER BY created_at ASC, id ASC
                 LIMIT 1",
                params![
                    order_reference,
                    courier_service_id,
                    owner_id,
                    LabelStatus::Available,
                    format_timestamp(now),
                ],
                PooledLabel::from_row,
            )
            .optional()?)
    })
}

/// `AVAILABLE -> CLAIMED` in a single statement.
pub fn claim(
    db: &Database,
    id: &str,
    consumer_order_id: &str,
    now: DateTime<Utc>,
) -> Result<ClaimOutcome, DatabaseError> {
    db.with_conn(|conn| {
        let claimed = conn
            .query_row(
                "UPDATE pooled_labels SET status = ?2, claimed_by = ?3, claimed_at = ?4
                 WHERE id = ?1 AND status = ?5
                 RETURNING *",
                params![
                    id,
                    LabelStatus::Claimed,
                    consumer_order_id,
                    format_timestamp(now),
                    LabelStatus::Available,
                ],
                PooledLabel::from_row,
            )
            .optional()?;

        if let Some(label) = claimed {
            return Ok(ClaimOutcome::Claimed(label));
        }

        let status: Option<LabelStatus> = conn
            .query_row(
                "SELECT status FROM pooled_labels WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;

        Ok(match status {
            Some(status) => ClaimOutcome::Unavailable { status },
            None => ClaimOutcome::NotFound,
        })
    })
}

/// `CLAIMED -> AVAILABLE`, clearing the claim. `None` when the label was not
/// claimed.
pub fn release(db: &Database, id: &str) -> Result<Option<PooledLabel>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "UPDATE pooled_labels SET status = ?2, claimed_by = NULL, claimed_at = NULL
                 WHERE id = ?1 AND status = ?3
                 RETURNING *",
                params![id, LabelStatus::Available, LabelStatus::Claimed],
                PooledLabel::from_row,
            )
            .optional()?)
    })
}

/// `AVAILABLE | CLAIMED -> CANCELLED`. `None` when the label is missing or
/// already final.
pub fn cancel(db: &Database, id: &str) -> Result<Option<PooledLabel>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "UPDATE pooled_labels SET status = ?2
                 WHERE id = ?1 AND status IN (?3, ?4)
                 RETURNING *",
                params![
                    id,
                    LabelStatus::Cancelled,
                    LabelStatus::Available,
                    LabelStatus::Claimed,
                ],
                PooledLabel::from_row,
            )
            .optional()?)
    })
}

/// Moves every available label whose expiry has passed to `EXPIRED`.
/// Returns the number of labels expired.
pub fn expire_due(db: &Database, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE pooled_labels SET status = ?1 WHERE status = ?2 AND expires_at <= ?3",
            params![
                LabelStatus::Expired,
                LabelStatus::Available,
                format_timestamp(now),
            ],
        )?;
        Ok(changed)
    })
}

/// The most recent claimed label for an order. With a consumer the claim
/// must be held by it; without one, `order` may name either the label's
/// order reference or the consumer holding it.
pub fn find_claimed(
    db: &Database,
    order: &str,
    owner_id: &str,
    consumer_order_id: Option<&str>,
) -> Result<Option<PooledLabel>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM pooled_labels
                 WHERE owner_id = ?2 AND status = ?3
                   AND ((?4 IS NULL AND (order_reference = ?1 OR claimed_by = ?1))
                        OR (order_reference = ?1 AND claimed_by = ?4))
                 ORDER BY claimed_at DESC, id DESC
                 LIMIT 1",
                params![order, owner_id, LabelStatus::Claimed, consumer_order_id],
                PooledLabel::from_row,
            )
            .optional()?)
    })
}

/// Available, unexpired labels for an owner, newest first.
pub fn list_available(
    db: &Database,
    owner_id: &str,
    courier_service_id: Option<&str>,
    now: DateTime<Utc>,
    limit: Option<usize>,
) -> Result<Vec<PooledLabel>, DatabaseError> {
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM pooled_labels
             WHERE owner_id = ?1 AND (?2 IS NULL OR courier_service_id = ?2)
               AND status = ?3 AND expires_at > ?4
             ORDER BY created_at DESC, id DESC
             LIMIT ?5",
        )?;
        let rows = stmt.query_map(
            params![
                owner_id,
                courier_service_id,
                LabelStatus::Available,
                format_timestamp(now),
                limit,
            ],
            PooledLabel::from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    })
}

pub fn count_by_status(
    db: &Database,
    owner_id: &str,
    courier_service_id: Option<&str>,
) -> Result<StatusCounts, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM pooled_labels
             WHERE owner_id = ?1 AND (?2 IS NULL OR courier_service_id = ?2)
             GROUP BY status",
        )?;
        let rows = stmt.query_map(params![owner_id, courier_service_id], |r| {
            Ok((r.get::<_, LabelStatus>(0)?, r.get::<_, u32>(1)?))
        })?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, n) = row?;
            counts.total += n;
            match status {
                LabelStatus::Available => counts.available = n,
                LabelStatus::Claimed => counts.claimed = n,
                LabelStatus::Expired => counts.expired = n,
                LabelStatus::Cancelled => counts.cancelled = n,
            }
        }
        Ok(counts)
    })
}

/// Labels enrolled from an upload, in any status.
pub fn count_by_upload(db: &Database, upload_id: &str) -> Result<u32, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM pooled_labels WHERE upload_id = ?1",
            params![upload_id],
            |r| r.get(0),
        )?)
    })
}
