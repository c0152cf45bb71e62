//! Domain records shared by the repositories, the pool manager and the
//! service facade.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Formats a timestamp the way every table stores it: UTC, fixed
/// microsecond precision, so string order matches time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
}

/// Implements `as_str`, `Display`, `FromStr` and the rusqlite conversions for
/// a status enum stored as upper-case text.
macro_rules! text_status {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

/// Lifecycle of a bulk upload job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

text_status!(UploadStatus {
    Uploaded => "UPLOADED",
    Processing => "PROCESSING",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Failed)
    }
}

/// Lifecycle of a split page. Pages are immutable once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageStatus {
    Extracted,
}

text_status!(PageStatus {
    Extracted => "EXTRACTED",
});

/// State of a pooled label.
///
/// `AVAILABLE -> CLAIMED -> AVAILABLE` on release, `AVAILABLE -> EXPIRED` on
/// sweep, `AVAILABLE | CLAIMED -> CANCELLED` administratively. Nothing leaves
/// `EXPIRED` or `CANCELLED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabelStatus {
    Available,
    Claimed,
    Expired,
    Cancelled,
}

text_status!(LabelStatus {
    Available => "AVAILABLE",
    Claimed => "CLAIMED",
    Expired => "EXPIRED",
    Cancelled => "CANCELLED",
});

impl LabelStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, LabelStatus::Expired | LabelStatus::Cancelled)
    }
}

/// One ingestion job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpload {
    pub id: String,
    pub owner_id: String,
    pub courier_service_id: String,
    pub original_file_name: String,
    pub original_file_key: Option<String>,
    pub original_file_size: u64,
    pub total_pages: u32,
    pub status: UploadStatus,
    pub uploaded_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_ended_at: Option<DateTime<Utc>>,
}

/// One page split out of a bulk upload, with its stored artifacts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPage {
    pub id: String,
    pub upload_id: String,
    pub page_number: u32,
    pub document_key: String,
    pub raster_key: Option<String>,
    pub tracking_number: String,
    pub order_reference: String,
    pub recipient_name: Option<String>,
    pub confidence: u8,
    pub status: PageStatus,
    pub created_at: DateTime<Utc>,
}

/// A claimable (order reference, tracking number) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PooledLabel {
    pub id: String,
    pub upload_id: String,
    pub split_page_id: String,
    pub order_reference: String,
    pub tracking_number: String,
    pub courier_service_id: String,
    pub owner_id: String,
    pub status: LabelStatus,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
