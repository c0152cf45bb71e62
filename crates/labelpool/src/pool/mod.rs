//! Label pool manager.
//!
//! Owns the pooled label state machine: enrollment, lookup by reference,
//! atomic claim, release, administrative cancel and expiry.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::pool_repo::{self, StatusCounts};
use crate::db::{Database, DatabaseError};
use crate::model::{LabelStatus, PooledLabel};

pub mod sweeper;

pub use crate::db::pool_repo::ClaimOutcome;
pub use sweeper::ExpirySweeper;

type Result<T> = std::result::Result<T, DatabaseError>;

/// Identifies the page a label is enrolled from and the triple it is looked
/// up by.
#[derive(Debug, Clone, Copy)]
pub struct Enrollment<'a> {
    pub upload_id: &'a str,
    pub split_page_id: &'a str,
    pub order_reference: &'a str,
    pub tracking_number: &'a str,
    pub courier_service_id: &'a str,
    pub owner_id: &'a str,
}

/// Aggregate view of an owner's pool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    #[serde(flatten)]
    pub counts: StatusCounts,
    /// Currently available labels, newest first.
    pub labels: Vec<PooledLabel>,
}

#[derive(Clone)]
pub struct LabelPool {
    db: Database,
    retention: Duration,
}

impl LabelPool {
    pub fn new(db: Database, retention_days: u32) -> Self {
        Self {
            db,
            retention: Duration::days(i64::from(retention_days)),
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Creates an `AVAILABLE` label expiring one retention window after `now`.
    pub fn enroll(&self, enrollment: Enrollment<'_>, now: DateTime<Utc>) -> Result<PooledLabel> {
        let label = PooledLabel {
            id: uuid::Uuid::new_v4().to_string(),
            upload_id: enrollment.upload_id.to_string(),
            split_page_id: enrollment.split_page_id.to_string(),
            order_reference: enrollment.order_reference.to_string(),
            tracking_number: enrollment.tracking_number.to_string(),
            courier_service_id: enrollment.courier_service_id.to_string(),
            owner_id: enrollment.owner_id.to_string(),
            status: LabelStatus::Available,
            claimed_by: None,
            claimed_at: None,
            created_at: now,
            expires_at: now + self.retention,
        };
        pool_repo::insert(&self.db, &label)?;

        tracing::debug!(
            label_id = %label.id,
            upload_id = %label.upload_id,
            order_reference = %label.order_reference,
            "Label enrolled"
        );
        Ok(label)
    }

    /// Earliest-created available, unexpired label for the triple.
    pub fn lookup(
        &self,
        order_reference: &str,
        courier_service_id: &str,
        owner_id: &str,
    ) -> Result<Option<PooledLabel>> {
        self.lookup_at(order_reference, courier_service_id, owner_id, Utc::now())
    }

    pub fn lookup_at(
        &self,
        order_reference: &str,
        courier_service_id: &str,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PooledLabel>> {
        Ok(pool_repo::find_available(
            &self.db,
            order_reference,
            courier_service_id,
            owner_id,
            now,
        )?)
    }

    /// Marks the label claimed by `consumer_order_id` if, and only if, it is
    /// still `AVAILABLE`. Concurrent callers get exactly one winner.
    pub fn claim(&self, label_id: &str, consumer_order_id: &str) -> Result<ClaimOutcome> {
        let outcome = pool_repo::claim(&self.db, label_id, consumer_order_id, Utc::now())?;
        match &outcome {
            ClaimOutcome::Claimed(label) => {
                tracing::info!(label_id, order_reference = %label.order_reference, "Label claimed")
            }
            ClaimOutcome::Unavailable { status } => {
                tracing::debug!(label_id, status = %status, "Claim lost, label not available")
            }
            ClaimOutcome::NotFound => tracing::debug!(label_id, "Claim on unknown label"),
        }
        Ok(outcome)
    }

    /// Returns a claimed label to `AVAILABLE`. A no-op for any other state.
    pub fn release(&self, label_id: &str) -> Result<Option<PooledLabel>> {
        let released = pool_repo::release(&self.db, label_id)?;
        if released.is_some() {
            tracing::info!(label_id, "Label released");
        }
        Ok(released)
    }

    /// Releases the label claimed for an order. `consumer_order_id`, when
    /// given, must be the order holding the claim.
    pub fn release_for_order(
        &self,
        order: &str,
        owner_id: &str,
        consumer_order_id: Option<&str>,
    ) -> Result<Option<PooledLabel>> {
        match pool_repo::find_claimed(&self.db, order, owner_id, consumer_order_id)? {
            Some(label) => self.release(&label.id),
            None => Ok(None),
        }
    }

    /// Administrative `AVAILABLE | CLAIMED -> CANCELLED`.
    pub fn cancel(&self, label_id: &str) -> Result<Option<PooledLabel>> {
        let cancelled = pool_repo::cancel(&self.db, label_id)?;
        if cancelled.is_some() {
            tracing::info!(label_id, "Label cancelled");
        }
        Ok(cancelled)
    }

    pub fn expire_sweep(&self) -> Result<usize> {
        self.expire_sweep_at(Utc::now())
    }

    /// Expires every available label whose expiry is at or before `now`.
    /// Claimed labels are never touched.
    pub fn expire_sweep_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let expired = pool_repo::expire_due(&self.db, now)?;
        if expired > 0 {
            tracing::info!(expired, "Expired pooled labels");
        }
        Ok(expired)
    }

    pub fn get(&self, label_id: &str) -> Result<Option<PooledLabel>> {
        Ok(pool_repo::find_by_id(&self.db, label_id)?)
    }

    pub fn stats(&self, owner_id: &str, courier_service_id: Option<&str>) -> Result<PoolStats> {
        let now = Utc::now();
        Ok(PoolStats {
            counts: pool_repo::count_by_status(&self.db, owner_id, courier_service_id)?,
            labels: pool_repo::list_available(&self.db, owner_id, courier_service_id, now, None)?,
        })
    }

    /// Up to `limit` distinct order references currently available.
    pub fn available_references(
        &self,
        owner_id: &str,
        courier_service_id: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let labels = pool_repo::list_available(
            &self.db,
            owner_id,
            Some(courier_service_id),
            Utc::now(),
            None,
        )?;
        let mut references: Vec<String> = Vec::with_capacity(limit);
        for label in labels {
            if !references.contains(&label.order_reference) {
                references.push(label.order_reference);
            }
            if references.len() == limit {
                break;
            }
        }
        Ok(references)
    }
}
