//! Service facade called by the HTTP layer.
//!
//! Each operation returns a response DTO, never an `Err`: failures become
//! `isError: true` with a message fit for the caller.

use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::{
    CancelLabelRequest, CancelLabelResponse, ErrorResponse, GenerateLabelRequest,
    GenerateLabelResponse, LabelPackage, PoolLabelSummary, PoolStatusResponse,
    ProcessingStatusResponse, UploadBulkLabelsRequest, UploadBulkLabelsResponse, LABEL_HEIGHT,
    LABEL_WIDTH,
};
use crate::config::{ApiConfig, PoolConfig};
use crate::db::{page_repo, upload_repo, Database};
use crate::error::{LabelPoolError, Result};
use crate::model::{BulkUpload, PooledLabel, UploadStatus};
use crate::pipeline::{IngestionJob, IngestionService};
use crate::pool::{ClaimOutcome, LabelPool};
use crate::sanitize;
use crate::splitter;
use crate::status;
use crate::storage::{upload_key, ObjectStore, PDF_CONTENT_TYPE};

const GENERIC_ERROR: &str = "An internal error occurred. Please try again later.";

/// A lost claim race moves on to the next matching label this many times.
const MAX_CLAIM_ATTEMPTS: usize = 3;

/// Seconds of processing budgeted per page in the submission receipt.
const SECONDS_PER_PAGE: u32 = 2;

/// Receipt for an accepted bulk upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedUpload {
    pub upload_id: String,
    pub total_pages: u32,
    pub status: UploadStatus,
    pub estimated_processing_secs: u32,
    pub status_url: String,
}

impl From<SubmittedUpload> for UploadBulkLabelsResponse {
    fn from(receipt: SubmittedUpload) -> Self {
        Self {
            is_error: false,
            error_message: None,
            bulk_upload_id: Some(receipt.upload_id),
            status: Some(receipt.status),
            total_pages: Some(receipt.total_pages),
            estimated_processing_time: Some(receipt.estimated_processing_secs),
            status_check_url: Some(receipt.status_url),
        }
    }
}

pub struct PrepaidLabelService {
    db: Database,
    store: Arc<dyn ObjectStore>,
    ingestion: Arc<IngestionService>,
    pool: LabelPool,
    api: ApiConfig,
    hint_limit: usize,
}

impl PrepaidLabelService {
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        ingestion: Arc<IngestionService>,
        pool: LabelPool,
        api: ApiConfig,
        pool_config: &PoolConfig,
    ) -> Self {
        Self {
            db,
            store,
            ingestion,
            pool,
            api,
            hint_limit: pool_config.hint_limit,
        }
    }

    /// Validates and archives the document, records the upload and starts
    /// ingestion in the background. Must be called inside a tokio runtime.
    pub async fn upload_bulk_labels(
        &self,
        request: UploadBulkLabelsRequest,
    ) -> UploadBulkLabelsResponse {
        match self.submit_upload(request).await {
            Ok(receipt) => receipt.into(),
            Err(e) => self.failure("Bulk upload rejected", e),
        }
    }

    pub async fn submit_upload(&self, request: UploadBulkLabelsRequest) -> Result<SubmittedUpload> {
        if request.document.is_empty() {
            return Err(LabelPoolError::Validation("No file uploaded".to_string()));
        }
        require("CourierServiceId", &request.courier_service_id)?;
        require("OwnerId", &request.owner_id)?;

        let document: Arc<[u8]> = Arc::from(request.document);
        let upload_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let file_name = if request.file_name.trim().is_empty() {
            "labels.pdf".to_string()
        } else {
            request.file_name
        };

        let upload = {
            let db = self.db.clone();
            let store = Arc::clone(&self.store);
            let document = Arc::clone(&document);
            let upload_id = upload_id.clone();
            let owner_id = request.owner_id.clone();
            let courier_service_id = request.courier_service_id.clone();

            tokio::task::spawn_blocking(move || -> Result<BulkUpload> {
                let total_pages = splitter::page_count(&document)
                    .map_err(|e| LabelPoolError::Validation(format!("Invalid PDF file: {}", e)))?;

                let key = upload_key(now, &owner_id, &file_name);
                store.put(&key, &document, PDF_CONTENT_TYPE)?;

                let upload = BulkUpload {
                    id: upload_id,
                    owner_id,
                    courier_service_id,
                    original_file_name: file_name,
                    original_file_key: Some(key),
                    original_file_size: document.len() as u64,
                    total_pages,
                    status: UploadStatus::Uploaded,
                    uploaded_at: now,
                    processing_started_at: None,
                    processing_ended_at: None,
                };
                upload_repo::insert(&db, &upload)?;
                Ok(upload)
            })
            .await
            .map_err(|e| LabelPoolError::Task(e.to_string()))??
        };

        self.ingestion.submit(IngestionJob {
            upload_id: upload.id.clone(),
            owner_id: upload.owner_id.clone(),
            courier_service_id: upload.courier_service_id.clone(),
            document,
        })?;

        info!(
            upload_id = %upload.id,
            owner = %sanitize::hash_id(&upload.owner_id),
            pages = upload.total_pages,
            bytes = upload.original_file_size,
            "Bulk upload accepted"
        );

        Ok(SubmittedUpload {
            status_url: format!(
                "{}/PrepaidLabel/ProcessingStatus/{}",
                self.api.base_path.trim_end_matches('/'),
                upload.id
            ),
            estimated_processing_secs: upload.total_pages.saturating_mul(SECONDS_PER_PAGE),
            upload_id: upload.id,
            total_pages: upload.total_pages,
            status: UploadStatus::Processing,
        })
    }

    pub fn processing_status(&self, upload_id: &str) -> ProcessingStatusResponse {
        match status::processing_status(&self.db, upload_id) {
            Ok(progress) => ProcessingStatusResponse {
                progress: Some(progress),
                ..ProcessingStatusResponse::default()
            },
            Err(e) => self.failure("Status lookup failed", e),
        }
    }

    pub fn pool_status(
        &self,
        owner_id: &str,
        courier_service_id: Option<&str>,
    ) -> PoolStatusResponse {
        let result = require("OwnerId", owner_id)
            .and_then(|_| Ok(self.pool.stats(owner_id, courier_service_id)?));
        match result {
            Ok(stats) => PoolStatusResponse {
                total_labels_in_pool: stats.counts.total,
                available_labels: stats.counts.available,
                claimed_labels: stats.counts.claimed,
                expired_labels: stats.counts.expired,
                cancelled_labels: stats.counts.cancelled,
                labels: stats.labels.into_iter().map(PoolLabelSummary::from).collect(),
                ..PoolStatusResponse::default()
            },
            Err(e) => self.failure("Pool status failed", e),
        }
    }

    /// Claims a pooled label for the order and returns its tracking number
    /// and stored label image.
    pub fn generate_label(
        &self,
        owner_id: &str,
        request: &GenerateLabelRequest,
    ) -> GenerateLabelResponse {
        match self.try_generate_label(owner_id, request) {
            Ok(response) => response,
            Err(e) => self.failure("Label generation failed", e),
        }
    }

    fn try_generate_label(
        &self,
        owner_id: &str,
        request: &GenerateLabelRequest,
    ) -> Result<GenerateLabelResponse> {
        require("OrderReference", &request.order_reference)?;
        require("CourierServiceId", &request.courier_service_id)?;
        require("OwnerId", owner_id)?;

        let Some(label) = self.claim_for(owner_id, request)? else {
            return self.no_label_available(owner_id, request);
        };

        let png = match self.load_raster(&label) {
            Ok(png) => png,
            Err(reason) => {
                warn!(label_id = %label.id, %reason, "Claimed label has no usable image, releasing");
                self.pool.release(&label.id)?;
                return Ok(GenerateLabelResponse::from_error(format!(
                    "Pre-paid label for order reference '{}' has no label image ({}). \
                     The label was returned to the pool.",
                    request.order_reference, reason
                )));
            }
        };

        let encoded = base64::engine::general_purpose::STANDARD.encode(png);
        let packages = (1..=request.package_count.max(1))
            .map(|sequence_number| LabelPackage {
                sequence_number,
                tracking_number: label.tracking_number.clone(),
                png_label_data_base64: encoded.clone(),
                label_width: LABEL_WIDTH,
                label_height: LABEL_HEIGHT,
            })
            .collect();

        Ok(GenerateLabelResponse {
            lead_tracking_number: label.tracking_number,
            packages,
            ..GenerateLabelResponse::default()
        })
    }

    /// Looks up and claims a matching label, moving on to the next match
    /// when another request wins the race.
    fn claim_for(
        &self,
        owner_id: &str,
        request: &GenerateLabelRequest,
    ) -> Result<Option<PooledLabel>> {
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let Some(candidate) = self.pool.lookup(
                &request.order_reference,
                &request.courier_service_id,
                owner_id,
            )?
            else {
                return Ok(None);
            };

            match self.pool.claim(&candidate.id, request.consumer())? {
                ClaimOutcome::Claimed(label) => return Ok(Some(label)),
                ClaimOutcome::Unavailable { .. } | ClaimOutcome::NotFound => continue,
            }
        }
        Ok(None)
    }

    fn load_raster(&self, label: &PooledLabel) -> std::result::Result<Vec<u8>, String> {
        let page = page_repo::find_by_id(&self.db, &label.split_page_id)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "split page record missing".to_string())?;
        let key = page
            .raster_key
            .ok_or_else(|| "page was never rendered".to_string())?;
        self.store.get(&key).map_err(|e| e.to_string())
    }

    fn no_label_available(
        &self,
        owner_id: &str,
        request: &GenerateLabelRequest,
    ) -> Result<GenerateLabelResponse> {
        let hints =
            self.pool
                .available_references(owner_id, &request.courier_service_id, self.hint_limit)?;
        let listed = if hints.is_empty() {
            "None".to_string()
        } else {
            hints.join(", ")
        };

        Ok(GenerateLabelResponse {
            available_references: hints,
            ..GenerateLabelResponse::from_error(format!(
                "No pre-paid label found for order reference '{}'. Available labels: {}. \
                 Please upload labels first or change the order reference.",
                request.order_reference, listed
            ))
        })
    }

    /// Returns the label claimed for the order to the pool.
    pub fn cancel_label(&self, owner_id: &str, request: &CancelLabelRequest) -> CancelLabelResponse {
        let consumer = request.consumer_order_id.as_deref().filter(|c| !c.trim().is_empty());
        let result = require("OrderReference", &request.order_reference)
            .and_then(|_| require("OwnerId", owner_id))
            .and_then(|_| {
                Ok(self
                    .pool
                    .release_for_order(&request.order_reference, owner_id, consumer)?)
            });

        match result {
            Ok(Some(label)) => CancelLabelResponse {
                released_label_id: Some(label.id),
                ..CancelLabelResponse::default()
            },
            Ok(None) => CancelLabelResponse::from_error(format!(
                "No claimed label found for order '{}'",
                request.order_reference
            )),
            Err(e) => self.failure("Label cancellation failed", e),
        }
    }

    fn failure<R: ErrorResponse>(&self, context: &str, err: LabelPoolError) -> R {
        let message = match &err {
            LabelPoolError::Validation(message) => message.clone(),
            LabelPoolError::UploadNotFound(_) => err.to_string(),
            _ if self.api.expose_error_details => err.to_string(),
            _ => GENERIC_ERROR.to_string(),
        };
        match &err {
            LabelPoolError::Validation(_) | LabelPoolError::UploadNotFound(_) => {
                info!(error = %err, "{}", context)
            }
            _ => error!(error = %err, "{}", context),
        }
        R::from_error(message)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LabelPoolError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
