use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::WorkerConfig;
use crate::db::{page_repo, upload_repo, Database};
use crate::error::{LabelPoolError, Result};
use crate::extractor::{extract_label_info, validate_extracted};
use crate::model::{PageStatus, SplitPage, UploadStatus};
use crate::pool::{Enrollment, LabelPool};
use crate::sanitize;
use crate::splitter;
use crate::storage::{page_key, ObjectStore, PageArtifact};
use crate::worker::PageExtractor;

use super::context::{IngestionJob, PageContext};
use super::error::{PageError, PipelineWarning};

/// Outcome counts for one upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    pub upload_id: String,
    pub total_pages: u32,
    /// Pages that produced a split page record.
    pub pages_recorded: u32,
    pub labels_enrolled: u32,
    /// Pages that failed entirely and left no record.
    pub pages_failed: u32,
    /// Recorded pages without a stored raster.
    pub rasters_missing: u32,
}

/// Drives one upload from source document to pool entries.
pub struct Pipeline {
    db: Database,
    store: Arc<dyn ObjectStore>,
    extractor: Arc<dyn PageExtractor>,
    pool: LabelPool,
    render_scale: f32,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn PageExtractor>,
        pool: LabelPool,
        worker: &WorkerConfig,
    ) -> Self {
        Self {
            db,
            store,
            extractor,
            pool,
            render_scale: worker.render_scale,
            concurrency: worker.concurrency.max(1),
        }
    }

    /// Runs the whole upload. Page failures are counted in the report; an
    /// `Err` means the upload itself failed and has been marked `FAILED`.
    pub async fn run(&self, job: IngestionJob) -> Result<IngestionReport> {
        let job = Arc::new(job);
        let span = info_span!("ingest",
            upload_id = %job.upload_id,
            owner = %sanitize::hash_id(&job.owner_id),
            courier = %job.courier_service_id,
        );

        async move {
            match self.run_upload(&job).await {
                Ok(report) => {
                    info!(
                        pages = report.total_pages,
                        recorded = report.pages_recorded,
                        enrolled = report.labels_enrolled,
                        failed = report.pages_failed,
                        "Upload completed"
                    );
                    Ok(report)
                }
                Err(e) => {
                    error!(error = %e, "Upload failed");
                    if let Err(mark_err) = self.finish(&job.upload_id, UploadStatus::Failed).await {
                        error!(error = %mark_err, "Could not mark upload as failed");
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_upload(&self, job: &Arc<IngestionJob>) -> Result<IngestionReport> {
        let started = Utc::now();

        // Step 1: mark processing
        {
            let db = self.db.clone();
            let id = job.upload_id.clone();
            let found = tokio::task::spawn_blocking(move || {
                upload_repo::mark_processing(&db, &id, started)
            })
            .await
            .map_err(|e| LabelPoolError::Task(e.to_string()))??;
            if !found {
                return Err(LabelPoolError::UploadNotFound(job.upload_id.clone()));
            }
        }

        // Step 2: split
        let document = Arc::clone(&job.document);
        let pages = tokio::task::spawn_blocking(move || splitter::split(&document))
            .await
            .map_err(|e| LabelPoolError::Task(e.to_string()))??;
        let total_pages = pages.len() as u32;
        {
            let db = self.db.clone();
            let id = job.upload_id.clone();
            tokio::task::spawn_blocking(move || upload_repo::set_total_pages(&db, &id, total_pages))
                .await
                .map_err(|e| LabelPoolError::Task(e.to_string()))??;
        }
        info!(pages = total_pages, "Document split");

        // Step 3: pages, bounded concurrency, any order
        let mut report = IngestionReport {
            upload_id: job.upload_id.clone(),
            total_pages,
            ..IngestionReport::default()
        };

        let mut results = stream::iter(pages.into_iter().enumerate().map(|(i, bytes)| {
            let ctx = PageContext::new(Arc::clone(job), i as u32 + 1, bytes, started);
            self.process_page(ctx)
        }))
        .buffer_unordered(self.concurrency);

        while let Some(result) = results.next().await {
            match result {
                Ok(ctx) => {
                    report.pages_recorded += 1;
                    if ctx.label.is_some() {
                        report.labels_enrolled += 1;
                    }
                    if ctx.raster_key.is_none() {
                        report.rasters_missing += 1;
                    }
                }
                Err(_) => report.pages_failed += 1,
            }
        }

        // Step 4: finish
        self.finish(&job.upload_id, UploadStatus::Completed).await?;
        Ok(report)
    }

    async fn finish(&self, upload_id: &str, status: UploadStatus) -> Result<()> {
        let db = self.db.clone();
        let id = upload_id.to_string();
        tokio::task::spawn_blocking(move || {
            upload_repo::mark_finished(&db, &id, status, Utc::now())
        })
        .await
        .map_err(|e| LabelPoolError::Task(e.to_string()))??;
        Ok(())
    }

    /// Processes one page. Errors are logged here and only counted by the
    /// caller.
    async fn process_page(&self, mut ctx: PageContext) -> std::result::Result<PageContext, PageError> {
        let page = ctx.page_number;
        async move {
            match self.run_page_steps(&mut ctx).await {
                Ok(()) => {
                    for warning in &ctx.warnings {
                        debug!(?warning, "Page warning");
                    }
                    Ok(ctx)
                }
                Err(e) => {
                    warn!(kind = e.kind(), error = %e, "Page failed");
                    Err(e)
                }
            }
        }
        .instrument(info_span!("page", page))
        .await
    }

    async fn run_page_steps(&self, ctx: &mut PageContext) -> std::result::Result<(), PageError> {
        // Step 1: text
        let text = self.extractor.extract_text(&ctx.bytes).await?;

        // Step 2: fields
        let info = extract_label_info(&text);
        let verdict = validate_extracted(&info);
        if !verdict.missing_fields.is_empty() {
            ctx.warnings.push(PipelineWarning::FieldsMissing {
                page: ctx.page_number,
                missing: verdict.missing_fields.clone(),
            });
        }
        debug!(
            confidence = info.confidence,
            valid = verdict.is_valid,
            "Fields extracted"
        );
        ctx.text = Some(text);

        // Step 3: page document
        let document_key = page_key(
            ctx.key_date,
            &ctx.job.upload_id,
            ctx.page_number,
            PageArtifact::Document,
        );
        self.put(&document_key, Arc::clone(&ctx.bytes), PageArtifact::Document)
            .await?;
        ctx.document_key = Some(document_key.clone());

        // Step 4: raster, failure keeps the page
        match self.render_and_store(ctx).await {
            Ok(key) => ctx.raster_key = Some(key),
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Raster unavailable, page kept");
                ctx.warnings.push(PipelineWarning::RasterFailed {
                    page: ctx.page_number,
                    error: e.to_string(),
                });
            }
        }

        // Step 5: record and enroll
        let page = SplitPage {
            id: uuid::Uuid::new_v4().to_string(),
            upload_id: ctx.job.upload_id.clone(),
            page_number: ctx.page_number,
            document_key,
            raster_key: ctx.raster_key.clone(),
            tracking_number: info.tracking_number.clone(),
            order_reference: info.order_reference.clone(),
            recipient_name: info.recipient_name.clone(),
            confidence: info.confidence,
            status: PageStatus::Extracted,
            created_at: Utc::now(),
        };
        let usable = info.is_usable();
        ctx.info = Some(info);

        let db = self.db.clone();
        let pool = self.pool.clone();
        let job = Arc::clone(&ctx.job);
        let (page, label) = tokio::task::spawn_blocking(move || {
            page_repo::insert(&db, &page)?;
            let label = if usable {
                Some(pool.enroll(
                    Enrollment {
                        upload_id: &job.upload_id,
                        split_page_id: &page.id,
                        order_reference: &page.order_reference,
                        tracking_number: &page.tracking_number,
                        courier_service_id: &job.courier_service_id,
                        owner_id: &job.owner_id,
                    },
                    Utc::now(),
                )?)
            } else {
                None
            };
            Ok::<_, PageError>((page, label))
        })
        .await
        .map_err(|e| PageError::Task(e.to_string()))??;

        if label.is_none() {
            debug!("Page recorded without pool entry");
        }
        ctx.page = Some(page);
        ctx.label = label;
        Ok(())
    }

    async fn render_and_store(&self, ctx: &PageContext) -> std::result::Result<String, PageError> {
        let raster = self
            .extractor
            .render_raster(&ctx.bytes, self.render_scale)
            .await?;
        let key = page_key(
            ctx.key_date,
            &ctx.job.upload_id,
            ctx.page_number,
            PageArtifact::Raster,
        );
        self.put(&key, Arc::from(raster), PageArtifact::Raster).await?;
        Ok(key)
    }

    async fn put(
        &self,
        key: &str,
        bytes: Arc<[u8]>,
        artifact: PageArtifact,
    ) -> std::result::Result<(), PageError> {
        let store = Arc::clone(&self.store);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.put(&key, &bytes, artifact.content_type()))
            .await
            .map_err(|e| PageError::Task(e.to_string()))??;
        Ok(())
    }
}
