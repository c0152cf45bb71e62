use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::extractor::LabelInfo;
use crate::model::{PooledLabel, SplitPage};

use super::error::PipelineWarning;

/// One upload handed to the orchestrator. Inputs are validated upstream.
#[derive(Debug, Clone)]
pub struct IngestionJob {
    pub upload_id: String,
    pub owner_id: String,
    pub courier_service_id: String,
    pub document: Arc<[u8]>,
}

/// State carried through the steps for a single page.
pub struct PageContext {
    // Input
    pub job: Arc<IngestionJob>,
    pub page_number: u32,
    pub bytes: Arc<[u8]>,
    /// Date used in every object key of this upload.
    pub key_date: DateTime<Utc>,

    // Extraction
    pub text: Option<String>,
    pub info: Option<LabelInfo>,

    // Stored artifacts
    pub document_key: Option<String>,
    pub raster_key: Option<String>,

    // Records
    pub page: Option<SplitPage>,
    pub label: Option<PooledLabel>,

    pub warnings: Vec<PipelineWarning>,
}

impl PageContext {
    pub fn new(
        job: Arc<IngestionJob>,
        page_number: u32,
        bytes: Vec<u8>,
        key_date: DateTime<Utc>,
    ) -> Self {
        Self {
            job,
            page_number,
            bytes: Arc::from(bytes),
            key_date,
            text: None,
            info: None,
            document_key: None,
            raster_key: None,
            page: None,
            label: None,
            warnings: Vec::new(),
        }
    }
}
