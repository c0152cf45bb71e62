//! Isolated application instances for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use labelpool::config::Config;
use labelpool::db::{upload_repo, Database};
use labelpool::model::{BulkUpload, UploadStatus};
use labelpool::storage::{FileStorage, ObjectStore};
use labelpool::{App, PageExtractor, Pipeline, WorkerError};

use super::builders::{new_upload, page_text, png_bytes};

/// Fake extractor scripted by page content.
///
/// Returns the page's text unchanged. Pages containing `TIMEOUT` or `CRASH`
/// fail text extraction accordingly; pages containing `NORENDER` fail
/// rasterisation.
#[derive(Default)]
pub struct ScriptedExtractor {
    pub text_calls: AtomicUsize,
    pub render_calls: AtomicUsize,
}

#[async_trait]
impl PageExtractor for ScriptedExtractor {
    async fn extract_text(&self, page: &[u8]) -> Result<String, WorkerError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        let text = page_text(page);
        if text.contains("TIMEOUT") {
            return Err(WorkerError::Timeout {
                operation: "text extraction".to_string(),
                timeout_ms: 50,
            });
        }
        if text.contains("CRASH") {
            return Err(WorkerError::Crash {
                operation: "text extraction".to_string(),
                code: Some(139),
                stderr: "segmentation fault".to_string(),
            });
        }
        Ok(text)
    }

    async fn render_raster(&self, page: &[u8], _scale: f32) -> Result<Vec<u8>, WorkerError> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        if page_text(page).contains("NORENDER") {
            return Err(WorkerError::Render("scripted render failure".to_string()));
        }
        Ok(png_bytes(40, 60))
    }
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub app: App,
    pub extractor: Arc<ScriptedExtractor>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Self::default_config())
    }

    /// Sweeper disabled, two page workers.
    pub fn default_config() -> Config {
        let mut config = Config::default();
        config.worker.concurrency = 2;
        config.pool.sweep_interval_secs = 0;
        config
    }

    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open database");
        let store: Arc<dyn ObjectStore> = Arc::new(FileStorage::new(temp_dir.path()));
        let extractor = Arc::new(ScriptedExtractor::default());
        let app = App::assemble(
            config,
            db,
            store,
            Arc::clone(&extractor) as Arc<dyn PageExtractor>,
        );
        Self {
            temp_dir,
            app,
            extractor,
        }
    }

    pub fn storage_root(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    /// A pipeline over the harness's database, store and extractor.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.app.db.clone(),
            Arc::clone(&self.app.store),
            Arc::clone(&self.extractor) as Arc<dyn PageExtractor>,
            self.app.pool.clone(),
            &self.app.config.worker,
        )
    }

    pub fn insert_upload(&self, id: &str, owner: &str, courier: &str) -> BulkUpload {
        let upload = new_upload(id, owner, courier);
        upload_repo::insert(&self.app.db, &upload).expect("Failed to insert upload");
        upload
    }

    pub fn upload(&self, id: &str) -> BulkUpload {
        upload_repo::find_by_id(&self.app.db, id)
            .expect("Failed to read upload")
            .expect("Upload missing")
    }

    /// Polls until the upload reaches a terminal status.
    pub async fn wait_for_upload(&self, id: &str) -> BulkUpload {
        for _ in 0..200 {
            let upload = self.upload(id);
            if upload.status.is_terminal() {
                return upload;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("Upload {} did not finish", id);
    }

    pub async fn wait_completed(&self, id: &str) {
        let upload = self.wait_for_upload(id).await;
        assert_eq!(upload.status, UploadStatus::Completed);
    }
}
