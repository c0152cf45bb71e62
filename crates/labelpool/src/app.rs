//! Process-scoped wiring: every long-lived handle is created here and
//! passed down explicitly.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::pipeline::{IngestionService, Pipeline};
use crate::pool::{ExpirySweeper, LabelPool};
use crate::sanitize::redact_path;
use crate::service::PrepaidLabelService;
use crate::storage::{FileStorage, ObjectStore};
use crate::worker::{PageExtractor, SubprocessExtractor};

pub struct App {
    pub config: Config,
    pub db: Database,
    pub store: Arc<dyn ObjectStore>,
    pub pool: LabelPool,
    pub ingestion: Arc<IngestionService>,
    pub service: PrepaidLabelService,
    sweeper: Option<(ExpirySweeper, JoinHandle<()>)>,
}

impl App {
    /// Opens storage and starts the background sweeper. Must run inside a
    /// tokio runtime.
    pub fn init(config: Config) -> Result<Self> {
        let extractor: Arc<dyn PageExtractor> =
            Arc::new(SubprocessExtractor::from_config(&config.worker));
        Self::with_extractor(config, extractor)
    }

    /// Like [`App::init`] with a caller-supplied page extractor.
    pub fn with_extractor(config: Config, extractor: Arc<dyn PageExtractor>) -> Result<Self> {
        let db_path = config.resolved_database_path();
        let db = Database::open(&db_path)?;
        let storage_root = config.resolved_storage_root();
        let store: Arc<dyn ObjectStore> = Arc::new(FileStorage::new(&storage_root));
        tracing::info!(
            database = %redact_path(&db_path),
            storage = %redact_path(&storage_root),
            "Storage opened"
        );

        Ok(Self::assemble(config, db, store, extractor))
    }

    /// Wires the components over already-open handles.
    pub fn assemble(
        config: Config,
        db: Database,
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn PageExtractor>,
    ) -> Self {
        let pool = LabelPool::new(db.clone(), config.pool.retention_days);
        let pipeline = Pipeline::new(
            db.clone(),
            Arc::clone(&store),
            extractor,
            pool.clone(),
            &config.worker,
        );
        let ingestion = Arc::new(IngestionService::new(pipeline));
        let service = PrepaidLabelService::new(
            db.clone(),
            Arc::clone(&store),
            Arc::clone(&ingestion),
            pool.clone(),
            config.api.clone(),
            &config.pool,
        );

        let sweeper = match config.pool.sweep_interval_secs {
            0 => None,
            secs => {
                let sweeper = ExpirySweeper::new(pool.clone(), Duration::from_secs(secs));
                let handle = sweeper.start();
                Some((sweeper, handle))
            }
        };

        Self {
            config,
            db,
            store,
            pool,
            ingestion,
            service,
            sweeper,
        }
    }

    /// Waits for in-flight uploads, then stops the sweeper.
    pub async fn shutdown(mut self) {
        self.ingestion.shutdown().await;

        if let Some((sweeper, handle)) = self.sweeper.take() {
            sweeper.stop();
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Expiry sweeper ended abnormally");
            }
        }
        tracing::info!("Shutdown complete");
    }
}
