//! Background execution of ingestion jobs.

use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;

use crate::error::{LabelPoolError, Result};

use super::context::IngestionJob;
use super::runner::{IngestionReport, Pipeline};

/// Spawns one detached task per upload and keeps track of them so shutdown
/// can wait for in-flight work.
pub struct IngestionService {
    pipeline: Arc<Pipeline>,
    tasks: Mutex<JoinSet<()>>,
}

impl IngestionService {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Starts processing in the background and returns immediately. The
    /// outcome is only observable through the upload's persisted status.
    pub fn submit(&self, job: IngestionJob) -> Result<()> {
        let pipeline = Arc::clone(&self.pipeline);
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| LabelPoolError::Task("ingestion task set poisoned".to_string()))?;

        // Reap finished tasks so the set does not grow without bound.
        while let Some(done) = tasks.try_join_next() {
            if let Err(e) = done {
                tracing::error!(error = %e, "Ingestion task panicked");
            }
        }

        tasks.spawn(async move {
            // Errors were logged and recorded on the upload by the pipeline.
            let _ = pipeline.run(job).await;
        });
        Ok(())
    }

    /// Runs an upload to completion on the caller's task.
    pub async fn run(&self, job: IngestionJob) -> Result<IngestionReport> {
        self.pipeline.run(job).await
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// Waits for every submitted upload to finish.
    pub async fn shutdown(&self) {
        let mut tasks = match self.tasks.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        while let Some(done) = tasks.join_next().await {
            if let Err(e) = done {
                tracing::error!(error = %e, "Ingestion task panicked");
            }
        }
    }
}
