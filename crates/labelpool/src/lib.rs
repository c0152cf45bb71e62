pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod pool;
pub mod sanitize;
pub mod service;
pub mod splitter;
pub mod status;
pub mod storage;
pub mod worker;

pub use app::App;
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, LabelPoolError, Result, SplitError, StorageError, WorkerError,
};
pub use extractor::{extract_label_info, validate_extracted, LabelInfo};
pub use logging::init_logging;
pub use model::{BulkUpload, LabelStatus, PageStatus, PooledLabel, SplitPage, UploadStatus};
pub use pipeline::{IngestionJob, IngestionReport, IngestionService, Pipeline};
pub use pool::{ClaimOutcome, ExpirySweeper, LabelPool};
pub use service::{PrepaidLabelService, SubmittedUpload};
pub use status::{processing_status, ProcessingStatus};
pub use storage::{FileStorage, ObjectStore};
pub use worker::{PageExtractor, SubprocessExtractor};
