pub mod context;
pub mod error;
pub mod runner;
pub mod tasks;

pub use context::{IngestionJob, PageContext};
pub use error::{PageError, PipelineWarning};
pub use runner::{IngestionReport, Pipeline};
pub use tasks::IngestionService;
