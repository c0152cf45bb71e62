//! Page extraction worker.
//!
//! Text extraction and rasterisation run outside the orchestrating process,
//! one bounded child process per call, so a page that hangs or crashes its
//! parser costs only that page.

use async_trait::async_trait;

use crate::error::WorkerError;

pub mod isolate;
pub mod poppler;

pub use isolate::run_isolated;
pub use poppler::SubprocessExtractor;

/// Per-page extraction operations. Every call is independent and bounded.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Raw text of a single-page PDF.
    async fn extract_text(&self, page: &[u8]) -> Result<String, WorkerError>;

    /// Lossless raster (PNG) of a single-page PDF at `scale` × 72 DPI.
    async fn render_raster(&self, page: &[u8], scale: f32) -> Result<Vec<u8>, WorkerError>;
}
