//! Shared test utilities for labelpool integration tests.
//!
//! - `TestHarness`: temp object store, in-memory database and the wired
//!   application around a scripted page extractor
//! - builders for label PDFs and uploads

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{ScriptedExtractor, TestHarness};
