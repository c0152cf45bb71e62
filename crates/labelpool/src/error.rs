use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelPoolError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Split error: {0}")]
    Split(#[from] SplitError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Bulk upload not found: {0}")]
    UploadNotFound(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid command template '{name}': {reason}")]
    InvalidCommand { name: String, reason: String },

    #[error("Invalid environment override {var}='{value}'")]
    InvalidOverride { var: String, value: String },
}

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Document has no pages")]
    EmptyDocument,

    #[error("Failed to write page {page}: {reason}")]
    PageSave { page: u32, reason: String },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("{operation} worker crashed ({}): {stderr}", exit_label(.code))]
    Crash {
        operation: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to spawn worker '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Worker scratch IO failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkerError::Timeout { .. })
    }

    pub fn is_crash(&self) -> bool {
        matches!(self, WorkerError::Crash { .. })
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write object '{key}': {source}")]
    WriteObject {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read object '{key}': {source}")]
    ReadObject {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Empty object body for '{0}'")]
    EmptyObject(String),

    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LabelPoolError>;
