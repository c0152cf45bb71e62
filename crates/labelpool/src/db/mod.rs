//! Persistent storage for uploads, split pages and the label pool.
//!
//! Uses rusqlite with a thread-safe `Database` handle. All access is
//! serialized through a `Mutex<Connection>`, which is what makes the pool's
//! conditional updates atomic with respect to each other.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod migrations;
pub mod page_repo;
pub mod pool_repo;
pub mod upload_repo;

pub use error::DatabaseError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable database handle wrapping a single connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database file and runs pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database with all migrations applied.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// Reads an RFC 3339 text column into a UTC timestamp.
pub(crate) fn get_timestamp(
    row: &rusqlite::Row<'_>,
    column: &str,
) -> Result<chrono::DateTime<chrono::Utc>, rusqlite::Error> {
    let raw: String = row.get(column)?;
    crate::model::parse_timestamp(&raw).map_err(|e| corrupt(column, e))
}

pub(crate) fn get_optional_timestamp(
    row: &rusqlite::Row<'_>,
    column: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, rusqlite::Error> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|r| crate::model::parse_timestamp(&r).map_err(|e| corrupt(column, e)))
        .transpose()
}

fn corrupt(column: &str, e: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(DatabaseError::Corrupt {
            column: column.to_string(),
            reason: e.to_string(),
        }),
    )
}
