//! Schema migrations.
//!
//! Applied versions are recorded in `_migrations`; each migration runs at
//! most once, in version order.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_bulk_uploads_table",
        sql: include_str!("sql/001_create_bulk_uploads.sql"),
    },
    Migration {
        version: 2,
        description: "create_split_pages_table",
        sql: include_str!("sql/002_create_split_pages.sql"),
    },
    Migration {
        version: 3,
        description: "create_pooled_labels_table",
        sql: include_str!("sql/003_create_pooled_labels.sql"),
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        log::info!(
            "Applying migration v{}: {}",
            migration.version,
            migration.description
        );
        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();
        conn
    }

    fn applied(conn: &Connection) -> u32 {
        conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_fresh_db_records_every_migration() {
        let conn = migrated();
        assert_eq!(applied(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_rerun_is_noop() {
        let conn = migrated();
        run_all(&conn).unwrap();
        assert_eq!(applied(&conn), MIGRATIONS.len() as u32);
    }

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(|name| name.unwrap())
            .collect()
    }

    #[test]
    fn test_split_pages_has_extraction_columns() {
        let conn = migrated();
        let columns = columns(&conn, "split_pages");
        for expected in ["tracking_number", "order_reference", "recipient_name", "confidence"] {
            assert!(columns.iter().any(|c| c == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_partially_migrated_db_resumes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE _migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .unwrap();
        conn.execute_batch(include_str!("sql/001_create_bulk_uploads.sql"))
            .unwrap();
        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (1, 'create_bulk_uploads_table')",
            [],
        )
        .unwrap();

        run_all(&conn).unwrap();
        assert_eq!(applied(&conn), MIGRATIONS.len() as u32);
        assert!(columns(&conn, "pooled_labels").iter().any(|c| c == "claimed_by"));
    }

    #[test]
    fn test_pool_rejects_second_label_for_same_page() {
        let conn = migrated();
        conn.execute_batch(
            "INSERT INTO bulk_uploads (id, owner_id, courier_service_id, original_file_name, uploaded_at)
                 VALUES ('u1', 'o1', 'c1', 'a.pdf', '2026-01-01T00:00:00.000000Z');
             INSERT INTO split_pages (id, upload_id, page_number, document_key, created_at)
                 VALUES ('p1', 'u1', 1, 'k', '2026-01-01T00:00:00.000000Z');
             INSERT INTO pooled_labels (id, upload_id, split_page_id, order_reference, tracking_number,
                 courier_service_id, owner_id, created_at, expires_at)
                 VALUES ('l1', 'u1', 'p1', '1', '1', 'c1', 'o1', 'x', 'y');",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO pooled_labels (id, upload_id, split_page_id, order_reference, tracking_number,
                 courier_service_id, owner_id, created_at, expires_at)
                 VALUES ('l2', 'u1', 'p1', '1', '1', 'c1', 'o1', 'x', 'y')",
            [],
        );
        assert!(dup.is_err());
    }
}
