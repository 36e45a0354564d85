//! Database migrations for binar-sync.
//!
//! Each migration is a function that upgrades the schema by one version.
//! Migrations are run automatically when the database is opened.

use rusqlite::Connection;

use crate::error::SyncError;

/// Current schema version.
const CURRENT_VERSION: i32 = 1;

/// Get the current schema version from the database.
///
/// Returns 0 if no version has been set (new database).
pub fn get_version(conn: &Connection) -> Result<i32, SyncError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| SyncError::db("Failed to get schema version", &e))
}

/// Set the schema version in the database.
fn set_version(conn: &Connection, version: i32) -> Result<(), SyncError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| SyncError::db("Failed to set schema version", &e))
}

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<(), SyncError> {
    let current = get_version(conn)?;

    if current >= CURRENT_VERSION {
        return Ok(());
    }

    for version in (current + 1)..=CURRENT_VERSION {
        run_migration(conn, version)?;
        set_version(conn, version)?;
    }

    Ok(())
}

/// Run a specific migration.
fn run_migration(conn: &Connection, version: i32) -> Result<(), SyncError> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(SyncError::Database(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: Initial schema.
///
/// Creates tables for:
/// - `sync_queue`: Durable mutation queue, drained in (`created_at`, `seq`) order
/// - `entities`: Cached server records, partitioned by entity type
/// - `sync_metadata`: Key/value bookkeeping for pulls
fn migrate_v1(conn: &Connection) -> Result<(), SyncError> {
    conn.execute_batch(
        r"
        -- Sync queue for offline mutations
        CREATE TABLE IF NOT EXISTS sync_queue (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            entity_type TEXT NOT NULL,
            operation_kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            target_id TEXT,
            created_at INTEGER NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            last_attempt INTEGER,
            last_error TEXT,
            error_type TEXT,
            updated_at INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_sync_queue_order
        ON sync_queue(created_at, seq);

        CREATE INDEX IF NOT EXISTS idx_sync_queue_status
        ON sync_queue(status);

        -- Cached server entities
        CREATE TABLE IF NOT EXISTS entities (
            entity_type TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            local_only INTEGER NOT NULL DEFAULT 0,
            op_id TEXT,
            updated_at INTEGER NOT NULL,
            synced_at INTEGER,
            PRIMARY KEY (entity_type, id)
        );

        CREATE INDEX IF NOT EXISTS idx_entities_op
        ON entities(op_id);

        -- Sync bookkeeping
        CREATE TABLE IF NOT EXISTS sync_metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        ",
    )
    .map_err(|e| SyncError::db("Migration v1 failed", &e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_v1() {
        let conn = Connection::open_in_memory().unwrap();

        run(&conn).unwrap();
        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);

        conn.execute(
            "INSERT INTO sync_queue (id, entity_type, operation_kind, payload, created_at)
             VALUES ('op-1', 'workers', 'create', '{}', 1700000000000)",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO entities (entity_type, id, data, updated_at)
             VALUES ('workers', 'w1', '{\"name\":\"Ali\"}', 1700000000000)",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO sync_metadata (key, value, updated_at) VALUES ('last_pull', '0', 0)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_queue_ids_unique() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();

        let insert = "INSERT INTO sync_queue (id, entity_type, operation_kind, payload, created_at)
                      VALUES ('dup', 'workers', 'create', '{}', 1)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_migration_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run(&conn).unwrap();
        run(&conn).unwrap();

        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_get_version_new_database() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(get_version(&conn).unwrap(), 0);
    }
}
