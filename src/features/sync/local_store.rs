//! Cached copies of server entities.
//!
//! Records written optimistically before the server confirms them carry
//! `local_only = true` and the id of the create operation that will
//! confirm them. The free functions take a plain connection so they can run
//! inside a queue transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::operation::{from_millis, now_millis};
use crate::error::SyncError;
use crate::remote::FullBackup;
use crate::storage::Database;

/// Metadata key for the time of the last full pull.
pub const LAST_PULL_KEY: &str = "last_pull";
/// Metadata key for the number of records in the last full pull.
pub const RECORD_COUNT_KEY: &str = "record_count";

const PLACEHOLDER_PREFIX: &str = "local-";

/// A cached record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedEntity {
    pub entity_type: String,
    pub id: String,
    pub data: Value,
    /// Created offline and not yet confirmed by the server
    pub local_only: bool,
    /// Create operation that will confirm this placeholder
    pub op_id: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Read access to the cache plus the full-backup import.
#[derive(Debug, Clone)]
pub struct LocalStore {
    db: Database,
}

impl LocalStore {
    #[must_use]
    pub const fn with_database(db: Database) -> Self {
        Self { db }
    }

    /// Get one cached record.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, entity_type: &str, id: &str) -> Result<Option<CachedEntity>, SyncError> {
        get(&*self.db.connection()?, entity_type, id)
    }

    /// All cached records of one entity type, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self, entity_type: &str) -> Result<Vec<CachedEntity>, SyncError> {
        let conn = self.db.connection()?;

        let mut stmt = conn
            .prepare(
                r"SELECT entity_type, id, data, local_only, op_id, updated_at, synced_at
                  FROM entities
                  WHERE entity_type = ?1
                  ORDER BY updated_at ASC, id ASC",
            )
            .map_err(|e| SyncError::db("Failed to prepare query", &e))?;

        let rows = stmt
            .query_map([entity_type], row_to_entity)
            .map_err(|e| SyncError::db("Failed to query entities", &e))?;

        rows.map(|row| row.map_err(|e| SyncError::db("Failed to read entity", &e)))
            .collect()
    }

    /// Entity types present in the cache with their record counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn entity_types(&self) -> Result<Vec<(String, usize)>, SyncError> {
        let conn = self.db.connection()?;

        let mut stmt = conn
            .prepare(
                "SELECT entity_type, COUNT(*) FROM entities GROUP BY entity_type ORDER BY entity_type",
            )
            .map_err(|e| SyncError::db("Failed to prepare query", &e))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| SyncError::db("Failed to query entity types", &e))?;

        rows.map(|row| row.map_err(|e| SyncError::db("Failed to read entity type", &e)))
            .collect()
    }

    /// Read a metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn metadata(&self, key: &str) -> Result<Option<String>, SyncError> {
        get_metadata(&*self.db.connection()?, key)
    }

    /// Replace cached tables with a full backup.
    ///
    /// Unconfirmed placeholders survive the import. Returns the number of
    /// records stored.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is changed in that case.
    pub fn import_backup(&self, backup: &FullBackup) -> Result<usize, SyncError> {
        let mut conn = self.db.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| SyncError::db("Failed to begin transaction", &e))?;

        let now = now_millis().timestamp_millis();
        let mut stored = 0;

        for (table, records) in &backup.tables {
            tx.execute(
                "DELETE FROM entities WHERE entity_type = ?1 AND local_only = 0",
                [table],
            )
            .map_err(|e| SyncError::db("Failed to clear cached table", &e))?;

            for record in records {
                let Some(id) = entity_id(record) else {
                    debug!(table, "skipping backup record without id");
                    continue;
                };

                tx.execute(
                    r"INSERT OR REPLACE INTO entities
                      (entity_type, id, data, local_only, op_id, updated_at, synced_at)
                      VALUES (?1, ?2, ?3, 0, NULL, ?4, ?4)",
                    params![table, id, serde_json::to_string(record)?, now],
                )
                .map_err(|e| SyncError::db("Failed to store backup record", &e))?;
                stored += 1;
            }
        }

        set_metadata(&tx, LAST_PULL_KEY, &now.to_string())?;
        set_metadata(&tx, RECORD_COUNT_KEY, &stored.to_string())?;

        tx.commit()
            .map_err(|e| SyncError::db("Failed to commit backup import", &e))?;

        Ok(stored)
    }
}

/// Generate an id for a record created offline.
#[must_use]
pub fn placeholder_id() -> String {
    format!("{PLACEHOLDER_PREFIX}{}", uuid::Uuid::new_v4())
}

/// Whether an id was generated by [`placeholder_id`].
#[must_use]
pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

/// The `id` field of a record, as a string.
#[must_use]
pub fn entity_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn get(
    conn: &Connection,
    entity_type: &str,
    id: &str,
) -> Result<Option<CachedEntity>, SyncError> {
    conn.query_row(
        r"SELECT entity_type, id, data, local_only, op_id, updated_at, synced_at
          FROM entities WHERE entity_type = ?1 AND id = ?2",
        params![entity_type, id],
        row_to_entity,
    )
    .optional()
    .map_err(|e| SyncError::db("Failed to query entity", &e))
}

/// Store an unconfirmed record created offline.
pub(crate) fn put_placeholder(
    conn: &Connection,
    entity_type: &str,
    id: &str,
    data: &Value,
    op_id: &str,
) -> Result<(), SyncError> {
    conn.execute(
        r"INSERT OR REPLACE INTO entities
          (entity_type, id, data, local_only, op_id, updated_at, synced_at)
          VALUES (?1, ?2, ?3, 1, ?4, ?5, NULL)",
        params![
            entity_type,
            id,
            serde_json::to_string(data)?,
            op_id,
            now_millis().timestamp_millis()
        ],
    )
    .map_err(|e| SyncError::db("Failed to store local record", &e))?;
    Ok(())
}

/// Merge changed fields into the cached record, creating it if absent.
pub(crate) fn apply_local_update(
    conn: &Connection,
    entity_type: &str,
    id: &str,
    changes: &Value,
) -> Result<Value, SyncError> {
    let existing = get(conn, entity_type, id)?;

    let mut data = match existing.as_ref().map(|e| &e.data) {
        Some(Value::Object(map)) => map.clone(),
        _ => {
            let mut map = Map::new();
            map.insert("id".to_string(), Value::String(id.to_string()));
            map
        }
    };
    if let Value::Object(changes) = changes {
        for (key, value) in changes {
            data.insert(key.clone(), value.clone());
        }
    }
    let data = Value::Object(data);

    conn.execute(
        r"INSERT INTO entities (entity_type, id, data, local_only, op_id, updated_at, synced_at)
          VALUES (?1, ?2, ?3, 0, NULL, ?4, NULL)
          ON CONFLICT(entity_type, id) DO UPDATE SET data = ?3, updated_at = ?4",
        params![
            entity_type,
            id,
            serde_json::to_string(&data)?,
            now_millis().timestamp_millis()
        ],
    )
    .map_err(|e| SyncError::db("Failed to update local record", &e))?;

    Ok(data)
}

/// Store the server's representation of a record.
pub(crate) fn put_synced(
    conn: &Connection,
    entity_type: &str,
    id: &str,
    data: &Value,
) -> Result<(), SyncError> {
    let now = now_millis().timestamp_millis();
    conn.execute(
        r"INSERT OR REPLACE INTO entities
          (entity_type, id, data, local_only, op_id, updated_at, synced_at)
          VALUES (?1, ?2, ?3, 0, NULL, ?4, ?4)",
        params![entity_type, id, serde_json::to_string(data)?, now],
    )
    .map_err(|e| SyncError::db("Failed to store synced record", &e))?;
    Ok(())
}

/// Remove a cached record.
pub(crate) fn remove(conn: &Connection, entity_type: &str, id: &str) -> Result<bool, SyncError> {
    let rows = conn
        .execute(
            "DELETE FROM entities WHERE entity_type = ?1 AND id = ?2",
            params![entity_type, id],
        )
        .map_err(|e| SyncError::db("Failed to delete local record", &e))?;
    Ok(rows > 0)
}

/// The placeholder written for a create operation, if still cached.
pub(crate) fn placeholder_for(
    conn: &Connection,
    op_id: &str,
) -> Result<Option<CachedEntity>, SyncError> {
    conn.query_row(
        r"SELECT entity_type, id, data, local_only, op_id, updated_at, synced_at
          FROM entities WHERE op_id = ?1 AND local_only = 1",
        [op_id],
        row_to_entity,
    )
    .optional()
    .map_err(|e| SyncError::db("Failed to query placeholder", &e))
}

pub(crate) fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>, SyncError> {
    conn.query_row(
        "SELECT value FROM sync_metadata WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| SyncError::db("Failed to read metadata", &e))
}

pub(crate) fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<(), SyncError> {
    conn.execute(
        r"INSERT INTO sync_metadata (key, value, updated_at) VALUES (?1, ?2, ?3)
          ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
        params![key, value, now_millis().timestamp_millis()],
    )
    .map_err(|e| SyncError::db("Failed to write metadata", &e))?;
    Ok(())
}

fn row_to_entity(row: &Row<'_>) -> Result<CachedEntity, rusqlite::Error> {
    let data: String = row.get(2)?;
    let data = serde_json::from_str(&data).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(CachedEntity {
        entity_type: row.get(0)?,
        id: row.get(1)?,
        data,
        local_only: row.get(3)?,
        op_id: row.get(4)?,
        updated_at: from_millis(row.get(5)?),
        synced_at: row.get::<_, Option<i64>>(6)?.map(from_millis),
    })
}
