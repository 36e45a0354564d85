//! Sync queue storage and management.
//!
//! Provides persistence and querying of queued operations. Every mutation
//! recomputes the pending count and publishes it to the [`SyncStateStore`]
//! while the database lock is still held, so the published count never lags
//! the table.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::operation::{
    from_millis, now_millis, ErrorType, OperationKind, OperationStatus, QueueOperation,
};
use super::state::SyncStateStore;
use crate::error::SyncError;
use crate::storage::Database;

const SELECT_COLUMNS: &str = "seq, id, entity_type, operation_kind, payload, target_id, \
     created_at, retry_count, status, last_attempt, last_error, error_type";

/// Rows that still count toward the pending count.
const ACTIVE: &str = "status IN ('pending', 'in_flight', 'failed')";

/// Rows a sync pass may attempt.
const DELIVERABLE: &str = "(status = 'pending' OR (status = 'failed' \
     AND (error_type IS NULL OR error_type != 'validation')))";

const PAGE_SIZE: usize = 50;

/// Durable queue of offline operations.
///
/// Open one queue per database per process; opening returns operations left
/// in flight by a previous process to pending.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    db: Database,
    state: SyncStateStore,
}

impl SyncQueue {
    /// Open the queue on an existing database.
    ///
    /// Recovers interrupted operations and publishes the persisted count.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    pub fn open(db: Database, state: SyncStateStore) -> Result<Self, SyncError> {
        let queue = Self { db, state };

        let recovered = queue.recover_in_flight()?;
        if recovered > 0 {
            info!(recovered, "returned interrupted operations to pending");
        }

        let conn = queue.db.connection()?;
        queue.publish_count(&conn)?;
        drop(conn);

        Ok(queue)
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub const fn state(&self) -> &SyncStateStore {
        &self.state
    }

    fn publish_count(&self, conn: &Connection) -> Result<usize, SyncError> {
        let count = count_active(conn)?;
        self.state.set_pending_count(count);
        Ok(count)
    }

    /// Add an operation to the queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation cannot be saved.
    pub fn enqueue(&self, operation: &QueueOperation) -> Result<(), SyncError> {
        self.enqueue_with(operation, |_| Ok(()))
    }

    /// Add an operation and run `local_write` in the same transaction.
    ///
    /// Either both the local write and the queue row are stored or neither is.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert or `local_write` fails.
    pub fn enqueue_with<T, F>(&self, operation: &QueueOperation, local_write: F) -> Result<T, SyncError>
    where
        F: FnOnce(&Connection) -> Result<T, SyncError>,
    {
        let mut conn = self.db.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| SyncError::db("Failed to begin transaction", &e))?;

        let payload = serde_json::to_string(&operation.payload)?;
        tx.execute(
            r"INSERT INTO sync_queue (id, entity_type, operation_kind, payload, target_id,
                                      created_at, retry_count, status, last_attempt,
                                      last_error, error_type, updated_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?6)",
            params![
                operation.id,
                operation.entity_type,
                operation.kind.as_str(),
                payload,
                operation.target_id,
                operation.created_at.timestamp_millis(),
                operation.retry_count,
                operation.status.as_str(),
                operation.last_attempt.map(|t| t.timestamp_millis()),
                operation.last_error,
                operation.error_type.map(|t| t.as_str()),
            ],
        )
        .map_err(|e| SyncError::db("Failed to enqueue operation", &e))?;

        let value = local_write(&tx)?;

        tx.commit()
            .map_err(|e| SyncError::db("Failed to commit enqueue", &e))?;
        let count = self.publish_count(&conn)?;

        debug!(id = %operation.id, op = %operation.summary(), pending = count, "enqueued");
        Ok(value)
    }

    /// Remove an operation after the server confirmed it.
    ///
    /// Canceled rows are left alone; their result is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn dequeue(&self, id: &str) -> Result<bool, SyncError> {
        self.dequeue_with(id, |_| Ok(())).map(|r| r.is_some())
    }

    /// Remove a confirmed operation and run `reconcile` in the same transaction.
    ///
    /// Returns `None` without calling `reconcile` when the operation was
    /// canceled or no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete or `reconcile` fails.
    pub fn dequeue_with<T, F>(&self, id: &str, reconcile: F) -> Result<Option<T>, SyncError>
    where
        F: FnOnce(&Connection) -> Result<T, SyncError>,
    {
        let mut conn = self.db.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| SyncError::db("Failed to begin transaction", &e))?;

        let status = status_of(&tx, id)?;
        if !status.is_some_and(|s| s.is_active()) {
            return Ok(None);
        }

        let value = reconcile(&tx)?;

        tx.execute("DELETE FROM sync_queue WHERE id = ?1", [id])
            .map_err(|e| SyncError::db("Failed to dequeue operation", &e))?;

        tx.commit()
            .map_err(|e| SyncError::db("Failed to commit dequeue", &e))?;
        self.publish_count(&conn)?;

        Ok(Some(value))
    }

    /// Mark an operation as being delivered.
    ///
    /// Returns `false` if it was canceled or removed meanwhile.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn mark_in_flight(&self, id: &str) -> Result<bool, SyncError> {
        let conn = self.db.connection()?;

        let rows = conn
            .execute(
                r"UPDATE sync_queue SET status = 'in_flight', updated_at = ?1
                  WHERE id = ?2 AND status IN ('pending', 'failed')",
                params![now_millis().timestamp_millis(), id],
            )
            .map_err(|e| SyncError::db("Failed to mark operation in flight", &e))?;

        self.publish_count(&conn)?;
        Ok(rows > 0)
    }

    /// Increment attempt count and record error; the operation goes back to pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn record_attempt(
        &self,
        id: &str,
        error: &str,
        kind: ErrorType,
    ) -> Result<bool, SyncError> {
        self.record_failure(id, error, kind, OperationStatus::Pending)
    }

    /// Increment attempt count, record error and park the operation as failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn mark_failed(&self, id: &str, error: &str, kind: ErrorType) -> Result<bool, SyncError> {
        self.record_failure(id, error, kind, OperationStatus::Failed)
    }

    /// Put an operation back to pending after the backend could not be reached.
    ///
    /// The error is recorded but the attempt count is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn defer(&self, id: &str, error: &str, kind: ErrorType) -> Result<bool, SyncError> {
        let conn = self.db.connection()?;
        let now = now_millis().timestamp_millis();

        let rows = conn
            .execute(
                r"UPDATE sync_queue SET
                  status = 'pending',
                  last_attempt = ?1,
                  last_error = ?2,
                  error_type = ?3,
                  updated_at = ?1
                  WHERE id = ?4 AND status != 'canceled'",
                params![now, error, kind.as_str(), id],
            )
            .map_err(|e| SyncError::db("Failed to defer operation", &e))?;

        self.publish_count(&conn)?;
        Ok(rows > 0)
    }

    /// Whether the create that cached `local_id` is still waiting for the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn has_unconfirmed_create(&self, entity_type: &str, local_id: &str) -> Result<bool, SyncError> {
        let conn = self.db.connection()?;

        let count: usize = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM sync_queue
                     WHERE entity_type = ?1 AND target_id = ?2
                       AND operation_kind = 'create' AND {ACTIVE}"
                ),
                params![entity_type, local_id],
                |row| row.get(0),
            )
            .map_err(|e| SyncError::db("Failed to look up create operation", &e))?;

        Ok(count > 0)
    }

    fn record_failure(
        &self,
        id: &str,
        error: &str,
        kind: ErrorType,
        status: OperationStatus,
    ) -> Result<bool, SyncError> {
        let conn = self.db.connection()?;
        let now = now_millis().timestamp_millis();

        let rows = conn
            .execute(
                r"UPDATE sync_queue SET
                  status = ?1,
                  retry_count = retry_count + 1,
                  last_attempt = ?2,
                  last_error = ?3,
                  error_type = ?4,
                  updated_at = ?2
                  WHERE id = ?5 AND status != 'canceled'",
                params![status.as_str(), now, error, kind.as_str(), id],
            )
            .map_err(|e| SyncError::db("Failed to record attempt", &e))?;

        self.publish_count(&conn)?;
        Ok(rows > 0)
    }

    /// Cancel one operation.
    ///
    /// Returns `false` for unknown, already canceled or dequeued ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn cancel(&self, id: &str) -> Result<bool, SyncError> {
        let conn = self.db.connection()?;

        let rows = conn
            .execute(
                &format!(
                    "UPDATE sync_queue SET status = 'canceled', updated_at = ?1
                     WHERE id = ?2 AND {ACTIVE}"
                ),
                params![now_millis().timestamp_millis(), id],
            )
            .map_err(|e| SyncError::db("Failed to cancel operation", &e))?;

        self.publish_count(&conn)?;
        Ok(rows > 0)
    }

    /// Cancel every pending, in-flight and failed operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn cancel_all(&self) -> Result<usize, SyncError> {
        let conn = self.db.connection()?;

        let rows = conn
            .execute(
                &format!("UPDATE sync_queue SET status = 'canceled', updated_at = ?1 WHERE {ACTIVE}"),
                [now_millis().timestamp_millis()],
            )
            .map_err(|e| SyncError::db("Failed to cancel operations", &e))?;

        self.publish_count(&conn)?;
        Ok(rows)
    }

    /// Reset a failed operation to pending with a zero retry count.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn requeue(&self, id: &str) -> Result<bool, SyncError> {
        let conn = self.db.connection()?;

        let rows = conn
            .execute(
                r"UPDATE sync_queue SET status = 'pending', retry_count = 0,
                  error_type = NULL, updated_at = ?1
                  WHERE id = ?2 AND status = 'failed'",
                params![now_millis().timestamp_millis(), id],
            )
            .map_err(|e| SyncError::db("Failed to requeue operation", &e))?;

        self.publish_count(&conn)?;
        Ok(rows > 0)
    }

    /// Reset every failed operation to pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn requeue_all(&self) -> Result<usize, SyncError> {
        let conn = self.db.connection()?;

        let rows = conn
            .execute(
                r"UPDATE sync_queue SET status = 'pending', retry_count = 0,
                  error_type = NULL, updated_at = ?1
                  WHERE status = 'failed'",
                [now_millis().timestamp_millis()],
            )
            .map_err(|e| SyncError::db("Failed to requeue operations", &e))?;

        self.publish_count(&conn)?;
        Ok(rows)
    }

    /// Lazy cursor over deliverable operations in (`created_at`, sequence) order.
    #[must_use]
    pub fn list_pending(&self) -> PendingCursor {
        PendingCursor::new(self.clone())
    }

    /// All operations, optionally filtered by status, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self, status: Option<OperationStatus>) -> Result<Vec<QueueOperation>, SyncError> {
        let conn = self.db.connection()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sync_queue
                 WHERE ?1 IS NULL OR status = ?1
                 ORDER BY created_at ASC, seq ASC"
            ))
            .map_err(|e| SyncError::db("Failed to prepare query", &e))?;

        let rows = stmt
            .query_map([status.map(|s| s.as_str())], row_to_operation)
            .map_err(|e| SyncError::db("Failed to query operations", &e))?;

        rows.map(|row| {
            row.map(|(_, op)| op)
                .map_err(|e| SyncError::db("Failed to read operation", &e))
        })
        .collect()
    }

    /// Get a specific operation by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, id: &str) -> Result<Option<QueueOperation>, SyncError> {
        let conn = self.db.connection()?;

        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM sync_queue WHERE id = ?1"),
            [id],
            row_to_operation,
        )
        .optional()
        .map(|row| row.map(|(_, op)| op))
        .map_err(|e| SyncError::db("Failed to query operation", &e))
    }

    /// Number of pending, in-flight and failed operations.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn pending_count(&self) -> Result<usize, SyncError> {
        count_active(&*self.db.connection()?)
    }

    /// Recompute the count and publish it.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn refresh_count(&self) -> Result<usize, SyncError> {
        let conn = self.db.connection()?;
        self.publish_count(&conn)
    }

    /// Return operations left in flight to pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn recover_in_flight(&self) -> Result<usize, SyncError> {
        let conn = self.db.connection()?;

        conn.execute(
            "UPDATE sync_queue SET status = 'pending' WHERE status = 'in_flight'",
            [],
        )
        .map_err(|e| SyncError::db("Failed to recover operations", &e))
    }

    /// Delete canceled operations older than the specified age.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn cleanup(&self, max_age_hours: i64) -> Result<usize, SyncError> {
        let conn = self.db.connection()?;
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);

        conn.execute(
            r"DELETE FROM sync_queue
              WHERE status = 'canceled' AND COALESCE(updated_at, created_at) <= ?1",
            [cutoff.timestamp_millis()],
        )
        .map_err(|e| SyncError::db("Failed to cleanup operations", &e))
    }

    /// Get queue statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn stats(&self) -> Result<QueueStats, SyncError> {
        let conn = self.db.connection()?;

        let mut stats = QueueStats::default();
        let mut stmt = conn
            .prepare("SELECT status, operation_kind, COUNT(*) FROM sync_queue GROUP BY status, operation_kind")
            .map_err(|e| SyncError::db("Failed to prepare stats query", &e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, usize>(2)?,
                ))
            })
            .map_err(|e| SyncError::db("Failed to query stats", &e))?;

        for row in rows {
            let (status, kind, count) = row.map_err(|e| SyncError::db("Failed to read stats", &e))?;
            let status = OperationStatus::parse(&status);

            match status {
                Some(OperationStatus::Pending) => stats.pending += count,
                Some(OperationStatus::InFlight) => stats.in_flight += count,
                Some(OperationStatus::Failed) => stats.failed += count,
                Some(OperationStatus::Canceled) | None => stats.canceled += count,
            }

            if status.is_some_and(|s| s.is_active()) {
                match OperationKind::parse(&kind) {
                    Some(OperationKind::Create) => stats.creates += count,
                    Some(OperationKind::Update) => stats.updates += count,
                    Some(OperationKind::Delete) => stats.deletes += count,
                    None => {}
                }
            }
        }

        stats.oldest_pending = conn
            .query_row(
                &format!("SELECT MIN(created_at) FROM sync_queue WHERE {ACTIVE}"),
                [],
                |row| row.get::<_, Option<i64>>(0),
            )
            .map_err(|e| SyncError::db("Failed to get oldest pending", &e))?
            .map(from_millis);

        Ok(stats)
    }

    fn fetch_page(&self, after: (i64, i64), limit: usize) -> Result<Vec<(i64, QueueOperation)>, SyncError> {
        let conn = self.db.connection()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sync_queue
                 WHERE {DELIVERABLE}
                   AND (created_at > ?1 OR (created_at = ?1 AND seq > ?2))
                 ORDER BY created_at ASC, seq ASC
                 LIMIT ?3"
            ))
            .map_err(|e| SyncError::db("Failed to prepare query", &e))?;

        let rows = stmt
            .query_map(params![after.0, after.1, limit], row_to_operation)
            .map_err(|e| SyncError::db("Failed to query pending operations", &e))?;

        rows.map(|row| row.map_err(|e| SyncError::db("Failed to read operation", &e)))
            .collect()
    }
}

/// Active operations on one record other than `excluding`.
///
/// Runs on a caller-held connection so it can join a reconcile transaction.
pub(crate) fn queued_edits_for(
    conn: &Connection,
    entity_type: &str,
    target_id: &str,
    excluding: &str,
) -> Result<usize, SyncError> {
    conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM sync_queue
             WHERE entity_type = ?1 AND target_id = ?2 AND id != ?3 AND {ACTIVE}"
        ),
        params![entity_type, target_id, excluding],
        |row| row.get(0),
    )
    .map_err(|e| SyncError::db("Failed to count queued edits", &e))
}

/// Point later operations at a record's server id instead of its placeholder id.
///
/// A top-level `id` in the payload is rewritten too.
pub(crate) fn retarget(
    conn: &Connection,
    entity_type: &str,
    from: &str,
    to: &str,
) -> Result<usize, SyncError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT id, payload FROM sync_queue
             WHERE entity_type = ?1 AND target_id = ?2 AND {ACTIVE}"
        ))
        .map_err(|e| SyncError::db("Failed to prepare retarget query", &e))?;

    let rows = stmt
        .query_map(params![entity_type, from], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| SyncError::db("Failed to query retarget candidates", &e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SyncError::db("Failed to read retarget candidates", &e))?;

    for (id, payload) in &rows {
        let mut payload: Value = serde_json::from_str(payload)?;
        if let Some(obj) = payload.as_object_mut() {
            if obj.get("id").and_then(Value::as_str) == Some(from) {
                obj.insert("id".to_string(), Value::String(to.to_string()));
            }
        }

        conn.execute(
            "UPDATE sync_queue SET target_id = ?1, payload = ?2 WHERE id = ?3",
            params![to, serde_json::to_string(&payload)?, id],
        )
        .map_err(|e| SyncError::db("Failed to retarget operation", &e))?;
    }

    Ok(rows.len())
}

fn count_active(conn: &Connection) -> Result<usize, SyncError> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM sync_queue WHERE {ACTIVE}"),
        [],
        |row| row.get(0),
    )
    .map_err(|e| SyncError::db("Failed to count pending operations", &e))
}

fn status_of(conn: &Connection, id: &str) -> Result<Option<OperationStatus>, SyncError> {
    let status: Option<String> = conn
        .query_row("SELECT status FROM sync_queue WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| SyncError::db("Failed to read operation status", &e))?;

    Ok(status.as_deref().and_then(OperationStatus::parse))
}

/// Lazy, restartable cursor returned by [`SyncQueue::list_pending`].
///
/// Reads one page at a time and never holds the database lock between
/// items. Each row is yielded at most once per traversal.
#[derive(Debug)]
pub struct PendingCursor {
    queue: SyncQueue,
    position: (i64, i64),
    page: VecDeque<QueueOperation>,
    exhausted: bool,
}

impl PendingCursor {
    const START: (i64, i64) = (i64::MIN, i64::MIN);

    fn new(queue: SyncQueue) -> Self {
        Self {
            queue,
            position: Self::START,
            page: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Start again from the oldest deliverable operation.
    pub fn restart(&mut self) {
        self.position = Self::START;
        self.page.clear();
        self.exhausted = false;
    }
}

impl Iterator for PendingCursor {
    type Item = Result<QueueOperation, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.exhausted {
            match self.queue.fetch_page(self.position, PAGE_SIZE) {
                Ok(rows) => {
                    self.exhausted = rows.len() < PAGE_SIZE;
                    if let Some((seq, op)) = rows.last() {
                        self.position = (op.created_at.timestamp_millis(), *seq);
                    }
                    self.page.extend(rows.into_iter().map(|(_, op)| op));
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }

        self.page.pop_front().map(Ok)
    }
}

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub failed: usize,
    pub canceled: usize,
    /// Active creates
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    /// Oldest active operation
    pub oldest_pending: Option<DateTime<Utc>>,
}

impl QueueStats {
    /// Operations counted in the pending count.
    #[must_use]
    pub const fn active(&self) -> usize {
        self.pending + self.in_flight + self.failed
    }
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

fn row_to_operation(row: &Row<'_>) -> Result<(i64, QueueOperation), rusqlite::Error> {
    let seq: i64 = row.get(0)?;
    let kind: String = row.get(3)?;
    let payload: String = row.get(4)?;
    let status: String = row.get(8)?;
    let error_type: Option<String> = row.get(11)?;

    let kind = OperationKind::parse(&kind)
        .ok_or_else(|| conversion_error(3, format!("unknown operation kind '{kind}'")))?;
    let payload = serde_json::from_str(&payload)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let status = OperationStatus::parse(&status)
        .ok_or_else(|| conversion_error(8, format!("unknown status '{status}'")))?;

    Ok((
        seq,
        QueueOperation {
            id: row.get(1)?,
            entity_type: row.get(2)?,
            kind,
            payload,
            target_id: row.get(5)?,
            created_at: from_millis(row.get(6)?),
            retry_count: row.get(7)?,
            status,
            last_attempt: row.get::<_, Option<i64>>(9)?.map(from_millis),
            last_error: row.get(10)?,
            error_type: error_type.as_deref().and_then(ErrorType::parse),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn create_test_queue() -> SyncQueue {
        let db = Database::open_in_memory().unwrap();
        SyncQueue::open(db, SyncStateStore::default()).unwrap()
    }

    fn worker(name: &str) -> QueueOperation {
        QueueOperation::create("workers", json!({ "name": name }))
    }

    #[test]
    fn test_enqueue_and_get() {
        let queue = create_test_queue();

        let op = QueueOperation::update("workers", "w1", json!({"wage": 250}));
        queue.enqueue(&op).unwrap();

        let loaded = queue.get(&op.id).unwrap().unwrap();
        assert_eq!(loaded, op);
        assert_eq!(queue.state().get_state().pending_count, 1);
    }

    #[test]
    fn test_get_unknown() {
        let queue = create_test_queue();
        assert!(queue.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_enqueue_with_rolls_back_on_error() {
        let queue = create_test_queue();
        let op = worker("Ali");

        let result = queue.enqueue_with(&op, |_| -> Result<(), SyncError> {
            Err(SyncError::InvalidInput("local write failed".to_string()))
        });

        assert!(result.is_err());
        assert!(queue.get(&op.id).unwrap().is_none());
        assert_eq!(queue.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_list_pending_order() {
        let queue = create_test_queue();

        let mut first = worker("a");
        let mut second = worker("b");
        let mut third = worker("c");
        // Same timestamp for two of them: insertion order breaks the tie
        first.created_at = from_millis(2_000);
        second.created_at = from_millis(1_000);
        third.created_at = from_millis(2_000);

        queue.enqueue(&first).unwrap();
        queue.enqueue(&second).unwrap();
        queue.enqueue(&third).unwrap();

        let ids: Vec<String> = queue
            .list_pending()
            .map(|op| op.unwrap().id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id, third.id]);
    }

    #[test]
    fn test_list_pending_pages() {
        let queue = create_test_queue();
        for i in 0..(PAGE_SIZE * 2 + 5) {
            queue.enqueue(&worker(&i.to_string())).unwrap();
        }

        let mut cursor = queue.list_pending();
        assert_eq!(cursor.by_ref().count(), PAGE_SIZE * 2 + 5);
        assert!(cursor.next().is_none());

        cursor.restart();
        assert!(cursor.next().is_some());
    }

    #[test]
    fn test_list_pending_skips_parked_and_canceled() {
        let queue = create_test_queue();

        let pending = worker("pending");
        let retryable = worker("server");
        let parked = worker("validation");
        let canceled = worker("canceled");
        for op in [&pending, &retryable, &parked, &canceled] {
            queue.enqueue(op).unwrap();
        }

        queue.mark_failed(&retryable.id, "503", ErrorType::Server).unwrap();
        queue.mark_failed(&parked.id, "400", ErrorType::Validation).unwrap();
        queue.cancel(&canceled.id).unwrap();

        let ids: Vec<String> = queue.list_pending().map(|op| op.unwrap().id).collect();
        assert_eq!(ids, vec![pending.id, retryable.id]);
    }

    #[test]
    fn test_count_invariant() {
        let queue = create_test_queue();
        let ops: Vec<QueueOperation> = (0..4).map(|i| worker(&i.to_string())).collect();
        for op in &ops {
            queue.enqueue(op).unwrap();
        }
        assert_eq!(queue.state().get_state().pending_count, 4);

        queue.mark_in_flight(&ops[0].id).unwrap();
        assert_eq!(queue.state().get_state().pending_count, 4);

        queue.mark_failed(&ops[1].id, "boom", ErrorType::Server).unwrap();
        assert_eq!(queue.state().get_state().pending_count, 4);

        queue.cancel(&ops[2].id).unwrap();
        assert_eq!(queue.state().get_state().pending_count, 3);

        queue.dequeue(&ops[0].id).unwrap();
        assert_eq!(queue.state().get_state().pending_count, 2);
        assert_eq!(queue.pending_count().unwrap(), 2);
    }

    #[test]
    fn test_count_published_to_listeners() {
        let queue = create_test_queue();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = queue
            .state()
            .subscribe(move |s| sink.lock().unwrap().push(s.pending_count));

        let op = worker("Ali");
        queue.enqueue(&op).unwrap();
        queue.dequeue(&op.id).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_record_attempt_keeps_pending() {
        let queue = create_test_queue();
        let op = worker("Ali");
        queue.enqueue(&op).unwrap();
        queue.mark_in_flight(&op.id).unwrap();

        queue.record_attempt(&op.id, "503", ErrorType::Server).unwrap();

        let loaded = queue.get(&op.id).unwrap().unwrap();
        assert_eq!(loaded.status, OperationStatus::Pending);
        assert_eq!(loaded.retry_count, 1);
        assert_eq!(loaded.error_type, Some(ErrorType::Server));
        assert!(loaded.last_attempt.is_some());
    }

    #[test]
    fn test_defer_keeps_attempt_count() {
        let queue = create_test_queue();
        let op = worker("Ali");
        queue.enqueue(&op).unwrap();

        for _ in 0..5 {
            queue.mark_in_flight(&op.id).unwrap();
            assert!(queue.defer(&op.id, "connection refused", ErrorType::Network).unwrap());
        }

        let loaded = queue.get(&op.id).unwrap().unwrap();
        assert_eq!(loaded.status, OperationStatus::Pending);
        assert_eq!(loaded.retry_count, 0);
        assert_eq!(loaded.error_type, Some(ErrorType::Network));
        assert!(loaded.last_attempt.is_some());
    }

    #[test]
    fn test_has_unconfirmed_create() {
        let queue = create_test_queue();
        let mut create = worker("Ali");
        create.target_id = Some("local-1".to_string());
        queue.enqueue(&create).unwrap();
        queue
            .enqueue(&QueueOperation::update("workers", "local-2", json!({"wage": 1})))
            .unwrap();

        assert!(queue.has_unconfirmed_create("workers", "local-1").unwrap());
        assert!(!queue.has_unconfirmed_create("suppliers", "local-1").unwrap());
        // An update alone does not count
        assert!(!queue.has_unconfirmed_create("workers", "local-2").unwrap());

        queue.mark_failed(&create.id, "503", ErrorType::Server).unwrap();
        assert!(queue.has_unconfirmed_create("workers", "local-1").unwrap());

        queue.cancel(&create.id).unwrap();
        assert!(!queue.has_unconfirmed_create("workers", "local-1").unwrap());
    }

    #[test]
    fn test_mark_failed() {
        let queue = create_test_queue();
        let op = worker("Ali");
        queue.enqueue(&op).unwrap();

        queue.mark_failed(&op.id, "Connection error", ErrorType::Timeout).unwrap();

        let loaded = queue.get(&op.id).unwrap().unwrap();
        assert_eq!(loaded.status, OperationStatus::Failed);
        assert_eq!(loaded.retry_count, 1);
        assert_eq!(loaded.last_error.as_deref(), Some("Connection error"));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let queue = create_test_queue();
        let op = worker("Ali");
        queue.enqueue(&op).unwrap();

        assert!(queue.cancel(&op.id).unwrap());
        assert!(!queue.cancel(&op.id).unwrap());
        assert!(!queue.cancel("unknown").unwrap());
        assert_eq!(queue.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_cancel_in_flight_discards_result() {
        let queue = create_test_queue();
        let op = worker("Ali");
        queue.enqueue(&op).unwrap();
        queue.mark_in_flight(&op.id).unwrap();

        assert!(queue.cancel(&op.id).unwrap());

        let reconciled = queue.dequeue_with(&op.id, |_| Ok(())).unwrap();
        assert!(reconciled.is_none());
        // Failure bookkeeping is ignored as well
        assert!(!queue.mark_failed(&op.id, "late", ErrorType::Server).unwrap());

        let loaded = queue.get(&op.id).unwrap().unwrap();
        assert_eq!(loaded.status, OperationStatus::Canceled);
    }

    #[test]
    fn test_mark_in_flight_skips_canceled() {
        let queue = create_test_queue();
        let op = worker("Ali");
        queue.enqueue(&op).unwrap();
        queue.cancel(&op.id).unwrap();

        assert!(!queue.mark_in_flight(&op.id).unwrap());
    }

    #[test]
    fn test_cancel_all() {
        let queue = create_test_queue();
        for i in 0..5 {
            queue.enqueue(&worker(&i.to_string())).unwrap();
        }

        assert_eq!(queue.cancel_all().unwrap(), 5);
        assert_eq!(queue.state().get_state().pending_count, 0);
        assert_eq!(queue.cancel_all().unwrap(), 0);
    }

    #[test]
    fn test_dequeue_unknown() {
        let queue = create_test_queue();
        assert!(!queue.dequeue("unknown").unwrap());
    }

    #[test]
    fn test_requeue() {
        let queue = create_test_queue();
        let op = worker("Ali");
        queue.enqueue(&op).unwrap();
        queue.mark_failed(&op.id, "bad", ErrorType::Validation).unwrap();
        assert_eq!(queue.list_pending().count(), 0);

        assert!(queue.requeue(&op.id).unwrap());
        let loaded = queue.get(&op.id).unwrap().unwrap();
        assert_eq!(loaded.status, OperationStatus::Pending);
        assert_eq!(loaded.retry_count, 0);
        assert_eq!(queue.list_pending().count(), 1);

        // Only failed operations can be requeued
        assert!(!queue.requeue(&op.id).unwrap());
    }

    #[test]
    fn test_requeue_all() {
        let queue = create_test_queue();
        for i in 0..3 {
            let op = worker(&i.to_string());
            queue.enqueue(&op).unwrap();
            queue.mark_failed(&op.id, "bad", ErrorType::Validation).unwrap();
        }

        assert_eq!(queue.requeue_all().unwrap(), 3);
        assert_eq!(queue.list(Some(OperationStatus::Failed)).unwrap().len(), 0);
    }

    #[test]
    fn test_recover_in_flight_on_open() {
        let db = Database::open_in_memory().unwrap();
        let queue = SyncQueue::open(db.clone(), SyncStateStore::default()).unwrap();
        let op = worker("Ali");
        queue.enqueue(&op).unwrap();
        queue.mark_in_flight(&op.id).unwrap();

        let reopened = SyncQueue::open(db, SyncStateStore::default()).unwrap();
        let loaded = reopened.get(&op.id).unwrap().unwrap();
        assert_eq!(loaded.status, OperationStatus::Pending);
        assert_eq!(reopened.state().get_state().pending_count, 1);
    }

    #[test]
    fn test_retarget() {
        let queue = create_test_queue();
        let update = QueueOperation::update("workers", "local-1", json!({"id": "local-1", "wage": 1}));
        let other = QueueOperation::update("suppliers", "local-1", json!({}));
        queue.enqueue(&update).unwrap();
        queue.enqueue(&other).unwrap();

        let changed = {
            let conn = queue.database().connection().unwrap();
            retarget(&conn, "workers", "local-1", "w-42").unwrap()
        };
        assert_eq!(changed, 1);

        let loaded = queue.get(&update.id).unwrap().unwrap();
        assert_eq!(loaded.target_id.as_deref(), Some("w-42"));
        assert_eq!(loaded.payload, json!({"id": "w-42", "wage": 1}));

        let untouched = queue.get(&other.id).unwrap().unwrap();
        assert_eq!(untouched.target_id.as_deref(), Some("local-1"));
    }

    #[test]
    fn test_queued_edits_for() {
        let queue = create_test_queue();
        let first = QueueOperation::update("workers", "w1", json!({"wage": 1}));
        let second = QueueOperation::update("workers", "w1", json!({"wage": 2}));
        queue.enqueue(&first).unwrap();
        queue.enqueue(&second).unwrap();

        let conn = queue.database().connection().unwrap();
        assert_eq!(queued_edits_for(&conn, "workers", "w1", &first.id).unwrap(), 1);
        assert_eq!(queued_edits_for(&conn, "workers", "w2", &first.id).unwrap(), 0);
    }

    #[test]
    fn test_stats() {
        let queue = create_test_queue();

        let create = worker("Ali");
        let update = QueueOperation::update("workers", "w1", json!({}));
        let delete = QueueOperation::delete("workers", "w2");
        for op in [&create, &update, &delete] {
            queue.enqueue(op).unwrap();
        }
        queue.mark_failed(&update.id, "boom", ErrorType::Server).unwrap();
        queue.cancel(&delete.id).unwrap();

        let stats = queue.stats().unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.canceled, 1);
        assert_eq!(stats.creates, 1);
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.deletes, 0);
        assert_eq!(stats.active(), 2);
        assert_eq!(stats.oldest_pending, Some(create.created_at));
    }

    #[test]
    fn test_cleanup_removes_old_tombstones() {
        let queue = create_test_queue();
        let old = worker("old");
        let live = worker("live");
        queue.enqueue(&old).unwrap();
        queue.enqueue(&live).unwrap();
        queue.cancel(&old.id).unwrap();

        // Nothing is old enough yet
        assert_eq!(queue.cleanup(24).unwrap(), 0);

        assert_eq!(queue.cleanup(0).unwrap(), 1);
        assert!(queue.get(&old.id).unwrap().is_none());
        assert!(queue.get(&live.id).unwrap().is_some());
    }
}
