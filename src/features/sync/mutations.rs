//! Local-first mutations.
//!
//! Each helper writes the local cache and enqueues the matching operation in
//! one transaction, then starts a background pass when online.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::executor::SyncEngine;
use super::local_store::{self, entity_id, placeholder_id};
use super::operation::QueueOperation;
use crate::error::SyncError;

/// What a mutation helper stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationReceipt {
    /// Queue operation id
    pub op_id: String,
    pub entity_type: String,
    /// Record id; a placeholder until the create is confirmed
    pub id: String,
}

fn object(payload: Value) -> Result<Map<String, Value>, SyncError> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(SyncError::InvalidInput(format!(
            "payload must be a JSON object, got {other}"
        ))),
    }
}

fn require(name: &str, value: &str) -> Result<(), SyncError> {
    if value.trim().is_empty() {
        return Err(SyncError::InvalidInput(format!("{name} must not be empty")));
    }
    Ok(())
}

impl SyncEngine {
    /// Create a record locally and queue it for the server.
    ///
    /// The record is cached under a placeholder id unless the payload carries
    /// its own `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not an object or storage fails.
    pub fn create_record(
        &self,
        entity_type: &str,
        payload: Value,
    ) -> Result<MutationReceipt, SyncError> {
        require("entity type", entity_type)?;
        let payload = Value::Object(object(payload)?);

        let id = entity_id(&payload).unwrap_or_else(placeholder_id);
        let mut data = payload.clone();
        if let Value::Object(map) = &mut data {
            map.insert("id".to_string(), Value::String(id.clone()));
        }

        let op = QueueOperation::create_for(entity_type, &id, payload);
        self.inner.queue.enqueue_with(&op, |conn| {
            local_store::put_placeholder(conn, entity_type, &id, &data, &op.id)
        })?;

        debug!(entity_type, id = %id, "record created locally");
        self.trigger();

        Ok(MutationReceipt {
            op_id: op.id,
            entity_type: entity_type.to_string(),
            id,
        })
    }

    /// Apply changed fields locally and queue the update.
    ///
    /// # Errors
    ///
    /// Returns an error if the changes are not an object or storage fails.
    pub fn update_record(
        &self,
        entity_type: &str,
        id: &str,
        changes: Value,
    ) -> Result<MutationReceipt, SyncError> {
        require("entity type", entity_type)?;
        require("record id", id)?;
        let changes = Value::Object(object(changes)?);

        let op = QueueOperation::update(entity_type, id, changes.clone());
        self.inner.queue.enqueue_with(&op, |conn| {
            local_store::apply_local_update(conn, entity_type, id, &changes)
        })?;

        debug!(entity_type, id, "record updated locally");
        self.trigger();

        Ok(MutationReceipt {
            op_id: op.id,
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        })
    }

    /// Remove a record locally and queue the delete.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn delete_record(&self, entity_type: &str, id: &str) -> Result<MutationReceipt, SyncError> {
        require("entity type", entity_type)?;
        require("record id", id)?;

        let op = QueueOperation::delete(entity_type, id);
        self.inner
            .queue
            .enqueue_with(&op, |conn| local_store::remove(conn, entity_type, id))?;

        debug!(entity_type, id, "record deleted locally");
        self.trigger();

        Ok(MutationReceipt {
            op_id: op.id,
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        })
    }
}
