//! Operation types for the sync queue.
//!
//! A [`QueueOperation`] is one offline mutation waiting to reach the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of mutation carried by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Parse the stored representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a queued operation.
///
/// Successful operations are removed from the queue, so there is no
/// completed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Waiting to be delivered
    Pending,
    /// A request for it is on the wire
    InFlight,
    /// Gave up for now; kept for inspection and requeue
    Failed,
    /// Withdrawn by the user
    Canceled,
}

impl OperationStatus {
    /// Whether the operation still counts toward the pending count.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Canceled)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Parse the stored representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_flight" | "in-flight" | "inflight" => Some(Self::InFlight),
            "failed" => Some(Self::Failed),
            "canceled" | "cancelled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Timeout,
    Network,
    Server,
    Validation,
}

impl ErrorType {
    /// Transient failures are retried; validation failures never are.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Server => "server",
            Self::Validation => "validation",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "timeout" => Some(Self::Timeout),
            "network" => Some(Self::Network),
            "server" => Some(Self::Server),
            "validation" => Some(Self::Validation),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued mutation with delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueOperation {
    /// Client-generated UUID, stable across retries
    pub id: String,
    /// Backend collection, e.g. `workers` or `fund-transfers`
    pub entity_type: String,
    pub kind: OperationKind,
    /// Request body, opaque to the engine
    pub payload: Value,
    /// Id of the record. For a create, the id it is cached under locally
    pub target_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Delivery attempts that reached the backend or timed out.
    /// Network deferrals are not counted.
    pub retry_count: u32,
    pub status: OperationStatus,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub error_type: Option<ErrorType>,
}

impl QueueOperation {
    /// Create a new pending operation with a fresh id.
    #[must_use]
    pub fn new(
        entity_type: impl Into<String>,
        kind: OperationKind,
        payload: Value,
        target_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entity_type: entity_type.into(),
            kind,
            payload,
            target_id,
            created_at: now_millis(),
            retry_count: 0,
            status: OperationStatus::Pending,
            last_attempt: None,
            last_error: None,
            error_type: None,
        }
    }

    /// Create a create operation.
    #[must_use]
    pub fn create(entity_type: impl Into<String>, payload: Value) -> Self {
        Self::new(entity_type, OperationKind::Create, payload, None)
    }

    /// Create a create operation for a record cached locally under `local_id`.
    ///
    /// Later operations on `local_id` wait for this one and are pointed at the
    /// server's id once it is confirmed.
    #[must_use]
    pub fn create_for(
        entity_type: impl Into<String>,
        local_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self::new(
            entity_type,
            OperationKind::Create,
            payload,
            Some(local_id.into()),
        )
    }

    /// Create an update operation.
    #[must_use]
    pub fn update(
        entity_type: impl Into<String>,
        target_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self::new(
            entity_type,
            OperationKind::Update,
            payload,
            Some(target_id.into()),
        )
    }

    /// Create a delete operation.
    #[must_use]
    pub fn delete(entity_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self::new(
            entity_type,
            OperationKind::Delete,
            Value::Null,
            Some(target_id.into()),
        )
    }

    /// Whether a sync pass should attempt this operation.
    ///
    /// Failed operations stay deliverable unless the server rejected them.
    #[must_use]
    pub fn is_deliverable(&self) -> bool {
        match self.status {
            OperationStatus::Pending => true,
            OperationStatus::Failed => self.error_type.is_none_or(|t| t.is_retryable()),
            OperationStatus::InFlight | OperationStatus::Canceled => false,
        }
    }

    /// One-line description, e.g. `create workers` or `delete suppliers/s1`.
    #[must_use]
    pub fn summary(&self) -> String {
        match (&self.target_id, self.kind) {
            (Some(target), OperationKind::Update | OperationKind::Delete) => {
                format!("{} {}/{target}", self.kind, self.entity_type)
            }
            _ => format!("{} {}", self.kind, self.entity_type),
        }
    }
}

/// Current time truncated to millisecond precision, matching what is stored.
#[must_use]
pub fn now_millis() -> DateTime<Utc> {
    from_millis(Utc::now().timestamp_millis())
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constructors() {
        let create = QueueOperation::create("workers", json!({"name": "Ali"}));
        assert_eq!(create.kind, OperationKind::Create);
        assert_eq!(create.status, OperationStatus::Pending);
        assert!(create.target_id.is_none());
        assert_eq!(create.retry_count, 0);

        let update = QueueOperation::update("workers", "w1", json!({"wage": 250}));
        assert_eq!(update.target_id.as_deref(), Some("w1"));

        let delete = QueueOperation::delete("suppliers", "s1");
        assert_eq!(delete.kind, OperationKind::Delete);
        assert_eq!(delete.payload, Value::Null);

        let cached = QueueOperation::create_for("workers", "local-1", json!({"name": "Ali"}));
        assert_eq!(cached.kind, OperationKind::Create);
        assert_eq!(cached.target_id.as_deref(), Some("local-1"));
        assert_eq!(cached.summary(), "create workers");
    }

    #[test]
    fn test_ids_are_unique_uuids() {
        let a = QueueOperation::create("workers", json!({}));
        let b = QueueOperation::create("workers", json!({}));
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn test_created_at_has_millisecond_precision() {
        let op = QueueOperation::create("workers", json!({}));
        assert_eq!(op.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
        assert_eq!(from_millis(op.created_at.timestamp_millis()), op.created_at);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            OperationStatus::Pending,
            OperationStatus::InFlight,
            OperationStatus::Failed,
            OperationStatus::Canceled,
        ] {
            assert_eq!(OperationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OperationStatus::parse("in-flight"), Some(OperationStatus::InFlight));
        assert_eq!(OperationStatus::parse("done"), None);
    }

    #[test]
    fn test_status_active() {
        assert!(OperationStatus::Pending.is_active());
        assert!(OperationStatus::InFlight.is_active());
        assert!(OperationStatus::Failed.is_active());
        assert!(!OperationStatus::Canceled.is_active());
    }

    #[test]
    fn test_error_type_retryable() {
        assert!(ErrorType::Timeout.is_retryable());
        assert!(ErrorType::Network.is_retryable());
        assert!(ErrorType::Server.is_retryable());
        assert!(!ErrorType::Validation.is_retryable());
        assert_eq!(
            serde_json::to_string(&ErrorType::Validation).unwrap(),
            "\"validation\""
        );
    }

    #[test]
    fn test_deliverable() {
        let mut op = QueueOperation::create("workers", json!({}));
        assert!(op.is_deliverable());

        op.status = OperationStatus::Failed;
        op.error_type = Some(ErrorType::Server);
        assert!(op.is_deliverable());

        op.error_type = Some(ErrorType::Validation);
        assert!(!op.is_deliverable());

        op.status = OperationStatus::Canceled;
        assert!(!op.is_deliverable());
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            QueueOperation::create("workers", json!({})).summary(),
            "create workers"
        );
        assert_eq!(
            QueueOperation::delete("suppliers", "s1").summary(),
            "delete suppliers/s1"
        );
    }
}
