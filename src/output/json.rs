//! JSON output formatting for binar-sync.

use serde::Serialize;
use serde_json::json;

use crate::error::SyncError;
use crate::features::sync::{CachedEntity, QueueOperation};

/// Format queue operations as JSON
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_operations_json(ops: &[QueueOperation], title: &str) -> Result<String, SyncError> {
    let output = json!({
        "list": title,
        "count": ops.len(),
        "items": ops
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format cached records as JSON
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_entities_json(entity_type: &str, records: &[CachedEntity]) -> Result<String, SyncError> {
    let output = json!({
        "entity_type": entity_type,
        "count": records.len(),
        "items": records
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Generic JSON formatter for any serializable type
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, SyncError> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_operations_json() {
        let ops = vec![QueueOperation::delete("workers", "w1")];
        let output = format_operations_json(&ops, "Queue").unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["count"], 1);
        assert_eq!(parsed["items"][0]["kind"], "delete");
        assert_eq!(parsed["items"][0]["target_id"], "w1");
    }
}
