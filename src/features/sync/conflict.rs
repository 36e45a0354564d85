//! Conflict resolution between the cached record and the server's copy.
//!
//! Used when the server confirms a mutation while newer local edits to the
//! same record are still queued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// How a conflicting pair of records is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// The side with the newer timestamp wins as a whole.
    LastWriteWins,
    ServerWins,
    ClientWins,
    /// Field-wise: new client fields are added, conflicting fields come from
    /// the newer side.
    #[default]
    Merge,
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LastWriteWins => "last_write_wins",
            Self::ServerWins => "server_wins",
            Self::ClientWins => "client_wins",
            Self::Merge => "merge",
        };
        f.write_str(s)
    }
}

/// Two versions of one record with their modification times.
#[derive(Debug, Clone, Copy)]
pub struct Conflict<'a> {
    pub client: Option<&'a Value>,
    pub server: Option<&'a Value>,
    pub client_time: DateTime<Utc>,
    pub server_time: DateTime<Utc>,
}

impl Conflict<'_> {
    fn client_is_newer(&self) -> bool {
        self.client_time > self.server_time
    }
}

/// Resolve a conflict with the given strategy.
///
/// A missing side yields the other one; `None` only when both are missing.
#[must_use]
pub fn resolve(strategy: ConflictStrategy, conflict: &Conflict<'_>) -> Option<Value> {
    let (client, server) = match (conflict.client, conflict.server) {
        (None, None) => return None,
        (Some(client), None) => return Some(client.clone()),
        (None, Some(server)) => return Some(server.clone()),
        (Some(client), Some(server)) => (client, server),
    };

    let resolved = match strategy {
        ConflictStrategy::ServerWins => server.clone(),
        ConflictStrategy::ClientWins => client.clone(),
        ConflictStrategy::LastWriteWins => {
            if conflict.client_is_newer() {
                client.clone()
            } else {
                server.clone()
            }
        }
        ConflictStrategy::Merge => merge(client, server, conflict.client_is_newer()),
    };

    debug!(%strategy, fields = ?conflicting_fields(client, server), "resolved conflict");
    Some(resolved)
}

fn merge(client: &Value, server: &Value, client_is_newer: bool) -> Value {
    let (Value::Object(client), Value::Object(server)) = (client, server) else {
        // Non-objects cannot be merged field by field
        return if client_is_newer {
            client.clone()
        } else {
            server.clone()
        };
    };

    let mut merged: Map<String, Value> = server.clone();
    for (key, value) in client {
        match server.get(key) {
            None => {
                merged.insert(key.clone(), value.clone());
            }
            Some(theirs) if theirs != value && client_is_newer => {
                merged.insert(key.clone(), value.clone());
            }
            Some(_) => {}
        }
    }

    Value::Object(merged)
}

/// Keys whose values differ between the two records.
#[must_use]
pub fn conflicting_fields(client: &Value, server: &Value) -> Vec<String> {
    let empty = Map::new();
    let client = client.as_object().unwrap_or(&empty);
    let server = server.as_object().unwrap_or(&empty);

    let mut keys: Vec<&String> = client.keys().chain(server.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter(|key| client.get(*key) != server.get(*key))
        .cloned()
        .collect()
}
