//! Wire types for the remote API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RemoteError;
use crate::features::sync::{OperationKind, QueueOperation};

/// HTTP method of a remote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method used to send update operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    #[default]
    Patch,
    Put,
}

impl From<UpdateMethod> for HttpMethod {
    fn from(method: UpdateMethod) -> Self {
        match method {
            UpdateMethod::Patch => Self::Patch,
            UpdateMethod::Put => Self::Put,
        }
    }
}

/// A request against the backend, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: HttpMethod,
    /// Path beginning with `/api/`.
    pub path: String,
    pub body: Option<Value>,
}

impl RemoteRequest {
    /// Map a queued operation onto its REST call.
    ///
    /// - create: `POST /api/{entity}`
    /// - update: `PATCH|PUT /api/{entity}/{target}`
    /// - delete: `DELETE /api/{entity}/{target}`
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidRequest`] when an update or delete has no
    /// target id or the entity type is not a plain path segment.
    pub fn for_operation(
        op: &QueueOperation,
        update_method: UpdateMethod,
    ) -> Result<Self, RemoteError> {
        if !is_path_segment(&op.entity_type) {
            return Err(RemoteError::InvalidRequest(format!(
                "Invalid entity type '{}'",
                op.entity_type
            )));
        }

        let collection = format!("/api/{}", op.entity_type);
        let target = || {
            op.target_id
                .as_deref()
                .filter(|id| is_path_segment(id))
                .ok_or_else(|| {
                    RemoteError::InvalidRequest(format!(
                        "{} of {} requires a target id",
                        op.kind, op.entity_type
                    ))
                })
        };

        let request = match op.kind {
            OperationKind::Create => Self {
                method: HttpMethod::Post,
                path: collection,
                body: Some(op.payload.clone()),
            },
            OperationKind::Update => Self {
                method: update_method.into(),
                path: format!("{collection}/{}", target()?),
                body: Some(op.payload.clone()),
            },
            OperationKind::Delete => Self {
                method: HttpMethod::Delete,
                path: format!("{collection}/{}", target()?),
                body: None,
            },
        };

        Ok(request)
    }
}

fn is_path_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Successful response from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl RemoteResponse {
    /// The canonical entity in the body.
    ///
    /// Accepts both a bare object and the `{"data": {...}}` envelope.
    #[must_use]
    pub fn entity(&self) -> Option<&Value> {
        match self.body.as_ref()? {
            Value::Object(map) => match map.get("data") {
                Some(data @ Value::Object(_)) => Some(data),
                _ => self.body.as_ref(),
            },
            _ => None,
        }
    }
}

/// Contents of `GET /api/sync/full-backup`, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullBackup {
    pub tables: BTreeMap<String, Vec<Value>>,
}

impl FullBackup {
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

/// Envelope returned by the full-backup endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct BackupEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BackupEnvelope {
    /// Keep the array-valued tables; anything else is ignored.
    pub(crate) fn into_backup(self) -> Result<FullBackup, RemoteError> {
        if !self.success {
            return Err(RemoteError::Protocol(
                self.error
                    .unwrap_or_else(|| "Backup failed on server".to_string()),
            ));
        }

        let data = self
            .data
            .ok_or_else(|| RemoteError::Protocol("Backup response has no data".to_string()))?;

        let tables = data
            .into_iter()
            .filter_map(|(table, records)| match records {
                Value::Array(records) => Some((table, records)),
                _ => None,
            })
            .collect();

        Ok(FullBackup { tables })
    }
}
