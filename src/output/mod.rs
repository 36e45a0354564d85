//! Output formatting for binar-sync.
//!
//! Every CLI command renders through here, either as colored text or JSON.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::error::SyncError;
use crate::features::sync::{
    format_sync_result, CachedEntity, MutationReceipt, QueueOperation, QueueStats, SyncResult,
    SyncStatus,
};

pub use json::*;
pub use pretty::*;

/// Format the engine status based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_status(status: &SyncStatus, format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_status_pretty(status)),
        OutputFormat::Json => to_json(status),
    }
}

/// Format queue operations based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_operations(
    ops: &[QueueOperation],
    title: &str,
    format: OutputFormat,
) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_operations_pretty(ops, title)),
        OutputFormat::Json => format_operations_json(ops, title),
    }
}

/// Format a sync pass result based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_sync(result: &SyncResult, format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_sync_result(result)),
        OutputFormat::Json => to_json(result),
    }
}

/// Format queue statistics based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_stats(stats: &QueueStats, format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_stats_pretty(stats)),
        OutputFormat::Json => to_json(stats),
    }
}

/// Format cached records based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_entities(
    entity_type: &str,
    records: &[CachedEntity],
    format: OutputFormat,
) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_entities_pretty(entity_type, records)),
        OutputFormat::Json => format_entities_json(entity_type, records),
    }
}

/// Format a local mutation based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_receipt(
    action: &str,
    receipt: &MutationReceipt,
    format: OutputFormat,
) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_receipt_pretty(action, receipt)),
        OutputFormat::Json => to_json(receipt),
    }
}
