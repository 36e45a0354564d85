//! Sync queue command implementation.
//!
//! Handles status, delivery and queue management commands.

use colored::Colorize;
use serde_json::json;
use tracing::{info, warn};

use super::Context;
use crate::cli::args::{OutputFormat, StatusFilter};
use crate::error::SyncError;
use crate::features::sync::OperationStatus;
use crate::output::{format_operations, format_stats, format_status, format_sync, to_json};

impl From<StatusFilter> for OperationStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Pending => Self::Pending,
            StatusFilter::InFlight => Self::InFlight,
            StatusFilter::Failed => Self::Failed,
            StatusFilter::Canceled => Self::Canceled,
        }
    }
}

/// Show sync status.
///
/// # Errors
///
/// Returns an error if output formatting fails.
pub async fn status(ctx: &Context) -> Result<String, SyncError> {
    ctx.probe().await;
    format_status(&ctx.engine.status(), ctx.format)
}

/// Run one sync pass.
///
/// # Errors
///
/// Returns an error if local storage fails during the pass.
pub async fn run(ctx: &Context) -> Result<String, SyncError> {
    ctx.probe().await;
    let result = ctx.engine.manual_sync().await?;

    if result.total() == 0 && !result.offline && ctx.format == OutputFormat::Pretty {
        return Ok("No pending operations to sync.".to_string());
    }
    format_sync(&result, ctx.format)
}

/// List queued operations.
///
/// # Errors
///
/// Returns an error if the queue cannot be read.
pub fn list(ctx: &Context, filter: Option<StatusFilter>) -> Result<String, SyncError> {
    let status = filter.map(OperationStatus::from);
    let ops = ctx.engine.queue().list(status)?;

    let title = status.map_or_else(
        || "Queue".to_string(),
        |s| format!("{} operations", s.as_str().replace('_', " ")),
    );
    format_operations(&ops, &title, ctx.format)
}

/// Cancel one operation.
///
/// # Errors
///
/// Returns an error if the queue cannot be updated.
pub fn cancel(ctx: &Context, id: &str) -> Result<String, SyncError> {
    let canceled = ctx.engine.cancel_operation(id)?;
    if !canceled && ctx.engine.queue().get(id)?.is_none() {
        return Err(SyncError::NotFound(format!("Operation {id}")));
    }

    match ctx.format {
        OutputFormat::Json => to_json(&json!({ "id": id, "canceled": canceled })),
        OutputFormat::Pretty if canceled => Ok(format!("{} Canceled {id}", "✓".green())),
        OutputFormat::Pretty => Ok(format!("{} {id} was already canceled", "○".yellow())),
    }
}

/// Cancel every queued operation.
///
/// # Errors
///
/// Returns an error without `--force` or if the queue cannot be updated.
pub fn cancel_all(ctx: &Context, force: bool) -> Result<String, SyncError> {
    if !force {
        return Err(SyncError::InvalidInput(
            "Use --force to cancel all operations".to_string(),
        ));
    }

    let count = ctx.engine.cancel_all_operations()?;
    match ctx.format {
        OutputFormat::Json => to_json(&json!({ "canceled": count })),
        OutputFormat::Pretty => Ok(format!("Canceled {count} operations")),
    }
}

/// Reset failed operations to pending.
///
/// # Errors
///
/// Returns an error if the operation is not failed or the queue cannot be
/// updated.
pub fn requeue(ctx: &Context, id: Option<&str>, all: bool) -> Result<String, SyncError> {
    let queue = ctx.engine.queue();

    let count = match id {
        Some(id) if !all => {
            if !queue.requeue(id)? {
                return Err(SyncError::NotFound(format!("Failed operation {id}")));
            }
            1
        }
        _ => queue.requeue_all()?,
    };

    match ctx.format {
        OutputFormat::Json => to_json(&json!({ "requeued": count })),
        OutputFormat::Pretty => Ok(format!("Reset {count} failed operations for retry")),
    }
}

/// Replace the local cache with the server's full backup.
///
/// # Errors
///
/// Returns an error if the backend is unreachable or the import fails.
pub async fn pull(ctx: &Context) -> Result<String, SyncError> {
    ctx.probe().await;
    let count = ctx.engine.pull_full_backup().await?;

    match ctx.format {
        OutputFormat::Json => to_json(&json!({ "records": count })),
        OutputFormat::Pretty => Ok(format!("{} Imported {count} records", "✓".green())),
    }
}

/// Show queue statistics.
///
/// # Errors
///
/// Returns an error if the queue cannot be read.
pub fn stats(ctx: &Context) -> Result<String, SyncError> {
    let stats = ctx.engine.queue().stats()?;
    format_stats(&stats, ctx.format)
}

/// Purge canceled operations older than the retention window.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn cleanup(ctx: &Context, older_than: Option<i64>) -> Result<String, SyncError> {
    let hours = older_than.unwrap_or(ctx.config.sync.canceled_retention_hours);
    if hours < 0 {
        return Err(SyncError::InvalidInput("--older-than must not be negative".to_string()));
    }

    let count = ctx.engine.queue().cleanup(hours)?;
    match ctx.format {
        OutputFormat::Json => to_json(&json!({ "removed": count })),
        OutputFormat::Pretty => Ok(format!(
            "Removed {count} canceled operations older than {hours} hours"
        )),
    }
}

/// Sync in the foreground until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the signal handler cannot be installed.
pub async fn watch(ctx: &Context) -> Result<String, SyncError> {
    let engine = &ctx.engine;

    // Print every state change as it happens
    let format = ctx.format;
    let _subscription = engine.state().subscribe(move |state| match format {
        OutputFormat::Json => {
            if let Ok(line) = serde_json::to_string(state) {
                println!("{line}");
            }
        }
        OutputFormat::Pretty => println!(
            "{} pending={} syncing={}{}",
            chrono::Local::now().format("%H:%M:%S").to_string().dimmed(),
            state.pending_count,
            state.is_syncing,
            state
                .last_error
                .as_ref()
                .map(|e| format!("  {}", e.red()))
                .unwrap_or_default()
        ),
    });

    let reconnects = engine.spawn_reconnect_listener();
    let probe = engine
        .connectivity()
        .spawn_probe(ctx.remote.clone(), ctx.config.sync.probe_interval());
    let periodic = ctx
        .config
        .sync
        .periodic_interval()
        .map(|interval| engine.spawn_periodic(interval));

    info!(base_url = %ctx.config.remote.base_url, "watching for changes");
    let stopped = tokio::signal::ctrl_c().await;

    reconnects.abort();
    probe.abort();
    if let Some(periodic) = periodic {
        periodic.abort();
    }

    if let Err(e) = stopped {
        warn!(error = %e, "signal handler failed");
        return Err(SyncError::Io(e));
    }
    Ok(String::new())
}
