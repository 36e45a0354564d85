use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};

use crate::features::sync::{
    CachedEntity, MutationReceipt, OperationStatus, QueueOperation, QueueStats,
    SyncStatus,
};

fn status_icon(status: OperationStatus) -> ColoredString {
    match status {
        OperationStatus::Pending => "○".white(),
        OperationStatus::InFlight => "↻".cyan(),
        OperationStatus::Failed => "✗".red(),
        OperationStatus::Canceled => "-".dimmed(),
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format the engine status as pretty output
pub fn format_status_pretty(status: &SyncStatus) -> String {
    let connection = if status.is_online {
        "● online".green()
    } else {
        "● offline".red()
    };
    let activity = if status.is_syncing {
        "syncing".cyan()
    } else {
        "idle".dimmed()
    };

    let mut output = format!("Sync status  {connection}  {activity}\n");
    output.push_str(&"─".repeat(40));
    output.push('\n');

    let pending = if status.offline_count == 0 {
        "0".green()
    } else {
        status.offline_count.to_string().yellow()
    };
    output.push_str(&format!("  {}: {}\n", "Pending".dimmed(), pending));

    let last_sync = status
        .last_sync
        .as_ref()
        .map_or_else(|| "never".to_string(), timestamp);
    output.push_str(&format!("  {}: {}\n", "Last sync".dimmed(), last_sync));

    if let Some(latency) = status.latency {
        output.push_str(&format!("  {}: {} ms\n", "Latency".dimmed(), latency));
    }

    if let Some(error) = &status.last_error {
        let kind = status.last_error_type.map_or("unknown", |k| k.as_str());
        output.push_str(&format!(
            "  {}: {} {}\n",
            "Last error".dimmed(),
            error.red(),
            format!("({kind})").dimmed()
        ));
    }

    output
}

/// Format queue operations as a pretty list
pub fn format_operations_pretty(ops: &[QueueOperation], title: &str) -> String {
    if ops.is_empty() {
        return format!("{title} (0 operations)\n  Queue is empty");
    }

    let mut output = format!("{title} ({} operations)\n", ops.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for op in ops {
        let mut line = format!(
            "{} {}  {}",
            status_icon(op.status),
            op.summary().bold(),
            op.id.dimmed()
        );

        if op.retry_count > 0 {
            line.push_str(&format!("  {}", format!("{} attempts", op.retry_count).yellow()));
        }

        if let Some(error) = &op.last_error {
            line.push_str(&format!("\n    {}", error.red()));
        }

        output.push_str(&line);
        output.push('\n');
    }

    output
}

/// Format queue statistics as pretty output
pub fn format_stats_pretty(stats: &QueueStats) -> String {
    let mut output = String::from("Queue statistics\n");
    output.push_str(&"─".repeat(40));
    output.push('\n');

    let rows = [
        ("Pending", stats.pending),
        ("In flight", stats.in_flight),
        ("Failed", stats.failed),
        ("Canceled", stats.canceled),
    ];
    for (label, value) in rows {
        output.push_str(&format!("  {:<10} {}\n", format!("{label}:").dimmed(), value));
    }

    output.push_str(&format!(
        "  {:<10} {} create, {} update, {} delete\n",
        "By kind:".dimmed(),
        stats.creates,
        stats.updates,
        stats.deletes
    ));

    if let Some(oldest) = &stats.oldest_pending {
        output.push_str(&format!("  {:<10} {}\n", "Oldest:".dimmed(), timestamp(oldest)));
    }

    output
}

/// Format cached records as pretty output
pub fn format_entities_pretty(entity_type: &str, records: &[CachedEntity]) -> String {
    if records.is_empty() {
        return format!("{entity_type} (0 records)\n  No cached records");
    }

    let mut output = format!("{entity_type} ({} records)\n", records.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for record in records {
        let marker = if record.local_only {
            "local".yellow()
        } else {
            "synced".green()
        };
        output.push_str(&format!("{} {}  {}\n", marker, record.id.bold(), record.data));
    }

    output
}

/// Format the entity types present in the cache
pub fn format_entity_types_pretty(types: &[(String, usize)]) -> String {
    if types.is_empty() {
        return "Cache is empty".to_string();
    }

    let mut output = String::from("Cached records\n");
    output.push_str(&"─".repeat(40));
    output.push('\n');
    for (entity_type, count) in types {
        output.push_str(&format!("  {entity_type:<24} {count}\n"));
    }
    output
}

/// Format the result of a local mutation
pub fn format_receipt_pretty(action: &str, receipt: &MutationReceipt) -> String {
    format!(
        "{} {} {}/{}\n  {}: {}",
        "✓".green(),
        action,
        receipt.entity_type,
        receipt.id.bold(),
        "Queued".dimmed(),
        receipt.op_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::sync::ErrorType;
    use serde_json::json;

    #[test]
    fn test_format_empty_queue() {
        let output = format_operations_pretty(&[], "Queue");
        assert!(output.contains("0 operations"));
        assert!(output.contains("Queue is empty"));
    }

    #[test]
    fn test_format_operations_shows_errors() {
        let mut op = QueueOperation::create("workers", json!({}));
        op.status = OperationStatus::Failed;
        op.retry_count = 3;
        op.last_error = Some("Server error (503): down".to_string());

        let output = format_operations_pretty(&[op], "Queue");
        assert!(output.contains("create workers"));
        assert!(output.contains("3 attempts"));
        assert!(output.contains("Server error (503): down"));
    }

    #[test]
    fn test_format_status() {
        let status = SyncStatus {
            is_syncing: false,
            offline_count: 2,
            is_online: false,
            last_sync: None,
            last_error: Some("connection refused".to_string()),
            last_error_type: Some(ErrorType::Network),
            latency: None,
        };

        let output = format_status_pretty(&status);
        assert!(output.contains("offline"));
        assert!(output.contains("never"));
        assert!(output.contains("(network)"));
    }
}
