//! Local record commands.

use serde_json::json;

use super::{parse_json, Context};
use crate::cli::args::OutputFormat;
use crate::error::SyncError;
use crate::output::{format_entities, format_entity_types_pretty, format_receipt, to_json};

/// Create a record locally and queue it.
///
/// # Errors
///
/// Returns an error if `data` is not a JSON object or storage fails.
pub fn create(ctx: &Context, entity: &str, data: &str) -> Result<String, SyncError> {
    let receipt = ctx.engine.create_record(entity, parse_json(data)?)?;
    format_receipt("Created", &receipt, ctx.format)
}

/// Update a record locally and queue the change.
///
/// # Errors
///
/// Returns an error if `data` is not a JSON object or storage fails.
pub fn update(ctx: &Context, entity: &str, id: &str, data: &str) -> Result<String, SyncError> {
    let receipt = ctx.engine.update_record(entity, id, parse_json(data)?)?;
    format_receipt("Updated", &receipt, ctx.format)
}

/// Delete a record locally and queue the delete.
///
/// # Errors
///
/// Returns an error if storage fails.
pub fn delete(ctx: &Context, entity: &str, id: &str) -> Result<String, SyncError> {
    let receipt = ctx.engine.delete_record(entity, id)?;
    format_receipt("Deleted", &receipt, ctx.format)
}

/// Show cached records of one type, or the types present.
///
/// # Errors
///
/// Returns an error if the cache cannot be read.
pub fn entities(ctx: &Context, entity: Option<&str>) -> Result<String, SyncError> {
    let store = ctx.engine.local_store();

    if let Some(entity) = entity {
        let records = store.list(entity)?;
        return format_entities(entity, &records, ctx.format);
    }

    let types = store.entity_types()?;
    match ctx.format {
        OutputFormat::Json => {
            let counts: serde_json::Map<_, _> = types
                .iter()
                .map(|(name, count)| (name.clone(), json!(count)))
                .collect();
            to_json(&counts)
        }
        OutputFormat::Pretty => Ok(format_entity_types_pretty(&types)),
    }
}
