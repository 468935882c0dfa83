//! Map raw records to entity values

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use xentity_core::RawDataStore;
use xentity_core::storage::Query;

use super::{load_entity_type, read_documents};

/// Run the extract command
///
/// Prints one JSON line `{"id": ..., "values": {...}}` per record.
pub async fn run(config_path: &str, entity_type: &str, input: Option<&str>) -> Result<()> {
    let ctx = load_entity_type(config_path, entity_type)?;

    let records = match input {
        Some(path) => read_documents(Path::new(path))?,
        None => {
            let store = ctx
                .config
                .open_store(&ctx.entity_type)
                .await
                .context("Failed to open storage")?;
            store.query(&Query::new()).await.context("Query failed")?
        }
    };

    let mut extracted = 0;
    let mut failed = 0;
    for (position, record) in records.iter().enumerate() {
        if !record.is_object() {
            failed += 1;
            tracing::warn!(record = position + 1, "skipping record that is not an object");
            continue;
        }

        let values = ctx.mapper.extract_entity_values(record);
        let line = json!({
            "id": ctx.mapper.extract_id(record),
            "values": values,
        });
        println!("{}", serde_json::to_string(&line)?);
        extracted += 1;
    }

    tracing::info!(
        "Extracted {} {} records ({} failed)",
        extracted,
        ctx.entity_type.id,
        failed
    );
    Ok(())
}
