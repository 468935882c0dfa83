//! List records of an entity type

use anyhow::{Context, Result};
use serde_json::Value;
use xentity_core::RawDataStore;
use xentity_core::storage::Query;

use super::load_entity_type;

/// Run the list command
pub async fn run(
    config_path: &str,
    entity_type: &str,
    limit: Option<usize>,
    offset: usize,
) -> Result<()> {
    let ctx = load_entity_type(config_path, entity_type)?;
    let store = ctx
        .config
        .open_store(&ctx.entity_type)
        .await
        .context("Failed to open storage")?;

    let records = store
        .query(&Query::new().range(offset, limit))
        .await
        .context("Query failed")?;
    let total = store.count_query(&[]).await.context("Count failed")?;

    for record in &records {
        let id = ctx.mapper.extract_id(record).unwrap_or_else(|| "-".to_string());
        let values = ctx.mapper.extract_entity_values(record);
        let title = values
            .get("title")
            .and_then(|deltas| deltas.first())
            .and_then(|delta| delta.get("value"))
            .and_then(Value::as_str)
            .unwrap_or("");
        println!("{id}\t{title}");
    }

    tracing::info!("Listed {} of {} records", records.len(), total);
    Ok(())
}
