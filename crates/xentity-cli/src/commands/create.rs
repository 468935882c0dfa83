//! Map entity values to raw records

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use xentity_core::{EntityValues, RawDataStore};

use super::{load_entity_type, read_documents};

/// Run the create command
///
/// Input lines are entity values, either bare or wrapped as produced by
/// `extract` (`{"id": ..., "values": {...}}`).
pub async fn run(config_path: &str, entity_type: &str, input: &str, save: bool) -> Result<()> {
    let ctx = load_entity_type(config_path, entity_type)?;

    let store = if save {
        if ctx.entity_type.read_only {
            anyhow::bail!("Entity type '{}' is read-only", ctx.entity_type.id);
        }
        Some(
            ctx.config
                .open_store(&ctx.entity_type)
                .await
                .context("Failed to open storage")?,
        )
    } else {
        None
    };

    let mut created = 0;
    let mut failed = 0;
    for (position, document) in read_documents(Path::new(input))?.into_iter().enumerate() {
        let record = position + 1;
        let values = match entity_values(document) {
            Ok(values) => values,
            Err(e) => {
                failed += 1;
                tracing::warn!(record, error = %e, "skipping malformed entity values");
                continue;
            }
        };

        let raw = match ctx.mapper.create_raw_data(&values) {
            Ok(raw) => raw,
            Err(e) => {
                failed += 1;
                tracing::warn!(record, error = %e, "failed to create raw data");
                continue;
            }
        };

        match &store {
            Some(store) => match store.save(raw).await {
                Ok(id) => println!("{id}"),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(record, error = %e, "failed to save record");
                    continue;
                }
            },
            None => println!("{}", serde_json::to_string(&raw)?),
        }
        created += 1;
    }

    tracing::info!(
        "Created {} {} records ({} failed)",
        created,
        ctx.entity_type.id,
        failed
    );
    Ok(())
}

fn entity_values(document: Value) -> serde_json::Result<EntityValues> {
    match document {
        Value::Object(mut object) if object.contains_key("values") => {
            serde_json::from_value(object.remove("values").unwrap_or_default())
        }
        other => serde_json::from_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrapped_and_bare_values() {
        let bare = json!({"title": [{"value": "T"}]});
        let wrapped = json!({"id": "x", "values": bare.clone()});
        assert_eq!(
            entity_values(bare).unwrap(),
            entity_values(wrapped).unwrap()
        );
    }

    #[test]
    fn test_malformed_values() {
        assert!(entity_values(json!({"title": "not a list"})).is_err());
    }
}
