//! Show project status command

use anyhow::{Context, Result};
use xentity_core::{Config, RawDataStore};
use xentity_core::storage::StorageConfig;

/// Run the status command
pub async fn run(config_path: &str) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let entity_types = config
        .load_entity_types()
        .context("Failed to load entity types")?;

    println!("Project:  {} {}", config.project.name, config.project.version);
    println!("Path:     {}", config.base_path.display());
    println!("Dialect:  {} (default)", config.project.default_dialect.id());
    println!("Entity types: {}", entity_types.len());

    for entity_type in &entity_types {
        let dialect = entity_type
            .field_mapper
            .dialect
            .unwrap_or(config.project.default_dialect);
        let storage = match &entity_type.storage {
            Some(StorageConfig::File(file)) => format!("file {}", file.path),
            None => "none".to_string(),
        };
        let records = match config.open_store(entity_type).await {
            Ok(store) => match store.count_query(&[]).await {
                Ok(count) => count.to_string(),
                Err(e) => format!("unavailable ({e})"),
            },
            Err(e) => format!("unavailable ({e})"),
        };

        println!();
        println!("  {} ({})", entity_type.id, entity_type.label());
        println!("    dialect:   {}", dialect.id());
        println!("    read-only: {}", entity_type.read_only);
        println!("    storage:   {}", storage);
        println!("    records:   {}", records);
    }

    Ok(())
}
