//! Validate configuration command

use anyhow::{Context, Result};
use xentity_core::Config;

/// Run the validate command
pub async fn run(config_path: &str) -> Result<()> {
    tracing::info!("Validating configuration: {}", config_path);

    let config = Config::load(config_path).context("Failed to load configuration")?;
    tracing::info!("✓ Project: {}", config.project.name);
    tracing::info!("✓ Version: {}", config.project.version);

    let entity_types = config
        .load_entity_types()
        .context("Failed to load entity types")?;

    let mut failed = 0;
    for entity_type in &entity_types {
        match config.build_mapper(entity_type) {
            Ok(mapper) => tracing::info!(
                "✓ Entity type '{}': {} dialect, {} mapped fields",
                entity_type.id,
                mapper.dialect().id(),
                mapper.field_mappings().iter().count()
            ),
            Err(e) => {
                failed += 1;
                tracing::error!("✗ Entity type '{}': {}", entity_type.id, e);
            }
        }
        if entity_type.storage.is_none() {
            tracing::warn!("Entity type '{}' has no storage configured", entity_type.id);
        }
    }

    if failed > 0 {
        anyhow::bail!(
            "{} of {} entity types failed validation",
            failed,
            entity_types.len()
        );
    }

    tracing::info!("✓ Configuration is valid");
    Ok(())
}
