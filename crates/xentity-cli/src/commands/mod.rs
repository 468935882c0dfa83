//! CLI command implementations

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use xentity_core::{Config, EntityTypeConfig, FieldMapper};

pub mod create;
pub mod extract;
pub mod init;
pub mod list;
pub mod status;
pub mod validate;

/// A loaded project narrowed to one entity type
pub struct EntityTypeContext {
    pub config: Config,
    pub entity_type: EntityTypeConfig,
    pub mapper: FieldMapper,
}

/// Load the project and build the mapper of `entity_type`
pub fn load_entity_type(config_path: &str, entity_type: &str) -> Result<EntityTypeContext> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let entity_type = config
        .load_entity_type(entity_type)
        .context("Failed to load entity type")?;
    let mapper = config
        .build_mapper(&entity_type)
        .with_context(|| format!("Invalid field mapping for '{}'", entity_type.id))?;

    Ok(EntityTypeContext {
        config,
        entity_type,
        mapper,
    })
}

/// Read documents from a JSON file (array or single object) or a JSON Lines file
pub fn read_documents(path: &Path) -> Result<Vec<Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if let Ok(value) = serde_json::from_str::<Value>(&contents) {
        return Ok(match value {
            Value::Array(items) => items,
            other => vec![other],
        });
    }

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid JSON", path.display(), number + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("[{\"a\":1},{\"a\":2}]", 2)]
    #[case("{\"a\":1}", 1)]
    #[case("{\"a\":1}\n\n{\"a\":2}\n{\"a\":3}\n", 3)]
    fn test_read_documents(#[case] contents: &str, #[case] expected: usize) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input");
        std::fs::write(&path, contents).unwrap();
        assert_eq!(read_documents(&path).unwrap().len(), expected);
    }

    #[test]
    fn test_read_documents_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"a\":1}\n{oops\n").unwrap();
        let err = read_documents(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"));
    }
}
