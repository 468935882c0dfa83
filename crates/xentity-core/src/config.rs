//! Configuration parsing and validation
//!
//! This module handles loading and validating xentity project files.
//!
//! # Configuration Files
//!
//! - `xentity.yaml` - Project root configuration
//! - `entity_types/*.yaml` - One external entity type per file: its fields,
//!   field mapper and storage client

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::mapper::FieldMapper;
use crate::mapping::{FieldMapperConfig, FieldMappingTable};
use crate::schema::{
    Cardinality, DatetimeType, FieldDefinition, FieldType, PropertyDefinition,
    PropertyTypeCatalog, SchemaRegistry, base_field_definitions,
};
use crate::storage::{RawDataStore, StorageConfig};

/// Project file name
pub const PROJECT_FILE: &str = "xentity.yaml";

/// Directory holding entity type files
pub const ENTITY_TYPES_DIR: &str = "entity_types";

/// Root project configuration from `xentity.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,

    /// Dialect for entity types that do not name one
    #[serde(default)]
    pub default_dialect: Dialect,

    /// Free-form project variables
    #[serde(default)]
    pub vars: HashMap<String, serde_yaml::Value>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// One external entity type from `entity_types/<id>.yaml`
#[derive(Debug, Clone, Deserialize)]
pub struct EntityTypeConfig {
    /// Machine name
    pub id: String,

    /// Human readable label
    #[serde(default)]
    pub label: Option<String>,

    /// Records are never written back
    #[serde(default)]
    pub read_only: bool,

    /// Additional fields, in declaration order
    #[serde(default, deserialize_with = "ordered_fields")]
    pub fields: Vec<(String, FieldConfig)>,

    /// Field mapper settings
    #[serde(default)]
    pub field_mapper: FieldMapperSection,

    /// Storage client
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

/// Field definition as written in an entity type file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Field type
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Label
    #[serde(default)]
    pub label: Option<String>,

    /// Maximum number of values, `-1` for unlimited
    #[serde(default)]
    pub cardinality: Cardinality,

    /// Whether the field must be mapped to raw data
    #[serde(default)]
    pub required: bool,

    /// Computed fields are never mapped
    #[serde(default)]
    pub computed: bool,

    /// `date` or `datetime` storage for date/time properties
    #[serde(default)]
    pub datetime_type: DatetimeType,

    /// Explicit property set replacing the field type defaults
    #[serde(default)]
    pub properties: Option<Vec<PropertyDefinition>>,
}

/// `field_mapper` section of an entity type file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapperSection {
    /// Expression dialect; the project default when absent
    #[serde(default)]
    pub dialect: Option<Dialect>,

    /// Prefix marking constant mappings; `null` disables constants
    #[serde(default = "default_constant_prefix")]
    pub constant_prefix: Option<String>,

    /// Field mapping table
    #[serde(default)]
    pub field_mappings: FieldMappingTable,
}

fn default_constant_prefix() -> Option<String> {
    FieldMapperConfig::default().constant_prefix
}

impl Default for FieldMapperSection {
    fn default() -> Self {
        Self {
            dialect: None,
            constant_prefix: default_constant_prefix(),
            field_mappings: FieldMappingTable::default(),
        }
    }
}

fn ordered_fields<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, FieldConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct FieldsVisitor;

    impl<'de> Visitor<'de> for FieldsVisitor {
        type Value = Vec<(String, FieldConfig)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of field name to field definition")
        }

        fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
            let mut fields = Vec::new();
            while let Some(entry) = map.next_entry()? {
                fields.push(entry);
            }
            Ok(fields)
        }
    }

    deserializer.deserialize_any(FieldsVisitor)
}

impl FieldConfig {
    fn to_definition(&self, name: &str) -> FieldDefinition {
        let mut definition = FieldDefinition::new(name, self.field_type)
            .with_cardinality(self.cardinality)
            .with_datetime_type(self.datetime_type);
        if let Some(label) = &self.label {
            definition = definition.with_label(label);
        }
        if let Some(properties) = &self.properties {
            definition = definition.with_properties(properties.clone());
        }
        definition.required = self.required;
        definition.computed = self.computed;
        definition
    }
}

impl EntityTypeConfig {
    /// Label, falling back to the id
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    /// Base fields followed by the configured ones; a configured field
    /// replaces the base field of the same name
    pub fn field_definitions(&self) -> Vec<FieldDefinition> {
        let mut definitions = base_field_definitions();
        for (name, field) in &self.fields {
            let definition = field.to_definition(name);
            match definitions.iter_mut().find(|d| d.name == *name) {
                Some(existing) => *existing = definition,
                None => definitions.push(definition),
            }
        }
        definitions
    }

    /// Field mapper configuration, falling back to `default_dialect`
    pub fn mapper_config(&self, default_dialect: Dialect) -> FieldMapperConfig {
        FieldMapperConfig {
            dialect: self.field_mapper.dialect.unwrap_or(default_dialect),
            constant_prefix: self.field_mapper.constant_prefix.clone(),
            field_mappings: self.field_mapper.field_mappings.clone(),
        }
    }
}

/// Schema provider serving the given entity types
pub fn schema_registry(entity_types: &[EntityTypeConfig]) -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    for entity_type in entity_types {
        registry.register(entity_type.id.clone(), entity_type.field_definitions());
    }
    registry
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Base path of the project
    pub base_path: PathBuf,
}

impl Config {
    /// Load configuration from a directory
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the project directory or xentity.yaml file
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load("./my-project")?;
    /// println!("Project: {}", config.project.name);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (config_path, base_path) = if path.is_dir() {
            (path.join(PROJECT_FILE), path.to_path_buf())
        } else {
            (
                path.to_path_buf(),
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            )
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let project: ProjectConfig = serde_yaml::from_str(&contents)?;

        tracing::debug!(project = %project.name, path = %config_path.display(), "loaded project");
        Ok(Self { project, base_path })
    }

    /// Load all entity types from `entity_types/*.yaml`, in file name order
    pub fn load_entity_types(&self) -> Result<Vec<EntityTypeConfig>> {
        let dir = self.base_path.join(ENTITY_TYPES_DIR);
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut entries: Vec<_> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml")
            })
            .collect();
        entries.sort_by_key(|e| e.path());

        let mut seen = HashSet::new();
        let mut entity_types = Vec::new();
        for entry in entries {
            let contents = std::fs::read_to_string(entry.path())?;
            let entity_type: EntityTypeConfig = serde_yaml::from_str(&contents)?;
            if !seen.insert(entity_type.id.clone()) {
                return Err(Error::ConfigInvalid {
                    message: format!(
                        "entity type '{}' is defined more than once ({})",
                        entity_type.id,
                        entry.path().display()
                    ),
                });
            }
            entity_types.push(entity_type);
        }
        Ok(entity_types)
    }

    /// Load one entity type by id
    pub fn load_entity_type(&self, id: &str) -> Result<EntityTypeConfig> {
        self.load_entity_types()?
            .into_iter()
            .find(|entity_type| entity_type.id == id)
            .ok_or_else(|| Error::UnknownEntityType {
                entity_type: id.to_string(),
            })
    }

    /// Build the validated field mapper of an entity type
    pub fn build_mapper(&self, entity_type: &EntityTypeConfig) -> Result<FieldMapper> {
        let schema = schema_registry(std::slice::from_ref(entity_type));
        FieldMapper::new(
            &entity_type.id,
            &entity_type.mapper_config(self.project.default_dialect),
            &schema,
            &PropertyTypeCatalog::default(),
        )
    }

    /// Open the storage client of an entity type
    pub async fn open_store(&self, entity_type: &EntityTypeConfig) -> Result<Box<dyn RawDataStore>> {
        let storage = entity_type.storage.as_ref().ok_or_else(|| Error::ConfigInvalid {
            message: format!("entity type '{}' has no storage configured", entity_type.id),
        })?;
        storage.build(&self.base_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
name: test-project
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "test-project");
        assert_eq!(config.version, "0.1.0");
        assert_eq!(config.default_dialect, Dialect::Simple);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
name: test-project
version: "1.0.0"
default_dialect: jsonpath
vars:
  environment: production
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.version, "1.0.0");
        assert_eq!(config.default_dialect, Dialect::JsonPath);
        assert_eq!(config.vars.len(), 1);
    }

    #[test]
    fn test_parse_entity_type() {
        let yaml = r#"
id: movie
label: Movie
fields:
  refs:
    type: entity_reference
    cardinality: -1
  released:
    type: datetime
    datetime_type: date
    required: true
  title:
    type: string
    label: Name
field_mapper:
  field_mappings:
    id:
      value: uuid
    refs:
      target_id: "refs/*"
storage:
  type: file
  path: data/movies.json
"#;
        let entity_type: EntityTypeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(entity_type.label(), "Movie");
        assert!(!entity_type.read_only);

        let definitions = entity_type.field_definitions();
        let names: Vec<_> = definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["id", "uuid", "title", "annotation", "refs", "released"]);
        assert_eq!(definitions[2].label, "Name");
        assert_eq!(definitions[4].cardinality, Cardinality::Unlimited);
        assert_eq!(definitions[5].datetime_type, DatetimeType::Date);
        assert!(definitions[5].required);

        let mapper_config = entity_type.mapper_config(Dialect::JsonPath);
        assert_eq!(mapper_config.dialect, Dialect::JsonPath);
        assert_eq!(mapper_config.constant_prefix.as_deref(), Some("+"));
        assert_eq!(mapper_config.field_mappings.property("refs", "target_id"), Some("refs/*"));
    }

    #[test]
    fn test_constant_prefix_can_be_disabled() {
        let yaml = r#"
id: movie
field_mapper:
  dialect: simple
  constant_prefix: null
"#;
        let entity_type: EntityTypeConfig = serde_yaml::from_str(yaml).unwrap();
        let config = entity_type.mapper_config(Dialect::JsonPath);
        assert_eq!(config.dialect, Dialect::Simple);
        assert!(config.constant_prefix.is_none());
    }

    #[test]
    fn test_explicit_properties_replace_defaults() {
        let yaml = r#"
id: movie
fields:
  rating:
    type: integer
    properties:
      - name: value
        type: integer
      - name: scale
        type: integer
        read_only: true
"#;
        let entity_type: EntityTypeConfig = serde_yaml::from_str(yaml).unwrap();
        let rating = entity_type.field_definitions().pop().unwrap();
        assert_eq!(rating.properties.len(), 2);
        assert!(rating.property("scale").unwrap().read_only);
    }
}
