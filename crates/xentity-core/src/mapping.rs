//! Mapping configuration model
//!
//! A field mapping table assigns one mapping expression to each
//! (field, property) pair:
//!
//! ```yaml
//! field_mappings:
//!   id:
//!     value: uuid
//!   tags:
//!     target_id: "tags/*/id"
//!   kind:
//!     value: "+movie"       # constant
//! ```
//!
//! Expressions starting with the constant prefix (default `+`) supply a fixed
//! literal and are never evaluated against raw data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dialect::Dialect;

/// Default prefix marking a constant mapping
pub const DEFAULT_CONSTANT_PREFIX: &str = "+";

/// Mapping expressions of one field, keyed by property name
pub type PropertyMappings = BTreeMap<String, String>;

/// Mapping expressions keyed by field name, then property name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMappingTable(BTreeMap<String, PropertyMappings>);

impl FieldMappingTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mapping of one field property
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        property: impl Into<String>,
        expression: impl Into<String>,
    ) {
        self.0
            .entry(field.into())
            .or_default()
            .insert(property.into(), expression.into());
    }

    /// Builder-style variant of [`insert`](Self::insert)
    pub fn with(
        mut self,
        field: impl Into<String>,
        property: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        self.insert(field, property, expression);
        self
    }

    /// All property mappings of a field, if any
    pub fn field(&self, field: &str) -> Option<&PropertyMappings> {
        self.0.get(field).filter(|m| !m.is_empty())
    }

    /// Mapping expression of one field property, if any
    pub fn property(&self, field: &str, property: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|m| m.get(property))
            .map(String::as_str)
    }

    /// Iterate fields and their property mappings
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyMappings)> {
        self.0.iter()
    }

    /// Whether the table holds no mappings
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop blank expressions, then fields left without mappings
    pub fn without_empty(mut self) -> Self {
        for mappings in self.0.values_mut() {
            mappings.retain(|_, expression| !expression.trim().is_empty());
        }
        self.0.retain(|_, mappings| !mappings.is_empty());
        self
    }
}

/// A classified mapping expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingExpression<'a> {
    /// Literal value applied to every delta
    Constant(&'a str),
    /// Dialect-specific path into the raw data
    Path(&'a str),
}

impl<'a> MappingExpression<'a> {
    /// Classify an expression; without a prefix nothing is constant
    pub fn classify(expression: &'a str, constant_prefix: Option<&str>) -> Self {
        match constant_prefix {
            Some(prefix) if !prefix.is_empty() => match expression.strip_prefix(prefix) {
                Some(literal) => MappingExpression::Constant(literal),
                None => MappingExpression::Path(expression),
            },
            _ => MappingExpression::Path(expression),
        }
    }

    /// Whether this is a constant mapping
    pub fn is_constant(&self) -> bool {
        matches!(self, MappingExpression::Constant(_))
    }
}

/// Field mapper configuration of one entity type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapperConfig {
    /// Expression dialect
    #[serde(default)]
    pub dialect: Dialect,

    /// Prefix marking constant mappings; `null` disables constants
    #[serde(default = "default_constant_prefix")]
    pub constant_prefix: Option<String>,

    /// Field mapping table
    #[serde(default)]
    pub field_mappings: FieldMappingTable,
}

fn default_constant_prefix() -> Option<String> {
    Some(DEFAULT_CONSTANT_PREFIX.to_string())
}

impl Default for FieldMapperConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            constant_prefix: default_constant_prefix(),
            field_mappings: FieldMappingTable::default(),
        }
    }
}

impl FieldMapperConfig {
    /// Configuration for a dialect with the default constant prefix
    pub fn new(dialect: Dialect, field_mappings: FieldMappingTable) -> Self {
        Self {
            dialect,
            field_mappings,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_constant() {
        assert_eq!(
            MappingExpression::classify("+A fixed string", Some("+")),
            MappingExpression::Constant("A fixed string")
        );
        assert_eq!(
            MappingExpression::classify("title", Some("+")),
            MappingExpression::Path("title")
        );
    }

    #[test]
    fn test_classify_without_prefix() {
        assert!(!MappingExpression::classify("+42", None).is_constant());
        assert!(!MappingExpression::classify("+42", Some("")).is_constant());
    }

    #[test]
    fn test_without_empty_drops_blank_mappings() {
        let table = FieldMappingTable::new()
            .with("title", "value", "name")
            .with("body", "value", "")
            .with("body", "format", "  ")
            .with("link", "uri", "href")
            .with("link", "title", "");
        let table = table.without_empty();
        assert!(table.field("body").is_none());
        assert_eq!(table.property("title", "value"), Some("name"));
        assert_eq!(table.property("link", "uri"), Some("href"));
        assert_eq!(table.property("link", "title"), None);
    }

    #[test]
    fn test_parse_mapper_config() {
        let yaml = r#"
dialect: jsonpath
field_mappings:
  id:
    value: "$.uuid"
  kind:
    value: "+movie"
"#;
        let config: FieldMapperConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.dialect, Dialect::JsonPath);
        assert_eq!(config.constant_prefix.as_deref(), Some("+"));
        assert_eq!(config.field_mappings.property("id", "value"), Some("$.uuid"));
    }

    #[test]
    fn test_parse_mapper_config_disabled_prefix() {
        let yaml = r#"
constant_prefix: null
field_mappings:
  id:
    value: id
"#;
        let config: FieldMapperConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.dialect, Dialect::Simple);
        assert!(config.constant_prefix.is_none());
    }
}
