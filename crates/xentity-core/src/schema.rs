//! Entity schema definitions
//!
//! Describes which fields an external entity type has, what properties each
//! field carries and how property data types are interpreted when values are
//! mapped from raw data.
//!
//! Every external entity type carries the base fields `id`, `uuid`, `title`
//! and the reserved `annotation` reference. Additional fields are declared in
//! the entity type configuration by field type; the field type supplies the
//! default property set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Name of the reserved field linking an external entity to its local annotation
pub const ANNOTATION_FIELD: &str = "annotation";

/// Maximum number of values a field can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Cardinality {
    /// At most this many values
    Limited(u32),
    /// Any number of values (`-1` in configuration)
    Unlimited,
}

impl Cardinality {
    /// Whether the field holds at most one value
    pub fn is_single(&self) -> bool {
        matches!(self, Cardinality::Limited(1))
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality::Limited(1)
    }
}

impl TryFrom<i64> for Cardinality {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            -1 => Ok(Cardinality::Unlimited),
            n if (1..=i64::from(u32::MAX)).contains(&n) => Ok(Cardinality::Limited(n as u32)),
            n => Err(format!(
                "cardinality must be -1 (unlimited) or a positive count, got {n}"
            )),
        }
    }
}

impl From<Cardinality> for i64 {
    fn from(value: Cardinality) -> Self {
        match value {
            Cardinality::Limited(n) => i64::from(n),
            Cardinality::Unlimited => -1,
        }
    }
}

/// Storage representation for ISO-8601 date/time fields
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatetimeType {
    /// Date only, stored as `YYYY-MM-DD`
    Date,
    /// Date and time, stored as `YYYY-MM-DDTHH:MM:SS`
    #[default]
    Datetime,
}

impl DatetimeType {
    /// chrono format string of the storage representation
    pub fn storage_format(&self) -> &'static str {
        match self {
            DatetimeType::Date => "%Y-%m-%d",
            DatetimeType::Datetime => "%Y-%m-%dT%H:%M:%S",
        }
    }
}

/// Field types known to the schema, each with a default property set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Short plain text
    String,
    /// Long plain text
    StringLong,
    /// Universally unique identifier
    Uuid,
    /// Email address
    Email,
    /// Formatted text
    Text,
    /// Long formatted text
    TextLong,
    /// Integer number
    Integer,
    /// Floating point number
    Float,
    /// Decimal number
    Decimal,
    /// Boolean flag
    Boolean,
    /// ISO-8601 date or date/time
    Datetime,
    /// Unix timestamp
    Timestamp,
    /// Reference to another entity
    EntityReference,
    /// Link with URI and title
    Link,
}

impl FieldType {
    /// Default property definitions for this field type
    pub fn default_properties(&self) -> Vec<PropertyDefinition> {
        match self {
            FieldType::String | FieldType::StringLong | FieldType::Uuid => {
                vec![PropertyDefinition::new("value", "string")]
            }
            FieldType::Email => vec![PropertyDefinition::new("value", "email")],
            FieldType::Text | FieldType::TextLong => vec![
                PropertyDefinition::new("value", "string"),
                PropertyDefinition::new("format", "filter_format"),
                PropertyDefinition::new("processed", "string").read_only(),
            ],
            FieldType::Integer => vec![PropertyDefinition::new("value", "integer")],
            FieldType::Float => vec![PropertyDefinition::new("value", "float")],
            FieldType::Decimal => vec![PropertyDefinition::new("value", "decimal")],
            FieldType::Boolean => vec![PropertyDefinition::new("value", "boolean")],
            FieldType::Datetime => vec![
                PropertyDefinition::new("value", "datetime_iso8601"),
                PropertyDefinition::new("date", "any").read_only(),
            ],
            FieldType::Timestamp => vec![PropertyDefinition::new("value", "timestamp")],
            FieldType::EntityReference => vec![
                PropertyDefinition::new("target_id", "entity_reference"),
                PropertyDefinition::new("entity", "entity_reference").read_only(),
            ],
            FieldType::Link => vec![
                PropertyDefinition::new("uri", "uri"),
                PropertyDefinition::new("title", "string"),
                PropertyDefinition::new("options", "map"),
            ],
        }
    }

    /// Name of the main property for this field type
    pub fn main_property(&self) -> &'static str {
        match self {
            FieldType::EntityReference => "target_id",
            FieldType::Link => "uri",
            _ => "value",
        }
    }
}

/// Definition of one property of a field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PropertyDefinition {
    /// Property name (e.g. `value`, `target_id`)
    pub name: String,

    /// Data type name, resolved through a [`PropertyTypeCatalog`]
    #[serde(rename = "type")]
    pub data_type: String,

    /// Human readable label
    #[serde(default)]
    pub label: Option<String>,

    /// Read-only (computed) properties are never mapped
    #[serde(default)]
    pub read_only: bool,
}

impl PropertyDefinition {
    /// Create a writable property definition
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            label: None,
            read_only: false,
        }
    }

    /// Mark the property as read-only
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Label, falling back to the property name
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Fully resolved definition of one entity field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Machine name
    pub name: String,
    /// Human readable label
    pub label: String,
    /// Field type
    pub field_type: FieldType,
    /// Maximum number of deltas
    pub cardinality: Cardinality,
    /// Whether the field must have a value
    pub required: bool,
    /// Computed fields are never mapped
    pub computed: bool,
    /// Storage representation for date/time properties
    pub datetime_type: DatetimeType,
    /// Property definitions
    pub properties: Vec<PropertyDefinition>,
    /// Name of the main property
    pub main_property: String,
}

impl FieldDefinition {
    /// Create a single-valued field with the default properties of its type
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            field_type,
            cardinality: Cardinality::default(),
            required: false,
            computed: false,
            datetime_type: DatetimeType::default(),
            properties: field_type.default_properties(),
            main_property: field_type.main_property().to_string(),
        }
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the cardinality
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Set the date/time storage representation
    pub fn with_datetime_type(mut self, datetime_type: DatetimeType) -> Self {
        self.datetime_type = datetime_type;
        self
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the field as computed
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Replace the property set
    pub fn with_properties(mut self, properties: Vec<PropertyDefinition>) -> Self {
        self.properties = properties;
        self
    }

    /// Look up a property definition by name
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Base fields carried by every external entity type
pub fn base_field_definitions() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("id", FieldType::String).with_label("ID"),
        FieldDefinition::new("uuid", FieldType::Uuid).with_label("UUID"),
        FieldDefinition::new("title", FieldType::String).with_label("Title"),
        FieldDefinition::new(ANNOTATION_FIELD, FieldType::EntityReference)
            .with_label("Annotation"),
    ]
}

/// Primitive data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    /// Text
    String,
    /// Signed integer
    Integer,
    /// Floating point number
    Float,
    /// Boolean
    Boolean,
    /// URI, stored as text
    Uri,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::String => "string",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Float => "float",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Uri => "uri",
        };
        f.write_str(name)
    }
}

/// Typed descriptor of a property data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    /// Scalar primitive, coerced with its casting rule
    Primitive(PrimitiveType),
    /// ISO-8601 date/time string
    DateTimeIso8601,
    /// Unix timestamp in seconds
    Timestamp,
    /// Identifier of a referenced entity, passed through unchanged
    Reference,
    /// Structured data that cannot be mapped
    Complex,
}

impl PropertyType {
    /// Only primitives and references can be mapped from raw data
    pub fn is_mappable(&self) -> bool {
        !matches!(self, PropertyType::Complex)
    }
}

/// Resolves property data type names to [`PropertyType`] descriptors
#[derive(Debug, Clone)]
pub struct PropertyTypeCatalog {
    types: HashMap<String, PropertyType>,
}

impl Default for PropertyTypeCatalog {
    fn default() -> Self {
        let mut catalog = Self {
            types: HashMap::new(),
        };
        for name in ["string", "email", "filter_format"] {
            catalog.register(name, PropertyType::Primitive(PrimitiveType::String));
        }
        catalog.register("uri", PropertyType::Primitive(PrimitiveType::Uri));
        catalog.register("integer", PropertyType::Primitive(PrimitiveType::Integer));
        catalog.register("float", PropertyType::Primitive(PrimitiveType::Float));
        catalog.register("decimal", PropertyType::Primitive(PrimitiveType::Float));
        catalog.register("boolean", PropertyType::Primitive(PrimitiveType::Boolean));
        catalog.register("datetime_iso8601", PropertyType::DateTimeIso8601);
        catalog.register("timestamp", PropertyType::Timestamp);
        catalog.register("entity_reference", PropertyType::Reference);
        catalog.register("language_reference", PropertyType::Reference);
        for name in ["map", "any", "list"] {
            catalog.register(name, PropertyType::Complex);
        }
        catalog
    }
}

impl PropertyTypeCatalog {
    /// Register (or replace) a data type
    pub fn register(&mut self, name: impl Into<String>, property_type: PropertyType) {
        self.types.insert(name.into(), property_type);
    }

    /// Resolve a data type name
    pub fn resolve(&self, name: &str) -> Option<PropertyType> {
        self.types.get(name).copied()
    }
}

/// Supplies the field definitions of an entity type
pub trait EntitySchemaProvider {
    /// All field definitions of the entity type, in declaration order
    fn field_definitions(&self, entity_type: &str) -> Result<Vec<FieldDefinition>>;
}

/// In-memory schema provider keyed by entity type id
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entity_types: HashMap<String, Vec<FieldDefinition>>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the fields of an entity type
    pub fn register(&mut self, entity_type: impl Into<String>, fields: Vec<FieldDefinition>) {
        self.entity_types.insert(entity_type.into(), fields);
    }
}

impl EntitySchemaProvider for SchemaRegistry {
    fn field_definitions(&self, entity_type: &str) -> Result<Vec<FieldDefinition>> {
        self.entity_types
            .get(entity_type)
            .cloned()
            .ok_or_else(|| Error::UnknownEntityType {
                entity_type: entity_type.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_from_config_values() {
        assert_eq!(Cardinality::try_from(-1i64), Ok(Cardinality::Unlimited));
        assert_eq!(Cardinality::try_from(3i64), Ok(Cardinality::Limited(3)));
        assert!(Cardinality::try_from(0i64).is_err());
        assert!(Cardinality::try_from(-2i64).is_err());
    }

    #[test]
    fn test_cardinality_yaml() {
        let c: Cardinality = serde_yaml::from_str("-1").unwrap();
        assert_eq!(c, Cardinality::Unlimited);
        assert!(!c.is_single());
        let c: Cardinality = serde_yaml::from_str("1").unwrap();
        assert!(c.is_single());
    }

    #[test]
    fn test_entity_reference_defaults() {
        let field = FieldDefinition::new("tags", FieldType::EntityReference);
        assert_eq!(field.main_property, "target_id");
        assert!(field.property("entity").unwrap().read_only);
        assert!(!field.property("target_id").unwrap().read_only);
    }

    #[test]
    fn test_base_fields() {
        let names: Vec<_> = base_field_definitions()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["id", "uuid", "title", ANNOTATION_FIELD]);
    }

    #[test]
    fn test_catalog_defaults() {
        let catalog = PropertyTypeCatalog::default();
        assert_eq!(
            catalog.resolve("boolean"),
            Some(PropertyType::Primitive(PrimitiveType::Boolean))
        );
        assert_eq!(catalog.resolve("entity_reference"), Some(PropertyType::Reference));
        assert!(!catalog.resolve("map").unwrap().is_mappable());
        assert!(catalog.resolve("geofield").is_none());
    }

    #[test]
    fn test_registry_unknown_type() {
        let registry = SchemaRegistry::new();
        let err = registry.field_definitions("movie").unwrap_err();
        assert!(err.to_string().contains("movie"));
    }
}
