//! Field mapper
//!
//! Converts between the raw data document of one record and the typed field
//! values of an entity, driven by a [`FieldMappingTable`].
//!
//! # Extraction
//!
//! For every mappable field, each mapped property expression is evaluated
//! against the raw document and the per-delta results are zipped by delta
//! index. Constant mappings are then overlaid onto every delta, and every
//! value is normalized to its property type.
//!
//! # Creation
//!
//! Field values are re-keyed by property and injected, delta by delta, into a
//! single output document shared by all fields of the record. Constant
//! mappings are never written back.
//!
//! # Example
//!
//! ```rust,ignore
//! let mapper = FieldMapper::new("movie", &config, &schema, &PropertyTypeCatalog::default())?;
//! let values = mapper.extract_entity_values(&raw);
//! let raw_again = mapper.create_raw_data(&values)?;
//! ```

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::dialect::{CompiledExpression, Dialect};
use crate::document::{self, RawDocument};
use crate::error::{Error, Result};
use crate::mapping::{FieldMapperConfig, FieldMappingTable, MappingExpression, PropertyMappings};
use crate::processor;
use crate::schema::{
    ANNOTATION_FIELD, EntitySchemaProvider, FieldDefinition, PropertyDefinition, PropertyType,
    PropertyTypeCatalog,
};

/// Field holding the record identifier
pub const ID_FIELD: &str = "id";

/// Reference property whose empty values are never kept
const TARGET_ID: &str = "target_id";

/// Values of one delta, keyed by property name
pub type PropertyValues = BTreeMap<String, Value>;

/// All deltas of one field, in order
pub type FieldValues = Vec<PropertyValues>;

/// Field values of one entity, keyed by field name
pub type EntityValues = BTreeMap<String, FieldValues>;

#[derive(Debug, Clone)]
enum PropertyMapping {
    Constant(String),
    Path(CompiledExpression),
}

#[derive(Debug, Clone)]
struct MappedProperty {
    name: String,
    property_type: PropertyType,
    mapping: PropertyMapping,
}

#[derive(Debug, Clone)]
struct MappableField {
    definition: FieldDefinition,
    mappable_properties: Vec<PropertyDefinition>,
    mapped: Vec<MappedProperty>,
}

impl MappableField {
    fn mapped_property(&self, name: &str) -> Option<&MappedProperty> {
        self.mapped.iter().find(|p| p.name == name)
    }
}

/// Maps raw data documents to entity values and back for one entity type
#[derive(Debug, Clone)]
pub struct FieldMapper {
    entity_type: String,
    dialect: Dialect,
    constant_prefix: Option<String>,
    field_mappings: FieldMappingTable,
    fields: Vec<MappableField>,
}

impl FieldMapper {
    /// Build and validate a mapper.
    ///
    /// Blank mappings are dropped first. Mappings naming unknown fields or
    /// non-mappable properties are ignored with a warning. Malformed
    /// expressions and required fields without a raw data mapping are
    /// rejected.
    pub fn new(
        entity_type: &str,
        config: &FieldMapperConfig,
        schema: &dyn EntitySchemaProvider,
        catalog: &PropertyTypeCatalog,
    ) -> Result<Self> {
        let field_mappings = config.field_mappings.clone().without_empty();
        let constant_prefix = config.constant_prefix.clone().filter(|p| !p.is_empty());

        let mut fields: Vec<MappableField> = schema
            .field_definitions(entity_type)?
            .into_iter()
            .filter(|field| field.name != ANNOTATION_FIELD && !field.computed)
            .map(|definition| MappableField {
                mappable_properties: mappable_properties(&definition, catalog),
                definition,
                mapped: Vec::new(),
            })
            .collect();

        for (field_name, mappings) in field_mappings.iter() {
            let Some(field) = fields.iter_mut().find(|f| &f.definition.name == field_name) else {
                tracing::warn!(entity_type, field = %field_name, "ignoring mapping of unknown or unmappable field");
                continue;
            };

            for (property_name, expression) in mappings {
                let Some(property) = field
                    .mappable_properties
                    .iter()
                    .find(|p| &p.name == property_name)
                else {
                    tracing::warn!(
                        entity_type,
                        field = %field_name,
                        property = %property_name,
                        "ignoring mapping of unknown or unmappable property"
                    );
                    continue;
                };

                let property_type = catalog
                    .resolve(&property.data_type)
                    .unwrap_or(PropertyType::Reference);
                let mapping =
                    match MappingExpression::classify(expression, constant_prefix.as_deref()) {
                        MappingExpression::Constant(literal) => {
                            PropertyMapping::Constant(literal.to_string())
                        }
                        MappingExpression::Path(path) => {
                            let compiled = config.dialect.compile(path).map_err(|e| {
                                Error::MappingValidation {
                                    field: field_name.clone(),
                                    message: e.to_string(),
                                }
                            })?;
                            PropertyMapping::Path(compiled)
                        }
                    };

                field.mapped.push(MappedProperty {
                    name: property_name.clone(),
                    property_type,
                    mapping,
                });
            }
        }

        let mapper = Self {
            entity_type: entity_type.to_string(),
            dialect: config.dialect,
            constant_prefix,
            field_mappings,
            fields,
        };
        mapper.validate_required()?;

        tracing::debug!(
            entity_type,
            dialect = mapper.dialect.id(),
            fields = mapper.fields.iter().filter(|f| !f.mapped.is_empty()).count(),
            "field mapper ready"
        );
        Ok(mapper)
    }

    fn validate_required(&self) -> Result<()> {
        for field in &self.fields {
            let definition = &field.definition;
            let required = definition.required
                || self
                    .dialect
                    .required_fields()
                    .contains(&definition.name.as_str());
            if !required {
                continue;
            }

            let main = &definition.main_property;
            match self.field_property_mapping(&definition.name, main) {
                None => {
                    return Err(Error::MappingValidation {
                        field: definition.name.clone(),
                        message: format!("the {} field requires a mapping for '{main}'", definition.label),
                    });
                }
                Some(expression)
                    if MappingExpression::classify(expression, self.constant_mapping_prefix())
                        .is_constant() =>
                {
                    return Err(Error::MappingValidation {
                        field: definition.name.clone(),
                        message: format!(
                            "the {} field cannot be mapped to a constant value",
                            definition.label
                        ),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Entity type this mapper serves
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Expression dialect
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Prefix marking constant mappings, if constants are enabled
    pub fn constant_mapping_prefix(&self) -> Option<&str> {
        self.constant_prefix.as_deref()
    }

    /// The (blank-free) field mapping table
    pub fn field_mappings(&self) -> &FieldMappingTable {
        &self.field_mappings
    }

    /// Property mappings of one field
    pub fn field_mapping(&self, field: &str) -> Option<&PropertyMappings> {
        self.field_mappings.field(field)
    }

    /// Mapping expression of one field property
    pub fn field_property_mapping(&self, field: &str, property: &str) -> Option<&str> {
        self.field_mappings.property(field, property)
    }

    /// Fields that can be mapped, in schema order
    pub fn mappable_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().map(|f| &f.definition)
    }

    /// Properties of a field that can be mapped
    pub fn mappable_field_properties(&self, field: &str) -> &[PropertyDefinition] {
        self.field(field)
            .map(|f| f.mappable_properties.as_slice())
            .unwrap_or_default()
    }

    /// Fields whose main property must map to raw data
    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| {
                f.definition.required
                    || self
                        .dialect
                        .required_fields()
                        .contains(&f.definition.name.as_str())
            })
            .map(|f| f.definition.name.as_str())
            .collect()
    }

    fn field(&self, name: &str) -> Option<&MappableField> {
        self.fields.iter().find(|f| f.definition.name == name)
    }

    /// Extract the record identifier without mapping the other fields
    pub fn extract_id(&self, raw: &RawDocument) -> Option<String> {
        let field = self.field(ID_FIELD)?;
        let property = field.mapped_property(&field.definition.main_property)?;
        match &property.mapping {
            PropertyMapping::Path(expression) => expression
                .evaluate(raw)
                .first()
                .and_then(document::value_to_id),
            PropertyMapping::Constant(_) => None,
        }
    }

    /// Map a raw data document to entity values.
    ///
    /// Fields without any value are left out.
    pub fn extract_entity_values(&self, raw: &RawDocument) -> EntityValues {
        let mut entity_values = EntityValues::new();
        for field in &self.fields {
            let values = self.extract_field_values(field, raw);
            if !values.is_empty() {
                entity_values.insert(field.definition.name.clone(), values);
            }
        }
        entity_values
    }

    fn extract_field_values(&self, field: &MappableField, raw: &RawDocument) -> FieldValues {
        if field.mapped.is_empty() {
            return FieldValues::new();
        }

        let mut deltas = FieldValues::new();
        for property in &field.mapped {
            let PropertyMapping::Path(expression) = &property.mapping else {
                continue;
            };

            for (delta, value) in expression.evaluate(raw).into_iter().enumerate() {
                if deltas.len() <= delta {
                    deltas.resize_with(delta + 1, PropertyValues::new);
                }
                if value.is_null() || (property.name == TARGET_ID && document::is_empty_value(&value))
                {
                    continue;
                }
                deltas[delta].insert(property.name.clone(), value);
            }
        }
        deltas.retain(|delta| !delta.is_empty());

        let constants: Vec<(&str, &str)> = field
            .mapped
            .iter()
            .filter_map(|p| match &p.mapping {
                PropertyMapping::Constant(literal) => Some((p.name.as_str(), literal.as_str())),
                PropertyMapping::Path(_) => None,
            })
            .collect();
        if !constants.is_empty() {
            if deltas.is_empty() {
                deltas.push(PropertyValues::new());
            }
            for delta in &mut deltas {
                for (name, literal) in &constants {
                    delta.insert(name.to_string(), Value::String(literal.to_string()));
                }
            }
        }

        for delta in &mut deltas {
            for property in &field.mapped {
                if let Some(value) = delta.get_mut(&property.name) {
                    *value = processor::normalize(
                        property.property_type,
                        field.definition.datetime_type,
                        value.take(),
                    );
                }
            }
        }

        tracing::trace!(
            entity_type = %self.entity_type,
            field = %field.definition.name,
            deltas = deltas.len(),
            "extracted field values"
        );
        deltas
    }

    /// Build a raw data document from entity values.
    ///
    /// Fields unknown to the mapper are skipped. Two mappings writing
    /// incompatible values at the same location fail with
    /// [`Error::InjectionConflict`].
    pub fn create_raw_data(&self, entity_values: &EntityValues) -> Result<RawDocument> {
        let mut raw = Value::Object(Map::new());
        for (field_name, field_values) in entity_values {
            let Some(field) = self.field(field_name) else {
                tracing::debug!(entity_type = %self.entity_type, field = %field_name, "skipping field without mapping");
                continue;
            };
            raw = self.add_field_values(field, field_values, raw)?;
        }
        Ok(raw)
    }

    fn add_field_values(
        &self,
        field: &MappableField,
        field_values: &FieldValues,
        mut raw: RawDocument,
    ) -> Result<RawDocument> {
        for property in &field.mapped {
            let PropertyMapping::Path(expression) = &property.mapping else {
                continue;
            };

            let values: Vec<Value> = field_values
                .iter()
                .filter_map(|delta| delta.get(&property.name).cloned())
                .collect();
            if values.is_empty() {
                continue;
            }
            raw = expression.inject(raw, &values, field.definition.cardinality)?;
        }
        Ok(raw)
    }
}

fn mappable_properties(
    definition: &FieldDefinition,
    catalog: &PropertyTypeCatalog,
) -> Vec<PropertyDefinition> {
    definition
        .properties
        .iter()
        .filter(|property| !property.read_only)
        .filter(|property| match catalog.resolve(&property.data_type) {
            Some(property_type) => property_type.is_mappable(),
            None => {
                tracing::debug!(
                    field = %definition.name,
                    property = %property.name,
                    data_type = %property.data_type,
                    "unknown property data type, not mappable"
                );
                false
            }
        })
        .cloned()
        .collect()
}
