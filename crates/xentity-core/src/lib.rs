//! xentity Core Library
//!
//! This crate provides the field-mapping engine for external entities:
//! records held by a remote data source, handled as if they were typed,
//! locally stored entities.
//! - Mapping expression dialects (simple paths and JSONPath)
//! - Property value normalization
//! - The field mapper translating raw data documents to entity values and back
//! - Project configuration and raw data stores
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  raw document  ┌─────────────┐  entity values  ┌─────────────┐
//! │   Storage   │───────────────▶│    Field    │────────────────▶│    Host     │
//! │   client    │◀───────────────│   Mapper    │◀────────────────│   entity    │
//! └─────────────┘                └─────────────┘                 └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use xentity_core::Config;
//!
//! let config = Config::load("./my-project")?;
//! for entity_type in config.load_entity_types()? {
//!     let mapper = config.build_mapper(&entity_type)?;
//!     println!("{}: {:?}", entity_type.id, mapper.required_fields());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dialect;
pub mod document;
pub mod error;
pub mod mapper;
pub mod mapping;
pub mod processor;
pub mod schema;
pub mod storage;

pub use config::{Config, EntityTypeConfig, ProjectConfig};
pub use dialect::{CompiledExpression, Dialect};
pub use document::RawDocument;
pub use error::{Error, Result};
pub use mapper::{EntityValues, FieldMapper, FieldValues, PropertyValues};
pub use mapping::{FieldMapperConfig, FieldMappingTable};
pub use schema::{EntitySchemaProvider, FieldDefinition, PropertyTypeCatalog, SchemaRegistry};
pub use storage::{Filter, Query, RawDataStore, StorageConfig};
