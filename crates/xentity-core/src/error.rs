//! Error types for xentity-core

use thiserror::Error;

/// Result type alias for xentity-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in xentity-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// Entity type is not defined in the project
    #[error("unknown entity type '{entity_type}'")]
    UnknownEntityType {
        /// Requested entity type id
        entity_type: String,
    },

    /// A mapping expression could not be parsed or used
    #[error("invalid mapping expression '{expression}': {message}")]
    InvalidExpression {
        /// The offending expression
        expression: String,
        /// Description of the problem
        message: String,
    },

    /// The field mapping table violates a mapping rule
    #[error("invalid mapping for field '{field}': {message}")]
    MappingValidation {
        /// Field whose mapping is invalid
        field: String,
        /// Description of the violation
        message: String,
    },

    /// Two mappings write incompatible values at the same raw data path
    #[error("cannot write raw data at '{path}': {message}")]
    InjectionConflict {
        /// Slash-joined path of the conflicting location
        path: String,
        /// Description of the conflict
        message: String,
    },

    /// Storage client error
    #[error("storage '{storage}' error: {message}")]
    StorageError {
        /// Name of the storage client
        storage: String,
        /// Description of the error
        message: String,
    },

    /// Record does not exist in the storage
    #[error("record '{id}' not found")]
    RecordNotFound {
        /// Record identifier
        id: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn expression(expression: &str, message: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}
