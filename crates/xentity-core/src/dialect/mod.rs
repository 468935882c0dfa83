//! Mapping expression dialects
//!
//! A dialect turns a mapping expression into an addressing plan over a raw
//! data document. The plan is evaluated for extraction (one raw value per
//! field delta) or used to inject per-delta values into an output document.
//!
//! # Dialects
//!
//! - `simple` - slash-delimited paths where `*` iterates a list, e.g.
//!   `authors/*/name`
//! - `jsonpath` - JSONPath queries, e.g. `$.authors[*].name`
//!
//! The output document is an explicit accumulator: [`CompiledExpression::inject`]
//! takes it by value and hands it back, so every field of one record writes
//! into the same document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{self, PathKey};
use crate::error::Result;
use crate::schema::Cardinality;

pub mod jsonpath;
pub mod simple;

pub use jsonpath::JsonPathExpression;
pub use simple::SimplePath;

/// Expression dialect of a field mapper
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum Dialect {
    /// Slash-delimited paths with `*` list expansion
    #[default]
    #[serde(rename = "simple")]
    Simple,
    /// JSONPath queries
    #[serde(rename = "jsonpath")]
    JsonPath,
}

impl Dialect {
    /// Identifier used in configuration
    pub fn id(&self) -> &'static str {
        match self {
            Dialect::Simple => "simple",
            Dialect::JsonPath => "jsonpath",
        }
    }

    /// Fields whose main property must be mapped to raw data
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Dialect::Simple => &["id", "title"],
            Dialect::JsonPath => &["id", "uuid", "title"],
        }
    }

    /// Parse a (non-constant) mapping expression
    pub fn compile(&self, expression: &str) -> Result<CompiledExpression> {
        match self {
            Dialect::Simple => SimplePath::parse(expression).map(CompiledExpression::Simple),
            Dialect::JsonPath => {
                JsonPathExpression::parse(expression).map(CompiledExpression::JsonPath)
            }
        }
    }
}

/// A parsed mapping expression of either dialect
#[derive(Debug, Clone)]
pub enum CompiledExpression {
    /// Simple path
    Simple(SimplePath),
    /// JSONPath query
    JsonPath(JsonPathExpression),
}

impl CompiledExpression {
    /// The expression as configured
    pub fn source(&self) -> &str {
        match self {
            CompiledExpression::Simple(path) => path.source(),
            CompiledExpression::JsonPath(path) => path.source(),
        }
    }

    /// Extract one raw value per field delta
    pub fn evaluate(&self, document: &Value) -> Vec<Value> {
        match self {
            CompiledExpression::Simple(path) => path.evaluate(document),
            CompiledExpression::JsonPath(path) => path.evaluate(document),
        }
    }

    /// Write per-delta values into the accumulated output document
    pub fn inject(
        &self,
        document: Value,
        values: &[Value],
        cardinality: Cardinality,
    ) -> Result<Value> {
        match self {
            CompiledExpression::Simple(path) => path.inject(document, values, cardinality),
            CompiledExpression::JsonPath(path) => path.inject(document, values, cardinality),
        }
    }
}

/// One step of a writable addressing plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal member or list position
    Key(PathKey),
    /// List expansion, one field delta per item
    Wildcard,
}

pub(crate) fn has_wildcard(segments: &[Segment]) -> bool {
    segments.iter().any(|s| matches!(s, Segment::Wildcard))
}

/// Concrete path for one delta: every wildcard takes the delta index
pub(crate) fn concrete_path(segments: &[Segment], delta: usize) -> Vec<PathKey> {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Key(key) => key.clone(),
            Segment::Wildcard => PathKey::Index(delta),
        })
        .collect()
}

/// Shared injection for plans made of literal steps and wildcards.
///
/// With a wildcard each delta goes to its own indexed location. Without one
/// the location receives a single value, or the list of all deltas when the
/// field is multi-valued and has more than one delta.
pub(crate) fn inject_segments(
    mut document: Value,
    segments: &[Segment],
    values: &[Value],
    cardinality: Cardinality,
) -> Result<Value> {
    if has_wildcard(segments) {
        for (delta, value) in values.iter().enumerate() {
            let path = concrete_path(segments, delta);
            document::set_path(&mut document, &path, value.clone())?;
        }
        return Ok(document);
    }

    let value = match values {
        [] => return Ok(document),
        [single] => single.clone(),
        [first, ..] if cardinality.is_single() => first.clone(),
        many => Value::Array(many.to_vec()),
    };
    let path = concrete_path(segments, 0);
    document::set_path(&mut document, &path, value)?;
    Ok(document)
}
