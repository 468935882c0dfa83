//! Simple path dialect
//!
//! ```text
//! path-expr := segment ('/' segment)*
//! segment   := '*' | literal-key
//! ```
//!
//! Literal keys descend into objects; decimal keys also index lists. A `*`
//! segment expands the list found at that point: every item produces one
//! field delta, resolved against the remaining segments.

use serde_json::Value;

use super::{Segment, inject_segments};
use crate::document::{self, PathKey};
use crate::error::{Error, Result};
use crate::schema::Cardinality;

const WILDCARD: &str = "*";

/// A parsed simple path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplePath {
    source: String,
    segments: Vec<Segment>,
}

impl SimplePath {
    /// Parse an expression; empty expressions and empty segments are rejected
    pub fn parse(expression: &str) -> Result<Self> {
        if expression.trim().is_empty() {
            return Err(Error::expression(expression, "expression is empty"));
        }

        let segments = expression
            .split('/')
            .enumerate()
            .map(|(position, segment)| match segment {
                "" => Err(Error::expression(
                    expression,
                    format!("segment {} is empty", position + 1),
                )),
                WILDCARD => Ok(Segment::Wildcard),
                key => Ok(Segment::Key(PathKey::from_segment(key))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source: expression.to_string(),
            segments,
        })
    }

    /// The expression as configured
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Extract one raw value per field delta.
    ///
    /// A missing location yields no values. A list found at the end of the
    /// path is returned as the delta list itself.
    pub fn evaluate(&self, document: &Value) -> Vec<Value> {
        resolve(Some(document), &self.segments)
    }

    /// Write per-delta values into `document`, substituting the delta index
    /// for every `*`
    pub fn inject(
        &self,
        document: Value,
        values: &[Value],
        cardinality: Cardinality,
    ) -> Result<Value> {
        inject_segments(document, &self.segments, values, cardinality)
    }
}

fn resolve(node: Option<&Value>, segments: &[Segment]) -> Vec<Value> {
    match segments.split_first() {
        None => match node {
            None => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(value) => vec![value.clone()],
        },
        Some((Segment::Key(key), rest)) => {
            resolve(node.and_then(|value| document::child(value, key)), rest)
        }
        Some((Segment::Wildcard, rest)) => {
            let items: Vec<&Value> = match node {
                None => Vec::new(),
                Some(Value::Array(items)) => items.iter().collect(),
                Some(value) => vec![value],
            };
            // one delta per item, even when the item lacks the remaining path
            items
                .into_iter()
                .map(|item| {
                    resolve(Some(item), rest)
                        .into_iter()
                        .next()
                        .unwrap_or(Value::Null)
                })
                .collect()
        }
    }
}
