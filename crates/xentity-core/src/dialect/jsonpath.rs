//! JSONPath dialect
//!
//! Extraction delegates to `jsonpath_lib`: the match set of the query is the
//! delta list. A definite path (no wildcard) that matches a single list
//! yields the list items as deltas, mirroring the simple dialect.
//!
//! Injection supports normalized paths only: `$`, `.key`, `['key']`,
//! `["key"]`, `[n]`, `[*]` and `.*`. Filters, slices, unions and recursive
//! descent can be read but not written.

use serde_json::Value;

use super::{Segment, has_wildcard, inject_segments};
use crate::document::PathKey;
use crate::error::{Error, Result};
use crate::schema::Cardinality;

/// A validated JSONPath expression
#[derive(Debug, Clone)]
pub struct JsonPathExpression {
    source: String,
    writable: Option<Vec<Segment>>,
}

impl JsonPathExpression {
    /// Validate an expression against the JSONPath engine
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(Error::expression(expression, "expression is empty"));
        }

        jsonpath_lib::select(&Value::Object(Default::default()), expression)
            .map_err(|e| Error::expression(expression, e.to_string()))?;

        Ok(Self {
            source: expression.to_string(),
            writable: parse_writable(expression),
        })
    }

    /// The expression as configured
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether values can be injected at this expression
    pub fn is_writable(&self) -> bool {
        self.writable.is_some()
    }

    fn is_definite(&self) -> bool {
        self.writable
            .as_deref()
            .is_some_and(|segments| !has_wildcard(segments))
    }

    /// Extract one raw value per field delta
    pub fn evaluate(&self, document: &Value) -> Vec<Value> {
        let matches = match jsonpath_lib::select(document, &self.source) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(expression = %self.source, error = %e, "JSONPath evaluation failed");
                return Vec::new();
            }
        };

        if self.is_definite()
            && let [Value::Array(items)] = matches.as_slice()
        {
            return items.clone();
        }
        matches.into_iter().cloned().collect()
    }

    /// Write per-delta values into `document`
    pub fn inject(
        &self,
        document: Value,
        values: &[Value],
        cardinality: Cardinality,
    ) -> Result<Value> {
        let segments = self.writable.as_deref().ok_or_else(|| {
            Error::expression(&self.source, "only normalized paths can be written")
        })?;
        inject_segments(document, segments, values, cardinality)
    }
}

/// Parse the normalized-path subset of JSONPath into segments
fn parse_writable(expression: &str) -> Option<Vec<Segment>> {
    let mut rest = expression.strip_prefix('$')?;
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if let Some(after_dot) = rest.strip_prefix('.') {
            if after_dot.starts_with('.') {
                return None;
            }
            if let Some(after_star) = after_dot.strip_prefix('*') {
                segments.push(Segment::Wildcard);
                rest = after_star;
                continue;
            }
            let end = after_dot.find(['.', '[']).unwrap_or(after_dot.len());
            let name = &after_dot[..end];
            if name.is_empty() {
                return None;
            }
            segments.push(Segment::Key(PathKey::Key(name.to_string())));
            rest = &after_dot[end..];
        } else if let Some(after_bracket) = rest.strip_prefix('[') {
            let (segment, remainder) = parse_bracket(after_bracket)?;
            segments.push(segment);
            rest = remainder;
        } else {
            return None;
        }
    }

    Some(segments)
}

fn parse_bracket(input: &str) -> Option<(Segment, &str)> {
    if let Some(quote) = input.chars().next().filter(|c| *c == '\'' || *c == '"') {
        let body = &input[1..];
        let close = body.find(quote)?;
        let remainder = body[close + 1..].strip_prefix(']')?;
        return Some((
            Segment::Key(PathKey::Key(body[..close].to_string())),
            remainder,
        ));
    }

    let close = input.find(']')?;
    let inner = input[..close].trim();
    let remainder = &input[close + 1..];
    if inner == "*" {
        return Some((Segment::Wildcard, remainder));
    }
    if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
        return Some((Segment::Key(PathKey::Index(inner.parse().ok()?)), remainder));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "uuid": "u1",
            "tags": ["a", "b"],
            "authors": [{"name": "Ann", "age": 40}, {"name": "Bo", "age": 20}],
        })
    }

    #[rstest]
    #[case("$.uuid", json!(["u1"]))]
    #[case("$.tags", json!(["a", "b"]))]
    #[case("$.tags[*]", json!(["a", "b"]))]
    #[case("$.authors[*].name", json!(["Ann", "Bo"]))]
    #[case("$..name", json!(["Ann", "Bo"]))]
    #[case("$.authors[?(@.age > 30)].name", json!(["Ann"]))]
    #[case("$.missing", json!([]))]
    fn test_evaluate(#[case] expression: &str, #[case] expected: Value) {
        let path = JsonPathExpression::parse(expression).unwrap();
        assert_eq!(Value::Array(path.evaluate(&doc())), expected);
    }

    #[test]
    fn test_rejects_invalid_expression() {
        assert!(JsonPathExpression::parse("$.authors[?(@.age >").is_err());
        assert!(JsonPathExpression::parse("  ").is_err());
    }

    #[rstest]
    #[case("$.a.b", Some(vec![
        Segment::Key(PathKey::Key("a".into())),
        Segment::Key(PathKey::Key("b".into())),
    ]))]
    #[case("$['a b'][2]", Some(vec![
        Segment::Key(PathKey::Key("a b".into())),
        Segment::Key(PathKey::Index(2)),
    ]))]
    #[case("$.a[*].b", Some(vec![
        Segment::Key(PathKey::Key("a".into())),
        Segment::Wildcard,
        Segment::Key(PathKey::Key("b".into())),
    ]))]
    #[case("$.a.*", Some(vec![Segment::Key(PathKey::Key("a".into())), Segment::Wildcard]))]
    #[case("$..a", None)]
    #[case("$.a[0:2]", None)]
    #[case("$.a[?(@.x)]", None)]
    #[case("a.b", None)]
    fn test_parse_writable(#[case] expression: &str, #[case] expected: Option<Vec<Segment>>) {
        assert_eq!(parse_writable(expression), expected);
    }

    #[test]
    fn test_inject_wildcard() {
        let path = JsonPathExpression::parse("$.authors[*].name").unwrap();
        let out = path
            .inject(json!({}), &[json!("Ann"), json!("Bo")], Cardinality::Unlimited)
            .unwrap();
        assert_eq!(out, json!({"authors": [{"name": "Ann"}, {"name": "Bo"}]}));
    }

    #[test]
    fn test_inject_definite_multi_value() {
        let path = JsonPathExpression::parse("$.tags").unwrap();
        let out = path
            .inject(json!({"uuid": "u1"}), &[json!("a"), json!("b")], Cardinality::Unlimited)
            .unwrap();
        assert_eq!(out, json!({"uuid": "u1", "tags": ["a", "b"]}));
        assert_eq!(path.evaluate(&out), vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_inject_non_writable_fails() {
        let path = JsonPathExpression::parse("$..name").unwrap();
        assert!(!path.is_writable());
        let err = path
            .inject(json!({}), &[json!("x")], Cardinality::Limited(1))
            .unwrap_err();
        assert!(err.to_string().contains("normalized"));
    }
}
