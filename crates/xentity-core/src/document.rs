//! Raw data document access
//!
//! Raw data documents are schema-less JSON values as delivered by a storage
//! client. Both expression dialects resolve to a list of [`PathKey`]s and use
//! the helpers here to read from and write into documents.

use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};

/// A raw data document for one record
pub type RawDocument = Value;

/// One step of a concrete path into a raw data document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    /// Object member
    Key(String),
    /// List position (also matches an object member named by the number)
    Index(usize),
}

impl PathKey {
    /// Interpret a path segment.
    ///
    /// Only canonical decimals (`0`, `12`, not `007` or `+1`) address list
    /// positions, so the segment text survives when it names an object member.
    pub fn from_segment(segment: &str) -> Self {
        let canonical = segment.bytes().all(|b| b.is_ascii_digit())
            && (segment == "0" || !segment.starts_with('0'));
        match segment.parse::<usize>() {
            Ok(index) if canonical => PathKey::Index(index),
            _ => PathKey::Key(segment.to_string()),
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Key(key) => f.write_str(key),
            PathKey::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Slash-joined rendering of a path, used in log and error messages
pub fn display_path(path: &[PathKey]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

/// Read one step below `value`
pub fn child<'a>(value: &'a Value, key: &PathKey) -> Option<&'a Value> {
    match (value, key) {
        (Value::Object(map), PathKey::Key(key)) => map.get(key),
        (Value::Object(map), PathKey::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), PathKey::Index(index)) => items.get(*index),
        _ => None,
    }
}

/// Read the value at `path`; `None` when any step is missing
pub fn get_path<'a>(document: &'a Value, path: &[PathKey]) -> Option<&'a Value> {
    path.iter()
        .try_fold(document, |current, key| child(current, key))
}

/// Write `value` at `path`, creating intermediate objects and lists.
///
/// A missing container addressed by index `0` becomes a list; lists only grow
/// by appending at their end. Any other index into a missing container
/// creates an object member named by the number. Writing past the end of an
/// existing list, descending through a scalar, addressing a list by name or
/// swapping a container for a scalar is an injection conflict.
pub fn set_path(document: &mut Value, path: &[PathKey], value: Value) -> Result<()> {
    let mut current = document;
    for (depth, key) in path.iter().enumerate() {
        current = child_mut(current, key, &path[..=depth])?;
    }

    if !current.is_null() && is_container(current) != is_container(&value) {
        return Err(Error::InjectionConflict {
            path: display_path(path),
            message: format!(
                "cannot replace {} with {}",
                describe(current),
                describe(&value)
            ),
        });
    }

    *current = value;
    Ok(())
}

fn child_mut<'a>(value: &'a mut Value, key: &PathKey, seen: &[PathKey]) -> Result<&'a mut Value> {
    if value.is_null() {
        *value = match key {
            PathKey::Index(0) => Value::Array(Vec::new()),
            _ => Value::Object(Map::new()),
        };
    }

    match (value, key) {
        (Value::Object(map), PathKey::Key(key)) => Ok(map.entry(key.clone()).or_insert(Value::Null)),
        (Value::Object(map), PathKey::Index(index)) => {
            Ok(map.entry(index.to_string()).or_insert(Value::Null))
        }
        (Value::Array(items), PathKey::Index(index)) => {
            let len = items.len();
            if *index == len {
                items.push(Value::Null);
            }
            items.get_mut(*index).ok_or_else(|| Error::InjectionConflict {
                path: display_path(seen),
                message: format!("position {index} is past the end of a list of {len}"),
            })
        }
        (Value::Array(_), PathKey::Key(key)) => Err(Error::InjectionConflict {
            path: display_path(seen),
            message: format!("a list already exists where member '{key}' is written"),
        }),
        (existing, _) => Err(Error::InjectionConflict {
            path: display_path(seen),
            message: format!("cannot descend into {}", describe(existing)),
        }),
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Render a scalar raw value as a record identifier
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether a value counts as empty for reference suppression
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(path: &str) -> Vec<PathKey> {
        path.split('/').map(PathKey::from_segment).collect()
    }

    #[test]
    fn test_get_nested_value() {
        let doc = json!({"a": {"b": [10, {"c": "x"}]}});
        assert_eq!(get_path(&doc, &keys("a/b/0")), Some(&json!(10)));
        assert_eq!(get_path(&doc, &keys("a/b/1/c")), Some(&json!("x")));
        assert_eq!(get_path(&doc, &keys("a/missing")), None);
        assert_eq!(get_path(&doc, &keys("a/b/5")), None);
    }

    #[test]
    fn test_numeric_key_on_object() {
        let doc = json!({"0": "zero"});
        assert_eq!(get_path(&doc, &keys("0")), Some(&json!("zero")));
    }

    #[test]
    fn test_set_builds_structure() {
        let mut doc = json!({});
        set_path(&mut doc, &keys("refs/0/id"), json!("a")).unwrap();
        set_path(&mut doc, &keys("refs/1/id"), json!("b")).unwrap();
        set_path(&mut doc, &keys("meta/title"), json!("T")).unwrap();
        assert_eq!(
            doc,
            json!({"refs": [{"id": "a"}, {"id": "b"}], "meta": {"title": "T"}})
        );
    }

    #[test]
    fn test_numeric_segment_into_missing_container_is_member() {
        let mut doc = json!({});
        set_path(&mut doc, &keys("ratings/2023/score"), json!(5)).unwrap();
        assert_eq!(doc, json!({"ratings": {"2023": {"score": 5}}}));
    }

    #[test]
    fn test_large_numeric_segment_does_not_pad() {
        let mut doc = json!({});
        set_path(&mut doc, &keys("ids/3000000000"), json!("x")).unwrap();
        assert_eq!(doc, json!({"ids": {"3000000000": "x"}}));
    }

    #[test]
    fn test_write_past_end_of_list_conflicts() {
        let mut doc = json!({"refs": [{"id": "a"}]});
        let err = set_path(&mut doc, &keys("refs/3/id"), json!("d")).unwrap_err();
        assert!(matches!(err, Error::InjectionConflict { ref path, .. } if path == "refs/3"));
        assert_eq!(doc, json!({"refs": [{"id": "a"}]}));
    }

    #[test]
    fn test_leading_zero_segment_keeps_text() {
        assert_eq!(PathKey::from_segment("007"), PathKey::Key("007".into()));
        assert_eq!(PathKey::from_segment("+1"), PathKey::Key("+1".into()));
        assert_eq!(PathKey::from_segment("0"), PathKey::Index(0));
        assert_eq!(PathKey::from_segment("10"), PathKey::Index(10));

        let doc = json!({"codes": {"007": "bond", "7": "other"}});
        assert_eq!(get_path(&doc, &keys("codes/007")), Some(&json!("bond")));

        let mut doc = json!({});
        set_path(&mut doc, &keys("codes/007"), json!("bond")).unwrap();
        assert_eq!(doc, json!({"codes": {"007": "bond"}}));
    }

    #[test]
    fn test_set_overwrites_scalar() {
        let mut doc = json!({"title": "old"});
        set_path(&mut doc, &keys("title"), json!("new")).unwrap();
        assert_eq!(doc["title"], "new");
    }

    #[test]
    fn test_set_scalar_over_list_conflicts() {
        let mut doc = json!({"tags": ["a"]});
        let err = set_path(&mut doc, &keys("tags"), json!("b")).unwrap_err();
        assert!(matches!(err, Error::InjectionConflict { ref path, .. } if path == "tags"));
    }

    #[test]
    fn test_descend_into_scalar_conflicts() {
        let mut doc = json!({"title": "T"});
        let err = set_path(&mut doc, &keys("title/value"), json!("x")).unwrap_err();
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_named_member_of_list_conflicts() {
        let mut doc = json!({"tags": []});
        assert!(set_path(&mut doc, &keys("tags/name"), json!("x")).is_err());
    }

    #[test]
    fn test_empty_values() {
        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&json!("")));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!("x")));
    }
}
