//! Raw data stores
//!
//! A store is the storage client behind an external entity type: it loads,
//! queries, saves and deletes raw data documents. Network and database
//! clients live outside this crate; the file store is used for local
//! development and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::document::{self, PathKey, RawDocument};
use crate::error::{Error, Result};

/// Storage client capability interface
#[async_trait]
pub trait RawDataStore: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Load the documents with the given identifiers; unknown ones are skipped
    async fn load_multiple(&self, ids: &[String]) -> Result<Vec<RawDocument>>;

    /// Load one document
    async fn load(&self, id: &str) -> Result<Option<RawDocument>> {
        Ok(self.load_multiple(&[id.to_string()]).await?.into_iter().next())
    }

    /// Documents matching a query
    async fn query(&self, query: &Query) -> Result<Vec<RawDocument>>;

    /// Number of documents matching the filters
    async fn count_query(&self, filters: &[Filter]) -> Result<usize>;

    /// Insert or replace a document, returning its identifier
    async fn save(&self, document: RawDocument) -> Result<String>;

    /// Delete a document
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Filter operator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Equal
    #[default]
    Eq,
    /// Not equal
    NotEq,
    /// Substring of a string, or member of a list
    Contains,
}

/// Condition on a raw data location (slash-delimited path)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    /// Raw data path, e.g. `meta/status`
    pub field: String,
    /// Comparison
    #[serde(default)]
    pub operator: Operator,
    /// Operand
    pub value: Value,
}

impl Filter {
    /// Equality filter
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: Operator::Eq,
            value: value.into(),
        }
    }

    /// Whether a document satisfies the filter
    pub fn matches(&self, document: &Value) -> bool {
        let found = document::get_path(document, &path_keys(&self.field));
        match self.operator {
            Operator::Eq => found.is_some_and(|v| loosely_equal(v, &self.value)),
            Operator::NotEq => !found.is_some_and(|v| loosely_equal(v, &self.value)),
            Operator::Contains => match (found, &self.value) {
                (Some(Value::String(haystack)), Value::String(needle)) => {
                    haystack.contains(needle.as_str())
                }
                (Some(Value::Array(items)), needle) => {
                    items.iter().any(|item| loosely_equal(item, needle))
                }
                _ => false,
            },
        }
    }
}

/// Sort key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sort {
    /// Raw data path
    pub field: String,
    /// Descending order
    #[serde(default)]
    pub descending: bool,
}

/// Query over raw data documents
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Query {
    /// All filters must match
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Sort keys, most significant first
    #[serde(default)]
    pub sort: Vec<Sort>,
    /// Number of matches to skip
    #[serde(default)]
    pub offset: usize,
    /// Maximum number of documents returned
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Query {
    /// Match everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a sort key
    pub fn sort_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort.push(Sort {
            field: field.into(),
            descending,
        });
        self
    }

    /// Restrict to a page
    pub fn range(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Apply the query to an in-memory record set
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a Value>) -> Vec<Value> {
        let mut matched: Vec<&Value> = records
            .into_iter()
            .filter(|record| self.filters.iter().all(|f| f.matches(record)))
            .collect();

        if !self.sort.is_empty() {
            let keys: Vec<(Vec<PathKey>, bool)> = self
                .sort
                .iter()
                .map(|s| (path_keys(&s.field), s.descending))
                .collect();
            matched.sort_by(|a, b| {
                keys.iter()
                    .map(|(path, descending)| {
                        let ordering = compare_values(
                            document::get_path(a, path),
                            document::get_path(b, path),
                        );
                        if *descending { ordering.reverse() } else { ordering }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        matched
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

fn path_keys(path: &str) -> Vec<PathKey> {
    path.split('/').map(PathKey::from_segment).collect()
}

/// Equality that treats `7` and `"7"` as the same identifier
fn loosely_equal(a: &Value, b: &Value) -> bool {
    a == b
        || match (document::value_to_id(a), document::value_to_id(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
}

/// Missing values sort first, numbers numerically, everything else as text
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

/// Storage configuration from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Local JSON or JSON Lines file
    File(FileStorageConfig),
}

impl StorageConfig {
    /// Open the configured store; relative paths resolve against `base_path`
    pub async fn build(&self, base_path: &Path) -> Result<Box<dyn RawDataStore>> {
        match self {
            StorageConfig::File(config) => {
                let store = JsonFileStore::open(config, base_path).await?;
                Ok(Box::new(store))
            }
        }
    }
}

/// File storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStorageConfig {
    /// File path
    pub path: String,

    /// `json` (one array) or `jsonl`; inferred from the extension when absent
    #[serde(default)]
    pub format: Option<FileFormat>,

    /// Top-level member holding the record identifier
    #[serde(default = "default_id_key")]
    pub id_key: String,
}

fn default_id_key() -> String {
    "id".to_string()
}

/// On-disk layout of a file store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// A single JSON array
    Json,
    /// One JSON object per line
    Jsonl,
}

impl FileFormat {
    fn infer(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("jsonl") | Some("ndjson") => FileFormat::Jsonl,
            _ => FileFormat::Json,
        }
    }
}

/// Store keeping all documents of one file in memory and rewriting the file
/// on every change
pub struct JsonFileStore {
    name: String,
    path: PathBuf,
    format: FileFormat,
    id_key: String,
    records: RwLock<Vec<RawDocument>>,
}

impl JsonFileStore {
    /// Open a store; a missing file is an empty store
    pub async fn open(config: &FileStorageConfig, base_path: &Path) -> Result<Self> {
        let path = base_path.join(&config.path);
        let format = config.format.unwrap_or_else(|| FileFormat::infer(&path));
        let name = format!("file:{}", config.path);

        let records = if tokio::fs::try_exists(&path).await? {
            let contents = tokio::fs::read_to_string(&path).await?;
            parse_records(&contents, format).map_err(|message| Error::StorageError {
                storage: name.clone(),
                message,
            })?
        } else {
            Vec::new()
        };

        tracing::debug!(storage = %name, records = records.len(), "opened file store");
        Ok(Self {
            name,
            path,
            format,
            id_key: config.id_key.clone(),
            records: RwLock::new(records),
        })
    }

    fn record_id(&self, record: &Value) -> Option<String> {
        record.get(&self.id_key).and_then(document::value_to_id)
    }

    async fn persist(&self, records: &[RawDocument]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = match self.format {
            FileFormat::Json => serde_json::to_string_pretty(records)?,
            FileFormat::Jsonl => records
                .iter()
                .map(serde_json::to_string)
                .collect::<std::result::Result<Vec<_>, _>>()?
                .join("\n"),
        };
        tokio::fs::write(&self.path, contents + "\n").await?;
        Ok(())
    }
}

fn parse_records(contents: &str, format: FileFormat) -> std::result::Result<Vec<Value>, String> {
    match format {
        FileFormat::Json if contents.trim().is_empty() => Ok(Vec::new()),
        FileFormat::Json => match serde_json::from_str(contents) {
            Ok(Value::Array(records)) => Ok(records),
            Ok(_) => Err("expected a JSON array of records".to_string()),
            Err(e) => Err(e.to_string()),
        },
        FileFormat::Jsonl => contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| {
                serde_json::from_str(line).map_err(|e| format!("line {}: {e}", number + 1))
            })
            .collect(),
    }
}

#[async_trait]
impl RawDataStore for JsonFileStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_multiple(&self, ids: &[String]) -> Result<Vec<RawDocument>> {
        let records = self.records.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                records
                    .iter()
                    .find(|record| self.record_id(record).as_ref() == Some(id))
                    .cloned()
            })
            .collect())
    }

    async fn query(&self, query: &Query) -> Result<Vec<RawDocument>> {
        let records = self.records.read().await;
        Ok(query.apply(records.iter()))
    }

    async fn count_query(&self, filters: &[Filter]) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|record| filters.iter().all(|f| f.matches(record)))
            .count())
    }

    async fn save(&self, mut document: RawDocument) -> Result<String> {
        let id = match self.record_id(&document) {
            Some(id) => id,
            None => {
                let Some(object) = document.as_object_mut() else {
                    return Err(Error::StorageError {
                        storage: self.name.clone(),
                        message: "only objects can be saved".to_string(),
                    });
                };
                let id = uuid::Uuid::new_v4().to_string();
                object.insert(self.id_key.clone(), Value::String(id.clone()));
                id
            }
        };

        let mut records = self.records.write().await;
        match records
            .iter()
            .position(|record| self.record_id(record).as_deref() == Some(id.as_str()))
        {
            Some(position) => records[position] = document,
            None => records.push(document),
        }
        self.persist(&records).await?;

        tracing::debug!(storage = %self.name, %id, "saved record");
        Ok(id)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| self.record_id(record).as_deref() != Some(id));
        if records.len() == before {
            return Err(Error::RecordNotFound { id: id.to_string() });
        }
        self.persist(&records).await?;

        tracing::debug!(storage = %self.name, %id, "deleted record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn movies() -> Vec<Value> {
        vec![
            json!({"id": "m1", "title": "Alien", "year": 1979, "tags": ["scifi", "horror"]}),
            json!({"id": "m2", "title": "Heat", "year": 1995, "tags": ["crime"]}),
            json!({"id": 3, "title": "Arrival", "year": 2016, "meta": {"status": "new"}}),
        ]
    }

    async fn store_with(dir: &TempDir, file: &str, contents: &str) -> JsonFileStore {
        std::fs::write(dir.path().join(file), contents).unwrap();
        let config: FileStorageConfig =
            serde_yaml::from_str(&format!("path: {file}")).unwrap();
        JsonFileStore::open(&config, dir.path()).await.unwrap()
    }

    #[test]
    fn test_parse_file_storage_config() {
        let yaml = r#"
type: file
path: "./data/movies.jsonl"
id_key: uuid
"#;
        let config: StorageConfig = serde_yaml::from_str(yaml).unwrap();
        let StorageConfig::File(file) = config;
        assert_eq!(file.path, "./data/movies.jsonl");
        assert_eq!(file.id_key, "uuid");
        assert!(file.format.is_none());
    }

    #[test]
    fn test_format_inferred_from_extension() {
        assert_eq!(FileFormat::infer(Path::new("a.jsonl")), FileFormat::Jsonl);
        assert_eq!(FileFormat::infer(Path::new("a.json")), FileFormat::Json);
        assert_eq!(FileFormat::infer(Path::new("a")), FileFormat::Json);
    }

    #[test]
    fn test_query_filters_sort_and_range() {
        let records = movies();
        let query = Query::new().sort_by("year", true).range(1, Some(1));
        assert_eq!(query.apply(&records)[0]["title"], "Heat");

        let query = Query::new().filter(Filter {
            field: "tags".into(),
            operator: Operator::Contains,
            value: json!("crime"),
        });
        assert_eq!(query.apply(&records).len(), 1);

        let query = Query::new().filter(Filter::eq("meta/status", "new"));
        assert_eq!(query.apply(&records)[0]["id"], 3);

        let query = Query::new().filter(Filter {
            field: "title".into(),
            operator: Operator::NotEq,
            value: json!("Alien"),
        });
        assert_eq!(query.apply(&records).len(), 2);
    }

    #[test]
    fn test_numeric_id_matches_string() {
        assert!(Filter::eq("id", "3").matches(&json!({"id": 3})));
    }

    #[test]
    fn test_filter_on_zero_padded_key() {
        let record = json!({"codes": {"007": "bond", "7": "other"}});
        assert!(Filter::eq("codes/007", "bond").matches(&record));
        assert!(!Filter::eq("codes/007", "other").matches(&record));
    }

    #[tokio::test]
    async fn test_load_from_json_array() {
        let dir = TempDir::new().unwrap();
        let contents = serde_json::to_string(&movies()).unwrap();
        let store = store_with(&dir, "movies.json", &contents).await;

        let loaded = store
            .load_multiple(&["m2".into(), "missing".into(), "3".into()])
            .await
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0]["title"], "Heat");
        assert!(store.load("m1").await.unwrap().is_some());
        assert!(store.load("nope").await.unwrap().is_none());
        assert_eq!(store.count_query(&[]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_jsonl_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "m.jsonl", "{\"id\":\"a\"}\n\n{\"id\":\"b\"}\n").await;
        assert_eq!(store.query(&Query::new()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.jsonl"), "{\"id\":1}\nnot json\n").unwrap();
        let config = FileStorageConfig {
            path: "bad.jsonl".into(),
            format: None,
            id_key: "id".into(),
        };
        let result = JsonFileStore::open(&config, dir.path()).await;
        assert!(matches!(result, Err(Error::StorageError { ref message, .. }) if message.contains("line 2")));
    }

    #[tokio::test]
    async fn test_save_assigns_id_and_persists() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig::File(FileStorageConfig {
            path: "data/new.jsonl".into(),
            format: None,
            id_key: "id".into(),
        });
        let store = config.build(dir.path()).await.unwrap();

        let id = store.save(json!({"title": "Fresh"})).await.unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        store.save(json!({"id": "fixed", "title": "Other"})).await.unwrap();
        store.save(json!({"id": "fixed", "title": "Replaced"})).await.unwrap();

        let reopened = config.build(dir.path()).await.unwrap();
        assert_eq!(reopened.count_query(&[]).await.unwrap(), 2);
        let record = reopened.load("fixed").await.unwrap().unwrap();
        assert_eq!(record["title"], "Replaced");
    }

    #[tokio::test]
    async fn test_save_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, "m.json", "[]").await;
        assert!(store.save(json!(["x"])).await.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let contents = serde_json::to_string(&movies()).unwrap();
        let store = store_with(&dir, "movies.json", &contents).await;

        store.delete("m1").await.unwrap();
        assert!(matches!(
            store.delete("m1").await,
            Err(Error::RecordNotFound { .. })
        ));

        let on_disk: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("movies.json")).unwrap())
                .unwrap();
        assert_eq!(on_disk.len(), 2);
    }
}
