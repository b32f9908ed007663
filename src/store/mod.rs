//! Document store access
//!
//! Ingestion only ever needs "fetch every document of one collection", so the
//! store is a narrow trait. `JsonFileStore` keeps one JSON file per
//! collection under `<root>/<database>/`; `MemoryStore` backs tests.

use crate::error::{NetsecError, Result};
use crate::utils::ensure_parent_dir;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One stored record, keys in insertion order
pub type Document = serde_json::Map<String, Value>;

/// Read access to a document database
pub trait DocumentStore: Send + Sync {
    /// Fetch all documents of `database.collection`
    fn fetch_all(&self, database: &str, collection: &str) -> Result<Vec<Document>>;
}

/// File-backed store.
///
/// A collection is read from `<root>/<database>/<collection>.json` (a JSON
/// array) or, failing that, `<root>/<database>/<collection>.jsonl` (one
/// document per line).
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, database: &str, collection: &str, ext: &str) -> PathBuf {
        self.root.join(database).join(format!("{}.{}", collection, ext))
    }

    /// Replace the contents of a collection with `documents` (JSON array form).
    pub fn insert_many(&self, database: &str, collection: &str, documents: &[Document]) -> Result<usize> {
        let path = self.collection_path(database, collection, "json");
        ensure_parent_dir(&path)?;
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(writer, documents)?;
        Ok(documents.len())
    }

    fn read_array(path: &Path) -> Result<Vec<Document>> {
        let reader = BufReader::new(File::open(path)?);
        let value: Value = serde_json::from_reader(reader)?;
        match value {
            Value::Array(items) => items.into_iter().map(into_document).collect(),
            other => Err(NetsecError::StoreError(format!(
                "{} must hold a JSON array, found {}",
                path.display(),
                json_type_name(&other)
            ))),
        }
    }

    fn read_lines(path: &Path) -> Result<Vec<Document>> {
        let reader = BufReader::new(File::open(path)?);
        let mut documents = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            documents.push(into_document(serde_json::from_str(&line)?)?);
        }
        Ok(documents)
    }
}

impl DocumentStore for JsonFileStore {
    fn fetch_all(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
        if !self.root.is_dir() {
            return Err(NetsecError::StoreError(format!(
                "store root {} is not reachable",
                self.root.display()
            )));
        }

        let array_path = self.collection_path(database, collection, "json");
        let lines_path = self.collection_path(database, collection, "jsonl");

        let documents = if array_path.is_file() {
            Self::read_array(&array_path)?
        } else if lines_path.is_file() {
            Self::read_lines(&lines_path)?
        } else {
            return Err(NetsecError::StoreError(format!(
                "collection {}.{} not found under {}",
                database,
                collection,
                self.root.display()
            )));
        };

        debug!(database, collection, count = documents.len(), "Fetched documents");
        Ok(documents)
    }
}

/// In-memory store keyed by (database, collection)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: HashMap<(String, String), Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_many(&mut self, database: &str, collection: &str, documents: Vec<Document>) {
        self.collections
            .entry((database.to_string(), collection.to_string()))
            .or_default()
            .extend(documents);
    }
}

impl DocumentStore for MemoryStore {
    fn fetch_all(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
        Ok(self
            .collections
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

fn into_document(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(NetsecError::StoreError(format!(
            "expected a document object, found {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        into_document(value).unwrap()
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let docs = vec![doc(json!({"b": 1, "a": "na"})), doc(json!({"b": 2, "a": 3}))];

        store.insert_many("db", "coll", &docs).unwrap();
        let fetched = store.fetch_all("db", "coll").unwrap();

        assert_eq!(fetched.len(), 2);
        let keys: Vec<&String> = fetched[0].keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_file_store_reads_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db/coll.jsonl");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"x\": 1}\n\n{\"x\": 2}\n").unwrap();

        let fetched = JsonFileStore::new(dir.path()).fetch_all("db", "coll").unwrap();
        assert_eq!(fetched.len(), 2);
    }

    #[test]
    fn test_unreachable_root() {
        let store = JsonFileStore::new("/definitely/not/here");
        let err = store.fetch_all("db", "coll").unwrap_err();
        assert!(matches!(err, NetsecError::StoreError(_)));
    }

    #[test]
    fn test_missing_collection() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonFileStore::new(dir.path()).fetch_all("db", "nope").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        store.insert_many("db", "coll", vec![doc(json!({"x": 1}))]);
        assert_eq!(store.fetch_all("db", "coll").unwrap().len(), 1);
        assert!(store.fetch_all("db", "other").unwrap().is_empty());
    }
}
