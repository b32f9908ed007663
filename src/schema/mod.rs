//! Declared column schema and the structural checks run against it

use crate::error::{NetsecError, Result};
use crate::utils::data_loader::column_names;
use crate::utils::read_yaml_file;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

/// Column schema as declared in `schema.yaml`
///
/// ```yaml
/// columns:
///   - having_IP_Address: int64
///   - URL_Length: int64
/// numerical_columns:
///   - having_IP_Address
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// One single-key map per declared column, in declaration order
    pub columns: Vec<BTreeMap<String, String>>,
    /// Informational list of numeric columns
    #[serde(default)]
    pub numerical_columns: Vec<String>,
}

impl Schema {
    /// Build a schema from `(name, dtype)` pairs.
    pub fn from_pairs<N, D>(pairs: impl IntoIterator<Item = (N, D)>) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        let columns = pairs
            .into_iter()
            .map(|(name, dtype)| {
                let mut entry = BTreeMap::new();
                entry.insert(name.into(), dtype.into());
                entry
            })
            .collect();
        Self {
            columns,
            numerical_columns: Vec::new(),
        }
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let schema: Self = read_yaml_file(path)
            .map_err(|e| NetsecError::SchemaError(format!("{}: {}", path.display(), e)))?;
        if schema.columns.is_empty() {
            return Err(NetsecError::SchemaError(format!(
                "{} declares no columns",
                path.display()
            )));
        }
        Ok(schema)
    }

    /// Number of declared column entries
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Declared column names, in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .flat_map(|entry| entry.keys().map(String::as_str))
            .collect()
    }
}

/// Structural gate over a loaded frame
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schema: Schema,
}

impl SchemaValidator {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// True iff the frame has exactly as many columns as the schema declares.
    pub fn validate_column_count(&self, df: &DataFrame) -> bool {
        let required = self.schema.len();
        info!(required, actual = df.width(), "Checking column count");
        df.width() == required
    }

    /// Declared columns absent from the frame, in declaration order
    pub fn missing_columns(&self, df: &DataFrame) -> Vec<String> {
        let present: HashSet<String> = column_names(df).into_iter().collect();
        self.schema
            .column_names()
            .into_iter()
            .filter(|name| !present.contains(*name))
            .map(str::to_string)
            .collect()
    }

    /// True iff every declared column is present; extra columns are tolerated.
    pub fn validate_column_names(&self, df: &DataFrame) -> bool {
        let missing = self.missing_columns(df);
        if missing.is_empty() {
            return true;
        }
        info!(?missing, "Missing columns");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{DataFrame, NamedFrom, Series};

    fn validator(names: &[&str]) -> SchemaValidator {
        SchemaValidator::new(Schema::from_pairs(names.iter().map(|n| (*n, "int64"))))
    }

    fn frame(names: &[&str]) -> DataFrame {
        let columns: Vec<Series> = names
            .iter()
            .map(|n| Series::new((*n).into(), &[1i64, 2, 3]))
            .collect();
        DataFrame::new(columns).unwrap()
    }

    #[test]
    fn test_column_count() {
        let v = validator(&["a", "b", "c", "d", "e"]);
        assert!(v.validate_column_count(&frame(&["a", "b", "c", "d", "e"])));
        assert!(!v.validate_column_count(&frame(&["a", "b", "c", "d"])));
        assert!(!v.validate_column_count(&frame(&["a", "b", "c", "d", "e", "f"])));
    }

    #[test]
    fn test_column_names() {
        let v = validator(&["a", "b", "c"]);
        assert!(!v.validate_column_names(&frame(&["a", "b", "d"])));
        assert_eq!(v.missing_columns(&frame(&["a", "b", "d"])), vec!["c".to_string()]);
        assert!(v.validate_column_names(&frame(&["a", "b", "c", "extra"])));
    }

    #[test]
    fn test_schema_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.yaml");
        std::fs::write(
            &path,
            "columns:\n  - a: int64\n  - b: float64\nnumerical_columns:\n  - a\n",
        )
        .unwrap();

        let schema = Schema::from_yaml_file(&path).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.column_names(), vec!["a", "b"]);
        assert_eq!(schema.numerical_columns, vec!["a".to_string()]);
    }

    #[test]
    fn test_schema_unreadable() {
        let err = Schema::from_yaml_file(Path::new("/missing/schema.yaml")).unwrap_err();
        assert!(matches!(err, NetsecError::SchemaError(_)));
    }
}
