//! In-memory tabular datasets served to the chart frontend.
//!
//! A [`Dataset`] is an ordered column list plus JSON rows. The active
//! dataset lives behind a [`DataSource`] handle that is passed explicitly to
//! whoever needs it; uploads and sample loads replace its contents
//! wholesale.

pub mod csv_import;
pub mod query;
pub mod samples;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::CoreError;

/// One dataset row keyed by column name.
pub type Row = Map<String, Value>;

/// Shared handle to the dataset currently being visualised.
#[derive(Clone)]
pub struct DataSource {
    inner: Arc<RwLock<Dataset>>,
}

impl DataSource {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            inner: Arc::new(RwLock::new(dataset)),
        }
    }

    /// Run `f` against the current dataset under a read lock.
    pub async fn read<T>(&self, f: impl FnOnce(&Dataset) -> T) -> T {
        let guard = self.inner.read().await;
        f(&guard)
    }

    /// Replace the current dataset, returning `(rows, columns)` of the new one.
    pub async fn replace(&self, dataset: Dataset) -> (usize, usize) {
        let shape = (dataset.len(), dataset.columns().len());
        *self.inner.write().await = dataset;
        shape
    }
}

/// Ordered columns plus rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset from rows, taking column order from first appearance.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    /// Parse an uploaded CSV file, decoding it as UTF-8 or Latin-1.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        csv_import::parse_csv(&csv_import::decode_text(bytes))
    }

    /// Parse an uploaded JSON array of objects.
    pub fn from_json_records(records: Vec<Value>) -> Result<Self, CoreError> {
        let rows = records
            .into_iter()
            .enumerate()
            .map(|(i, value)| match value {
                Value::Object(map) => Ok(map),
                other => Err(CoreError::Validation(format!(
                    "Row {i} must be a JSON object, got {}",
                    json_type_name(&other)
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_rows(rows))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn column_order_follows_first_appearance() {
        let ds = Dataset::from_json_records(vec![
            json!({"b": 1, "a": 2}),
            json!({"c": 3}),
        ])
        .unwrap();
        assert_eq!(ds.columns(), ["b", "a", "c"].map(String::from).as_slice());
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn non_object_rows_rejected() {
        let err = Dataset::from_json_records(vec![json!({"a": 1}), json!([1, 2])]);
        assert_matches!(err, Err(CoreError::Validation(msg)) if msg.contains("Row 1"));
    }

    #[tokio::test]
    async fn replace_swaps_contents() {
        let source = DataSource::new(Dataset::default());
        let shape = source
            .replace(Dataset::from_json_records(vec![json!({"x": 1, "y": 2})]).unwrap())
            .await;
        assert_eq!(shape, (1, 2));
        assert!(source.read(|ds| ds.has_column("y")).await);
    }
}
