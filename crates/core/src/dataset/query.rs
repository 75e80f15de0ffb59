//! Read-only projections over a [`Dataset`]: schema, table, chart points
//! and filters.

use serde::Serialize;
use serde_json::{Map, Value};

use super::{Dataset, Row};
use crate::error::CoreError;
use crate::frame::FrameConfig;

/// Inferred column type, named the way the frontend expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DType {
    Float64,
    Int64,
    Boolean,
    String,
    Null,
}

impl DType {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Float64 | Self::Int64)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub dtype: DType,
    pub is_numeric: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSchema {
    pub columns: Vec<ColumnInfo>,
    pub first_column: String,
    pub second_column: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub data: Vec<Row>,
    pub columns: Vec<String>,
    pub total_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartPoint {
    pub x: Value,
    pub y: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
}

/// Filter condition for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    Range { min: Option<f64>, max: Option<f64> },
}

impl Condition {
    /// Interpret a raw filter value: objects are `{min, max}` ranges,
    /// anything else is an equality match.
    pub fn from_value(column: &str, value: Value) -> Result<Self, CoreError> {
        let Value::Object(bounds) = value else {
            return Ok(Self::Equals(value));
        };
        let bound = |key: &str| -> Result<Option<f64>, CoreError> {
            match bounds.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                    CoreError::Validation(format!("Filter '{column}': {key} must be a number"))
                }),
            }
        };
        Ok(Self::Range {
            min: bound("min")?,
            max: bound("max")?,
        })
    }

    fn matches(&self, cell: Option<&Value>) -> bool {
        match self {
            Self::Equals(expected) => cell.is_some_and(|v| values_equal(v, expected)),
            Self::Range { min, max } => {
                let Some(n) = cell.and_then(Value::as_f64) else {
                    return false;
                };
                min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn infer_dtype(value: Option<&Value>) -> DType {
    match value {
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => DType::Int64,
        Some(Value::Number(_)) => DType::Float64,
        Some(Value::Bool(_)) => DType::Boolean,
        Some(Value::String(_)) | Some(Value::Array(_)) | Some(Value::Object(_)) => DType::String,
        Some(Value::Null) | None => DType::Null,
    }
}

/// Column schema inferred from the first row that has a non-null value for
/// each column.
pub fn column_schema(dataset: &Dataset) -> ColumnSchema {
    let columns: Vec<ColumnInfo> = dataset
        .columns()
        .iter()
        .map(|name| {
            let sample = dataset
                .rows()
                .iter()
                .filter_map(|row| row.get(name))
                .find(|v| !v.is_null());
            let dtype = infer_dtype(sample);
            ColumnInfo {
                name: name.clone(),
                dtype,
                is_numeric: dtype.is_numeric(),
            }
        })
        .collect();

    let names = dataset.columns();
    let first_column = names.first().cloned().unwrap_or_else(|| "x".to_string());
    let second_column = names
        .get(1)
        .or(names.first())
        .cloned()
        .unwrap_or_else(|| "y".to_string());

    ColumnSchema {
        columns,
        first_column,
        second_column,
    }
}

/// All rows, or the first `limit` of them.
pub fn table(dataset: &Dataset, limit: Option<usize>) -> TableView {
    let take = limit.unwrap_or(usize::MAX);
    let data: Vec<Row> = dataset.rows().iter().take(take).cloned().collect();
    TableView {
        total_rows: data.len(),
        columns: dataset.columns().to_vec(),
        data,
    }
}

/// Project the dataset onto chart points for one configuration.
pub fn chart_points(dataset: &Dataset, config: &FrameConfig) -> Result<Vec<ChartPoint>, CoreError> {
    let missing: Vec<&str> = config
        .referenced_columns()
        .into_iter()
        .filter(|c| !dataset.has_column(c))
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::Validation(format!("Missing columns: {missing:?}")));
    }

    let cell = |row: &Row, column: &str| row.get(column).cloned().unwrap_or(Value::Null);
    let optional = |row: &Row, column: &Option<String>| column.as_deref().map(|c| cell(row, c));

    Ok(dataset
        .rows()
        .iter()
        .map(|row| ChartPoint {
            x: cell(row, &config.x_column),
            y: cell(row, &config.y_column),
            category: optional(row, &config.category_column),
            size: optional(row, &config.size_column),
            color: optional(row, &config.color_column),
        })
        .collect())
}

/// Rows matching every filter. Unknown columns are rejected.
pub fn filter(dataset: &Dataset, filters: Map<String, Value>) -> Result<Vec<Row>, CoreError> {
    let conditions = filters
        .into_iter()
        .map(|(column, value)| {
            if !dataset.has_column(&column) {
                return Err(CoreError::Validation(format!("Unknown filter column '{column}'")));
            }
            let condition = Condition::from_value(&column, value)?;
            Ok((column, condition))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(dataset
        .rows()
        .iter()
        .filter(|row| conditions.iter().all(|(c, cond)| cond.matches(row.get(c))))
        .cloned()
        .collect())
}
