//! CSV import for uploaded files.
//!
//! The first record is the header row. Cells are typed per column: a column
//! whose non-empty cells all parse as integers holds integers, then floats,
//! then booleans; anything else stays text. Empty cells become `null`.

use serde_json::{Number, Value};

use super::{Dataset, Row};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Bool,
    Text,
}

/// Decode uploaded bytes as UTF-8, falling back to Latin-1.
///
/// Latin-1 maps every byte to a char, so this never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => bytes.iter().copied().map(char::from).collect(),
    }
}

/// Parse a CSV document with a header row.
pub fn parse_csv(text: &str) -> Result<Dataset, CoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(parse_error)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(CoreError::Validation("CSV file has no header row".into()));
    }
    for (i, name) in headers.iter().enumerate() {
        if name.is_empty() {
            return Err(CoreError::Validation(format!(
                "Error parsing CSV file: column {i} has an empty name"
            )));
        }
        if headers[..i].contains(name) {
            return Err(CoreError::Validation(format!(
                "Error parsing CSV file: duplicate column '{name}'"
            )));
        }
    }

    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(parse_error)?;
    if records.is_empty() {
        return Err(CoreError::Validation("CSV file contains no data".into()));
    }

    let kinds: Vec<CellKind> = (0..headers.len())
        .map(|col| column_kind(records.iter().map(|r| r.get(col).unwrap_or(""))))
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .zip(&kinds)
                .enumerate()
                .map(|(col, (name, kind))| {
                    (name.clone(), typed_cell(record.get(col).unwrap_or(""), *kind))
                })
                .collect::<Row>()
        })
        .collect();

    Ok(Dataset::from_rows(rows))
}

fn parse_error(e: csv::Error) -> CoreError {
    CoreError::Validation(format!("Error parsing CSV file: {e}"))
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn cell_kind(cell: &str) -> CellKind {
    if cell.parse::<i64>().is_ok() {
        CellKind::Int
    } else if cell.parse::<f64>().is_ok_and(f64::is_finite) {
        CellKind::Float
    } else if parse_bool(cell).is_some() {
        CellKind::Bool
    } else {
        CellKind::Text
    }
}

fn column_kind<'a>(cells: impl Iterator<Item = &'a str>) -> CellKind {
    let mut kind = None;
    for cell in cells.map(str::trim).filter(|c| !c.is_empty()) {
        kind = Some(match (kind, cell_kind(cell)) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(CellKind::Int), CellKind::Float) | (Some(CellKind::Float), CellKind::Int) => {
                CellKind::Float
            }
            _ => CellKind::Text,
        });
    }
    kind.unwrap_or(CellKind::Text)
}

fn typed_cell(cell: &str, kind: CellKind) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match kind {
        CellKind::Int => trimmed.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
        CellKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        CellKind::Bool => parse_bool(trimmed).map_or(Value::Null, Value::Bool),
        CellKind::Text => Value::String(cell.to_string()),
    }
}
