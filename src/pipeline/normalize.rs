//! Normalization: heterogeneous JSON records → one rectangular table.
//!
//! Real model output is ragged. One record carries a "Remark" key, the
//! next does not; the third spells a value as a number instead of a
//! string. The normalizer absorbs that:
//!
//! - the column set is the **union** of all keys, in first-seen order
//!   (record order, then key order within each record, which
//!   `serde_json`'s `preserve_order` feature keeps faithful to the text)
//! - a record missing a column contributes an empty string for it
//! - scalar values are rendered literally: numbers and booleans via their
//!   JSON text, null as empty. No locale, no date parsing, no trimming —
//!   what the model transcribed is what lands in the sheet
//!
//! Nested values (an array or object inside a record) are refused rather
//! than flattened: they mean the model ignored the schema, and silently
//! stringifying them would bury that signal in a spreadsheet cell.

use crate::error::Scan2SheetError;
use serde::Serialize;
use serde_json::Value;

/// A rectangular table ready to be projected onto a worksheet.
///
/// Invariant: every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedTable {
    /// Column labels, in first-seen order across all records.
    pub columns: Vec<String>,
    /// Data rows, aligned to `columns`.
    pub rows: Vec<Vec<String>>,
}

impl NormalizedTable {
    /// An empty table (zero records extracted).
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}

/// Parse the isolated JSON text and align its records into a table.
pub fn normalize(json_text: &str) -> Result<NormalizedTable, Scan2SheetError> {
    let value: Value =
        serde_json::from_str(json_text).map_err(|e| Scan2SheetError::MalformedRecords {
            detail: format!("invalid JSON: {e}"),
        })?;

    let Value::Array(records) = value else {
        return Err(Scan2SheetError::MalformedRecords {
            detail: format!("expected a JSON array, got {}", kind(&value)),
        });
    };

    // First pass: column union in first-seen order.
    let mut columns: Vec<String> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let Value::Object(map) = record else {
            return Err(Scan2SheetError::MalformedRecords {
                detail: format!("record {i} is {}, expected an object", kind(record)),
            });
        };
        for key in map.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    // Second pass: align every record to the full column set.
    let mut rows = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let Value::Object(map) = record else {
            unreachable!("checked in first pass");
        };
        let mut row = Vec::with_capacity(columns.len());
        for col in &columns {
            let cell = match map.get(col) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                Some(nested @ (Value::Array(_) | Value::Object(_))) => {
                    return Err(Scan2SheetError::MalformedRecords {
                        detail: format!(
                            "record {i}, field '{col}' is a nested {}, expected a scalar",
                            kind(nested)
                        ),
                    });
                }
            };
            row.push(cell);
        }
        rows.push(row);
    }

    Ok(NormalizedTable { columns, rows })
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
