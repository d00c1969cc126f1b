//! Ingest payload checks, run before any statement reaches the store so a bad
//! row rejects the whole call.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use sqlx::types::BigDecimal;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::ValueKind;

/// One declared column as the payload sees it
#[derive(Debug, Clone)]
pub struct PayloadColumn {
    pub field: String,
    pub key: String,
    pub kind: ValueKind,
}

/// Parse payload text into a JSON array
pub fn parse(payload: &str) -> EngineResult<Value> {
    serde_json::from_str(payload).map_err(|e| EngineError::malformed(format!("invalid JSON: {}", e)))
}

/// Check shape and types; returns the number of rows
pub fn validate(payload: &Value, columns: &[PayloadColumn], max_rows: usize) -> EngineResult<usize> {
    let rows = payload
        .as_array()
        .ok_or_else(|| EngineError::malformed("expected a JSON array of objects"))?;

    if rows.len() > max_rows {
        return Err(EngineError::malformed(format!(
            "{} rows exceed the limit of {}",
            rows.len(),
            max_rows
        )));
    }

    for (index, row) in rows.iter().enumerate() {
        let object = row
            .as_object()
            .ok_or_else(|| EngineError::malformed(format!("item {}: expected an object", index)))?;
        validate_row(index, object, columns)?;
    }

    Ok(rows.len())
}

fn validate_row(index: usize, row: &Map<String, Value>, columns: &[PayloadColumn]) -> EngineResult<()> {
    for column in columns {
        let value = row.get(&column.key).ok_or_else(|| {
            EngineError::malformed(format!(
                "item {}: missing key '{}' for field '{}'",
                index, column.key, column.field
            ))
        })?;

        if !accepts(column.kind, value) {
            return Err(EngineError::malformed(format!(
                "item {}: value {} for key '{}' is not a valid {:?}",
                index,
                value,
                column.key,
                column.kind
            )));
        }
    }
    Ok(())
}

/// Whether `value` can be cast to a column of `kind`. Null is always accepted.
pub fn accepts(kind: ValueKind, value: &Value) -> bool {
    match (kind, value) {
        (_, Value::Null) => true,
        (ValueKind::Integer, Value::Number(n)) => n.is_i64(),
        (ValueKind::Integer, Value::String(s)) => s.trim().parse::<i64>().is_ok(),
        (ValueKind::Decimal, Value::Number(_)) => true,
        (ValueKind::Decimal, Value::String(s)) => BigDecimal::from_str(s.trim()).is_ok(),
        (ValueKind::Text, Value::String(_) | Value::Number(_) | Value::Bool(_)) => true,
        (ValueKind::DateTime, Value::String(s)) => is_datetime(s),
        (ValueKind::Date, Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        (ValueKind::Boolean, Value::Bool(_)) => true,
        _ => false,
    }
}

/// Rewrite datetimes carrying a zone offset as UTC wall-clock time. The
/// TIMESTAMP cast drops offsets, so without this two different instants
/// would store, and match, as the same value.
pub fn normalize(payload: &mut Value, columns: &[PayloadColumn]) {
    let Some(rows) = payload.as_array_mut() else { return };
    let datetimes: Vec<&PayloadColumn> =
        columns.iter().filter(|c| c.kind == ValueKind::DateTime).collect();
    if datetimes.is_empty() {
        return;
    }

    for row in rows.iter_mut().filter_map(Value::as_object_mut) {
        for column in &datetimes {
            if let Some(Value::String(s)) = row.get_mut(&column.key) {
                if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
                    *s = instant.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string();
                }
            }
        }
    }
}

fn is_datetime(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}
