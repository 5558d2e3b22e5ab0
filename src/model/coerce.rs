//! Row coercion: the single place that interprets database driver types.
//!
//! Everything downstream of here works on [`Value`]s; encoders never see a
//! `PgRow`. The `value` column arrives as text because the projected SELECT
//! casts it (`value::text`), which is how Postgres itself renders the
//! canonical scale-4 decimal, trailing zeros included.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;

use super::{ColumnMapping, Value};
use crate::error_handling::ExportError;

/// Projects one raw row through the mapping, yielding one coerced value per
/// column in mapping order.
///
/// Sources were validated at request time, so an unknown name here means the
/// SELECT and the mapping went out of sync; that surfaces as `CursorFailed`.
pub fn coerce_row(row: &PgRow, mapping: &[ColumnMapping]) -> Result<Vec<Value>, ExportError> {
    let mut values = Vec::with_capacity(mapping.len());
    for column in mapping {
        values.push(coerce_value(row, &column.source)?);
    }
    Ok(values)
}

fn coerce_value(row: &PgRow, source: &str) -> Result<Value, ExportError> {
    let value = match source {
        "id" => match row.try_get::<Option<i64>, _>("id") {
            Ok(Some(n)) => Value::Int(n),
            Ok(None) => Value::Null,
            Err(e) => return Err(ExportError::CursorFailed(e)),
        },
        "created_at" => match row.try_get::<Option<DateTime<Utc>>, _>("created_at") {
            Ok(Some(ts)) => Value::Timestamp(ts),
            Ok(None) => Value::Null,
            Err(e) => return Err(ExportError::CursorFailed(e)),
        },
        "name" => match row.try_get::<Option<String>, _>("name") {
            Ok(Some(text)) => Value::Text(text),
            Ok(None) => Value::Null,
            Err(e) => return Err(ExportError::CursorFailed(e)),
        },
        "value" => match row.try_get::<Option<String>, _>("value") {
            Ok(Some(text)) => Value::Decimal(text),
            Ok(None) => Value::Null,
            Err(e) => return Err(ExportError::CursorFailed(e)),
        },
        "metadata" => match row.try_get::<Option<serde_json::Value>, _>("metadata") {
            Ok(Some(json)) => Value::from_json(&json),
            Ok(None) => Value::Null,
            Err(e) => return Err(ExportError::CursorFailed(e)),
        },
        other => {
            return Err(ExportError::EncoderFailed(format!(
                "unmapped column source {other:?}"
            )))
        }
    };
    Ok(value)
}
