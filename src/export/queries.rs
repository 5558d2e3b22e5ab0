//! Shared query composition for the export pipeline.
//!
//! Centralizes the projected SELECT so every format scans the table the same
//! way. Column sources were validated against the fixed allow-list before
//! they get here; the row cap is a configuration integer. No user-supplied
//! text ever reaches the SQL.

use sqlx::PgPool;

use crate::error_handling::ExportError;
use crate::model::ColumnMapping;

/// Builds the projected SELECT for a validated mapping, deduplicating
/// repeated sources and applying the optional row cap.
///
/// `value` is cast to text so Postgres renders the canonical scale-4 decimal
/// (trailing zeros preserved); everything else is selected as-is.
pub fn build_select(mapping: &[ColumnMapping], row_limit: Option<u64>) -> String {
    let mut sources: Vec<&str> = Vec::new();
    for column in mapping {
        if !sources.contains(&column.source.as_str()) {
            sources.push(column.source.as_str());
        }
    }

    let select_list: Vec<String> = sources
        .iter()
        .map(|source| match *source {
            "value" => "value::text AS value".to_string(),
            other => other.to_string(),
        })
        .collect();

    let mut sql = format!("SELECT {} FROM records", select_list.join(", "));
    if let Some(limit) = row_limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sql
}

/// Counts the rows of the `records` table (benchmark metadata).
///
/// # Errors
///
/// Returns `ExportError::CursorFailed` on a query failure.
pub async fn count_records(pool: &PgPool) -> Result<i64, ExportError> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM records")
        .fetch_one(pool)
        .await
        .map_err(ExportError::CursorFailed)
}
