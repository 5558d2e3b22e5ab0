//! Server-side cursor reader.
//!
//! A [`CursorReader`] owns one transaction for its whole lifetime and fetches
//! the result set in bounded batches, so the client never materializes the
//! table. Release is guaranteed on every exit path: `close()` closes the
//! cursor and commits; dropping the reader without closing drops the
//! transaction, which rolls back and returns the connection to the pool (the
//! scan is read-only, so both paths release equally).

use log::debug;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error_handling::ExportError;

/// Iterates a projected SELECT through a uniquely named `NO SCROLL` cursor.
pub struct CursorReader {
    tx: Option<Transaction<'static, Postgres>>,
    name: String,
    fetch_sql: String,
    exhausted: bool,
}

impl CursorReader {
    /// Opens a transaction and declares a cursor over `sql`.
    ///
    /// `sql` is composed from the fixed column allow-list and a validated
    /// integer cap, never from user text, so no bind parameters are needed.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::CursorFailed` if the transaction or the DECLARE
    /// fails; nothing is retried at this layer.
    pub async fn open(pool: &PgPool, sql: &str, batch_size: u32) -> Result<Self, ExportError> {
        let mut tx = pool.begin().await.map_err(ExportError::CursorFailed)?;

        let name = format!("export_{}", Uuid::new_v4().simple());
        let declare = format!("DECLARE {name} NO SCROLL CURSOR FOR {sql}");
        sqlx::query(&declare)
            .execute(&mut *tx)
            .await
            .map_err(ExportError::CursorFailed)?;

        debug!("Declared cursor {name} (batch size {batch_size})");
        Ok(CursorReader {
            tx: Some(tx),
            fetch_sql: format!("FETCH FORWARD {batch_size} FROM {name}"),
            name,
            exhausted: false,
        })
    }

    /// Fetches the next batch. Returns `None` once the result set is drained;
    /// after that every call returns `None`.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::CursorFailed` on a fetch failure (connection
    /// loss, cursor gone). The reader is unusable afterwards; dropping it
    /// releases the transaction.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<PgRow>>, ExportError> {
        if self.exhausted {
            return Ok(None);
        }
        let tx = self
            .tx
            .as_mut()
            .expect("cursor transaction taken before exhaustion");
        let rows = sqlx::query(&self.fetch_sql)
            .fetch_all(&mut **tx)
            .await
            .map_err(ExportError::CursorFailed)?;
        if rows.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        Ok(Some(rows))
    }

    /// Closes the cursor and commits, returning the connection to the pool.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::CursorFailed` if CLOSE or COMMIT fails; the
    /// transaction is consumed either way.
    pub async fn close(mut self) -> Result<(), ExportError> {
        let mut tx = self
            .tx
            .take()
            .expect("cursor transaction already consumed");
        let close = format!("CLOSE {}", self.name);
        sqlx::query(&close)
            .execute(&mut *tx)
            .await
            .map_err(ExportError::CursorFailed)?;
        tx.commit().await.map_err(ExportError::CursorFailed)?;
        debug!("Closed cursor {}", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::queries::build_select;
    use crate::model::ColumnMapping;

    fn mapping(pairs: &[(&str, &str)]) -> Vec<ColumnMapping> {
        pairs
            .iter()
            .map(|(s, t)| ColumnMapping {
                source: s.to_string(),
                target: t.to_string(),
            })
            .collect()
    }

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| crate::config::DEFAULT_DATABASE_URL.to_string());
        PgPool::connect(&url).await.expect("connect test database")
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres with the records table"]
    async fn cursor_drains_in_batches_and_commits() {
        let pool = test_pool().await;
        let sql = build_select(&mapping(&[("id", "ID")]), Some(5));
        let mut reader = CursorReader::open(&pool, &sql, 2).await.unwrap();

        let mut total = 0usize;
        while let Some(batch) = reader.next_batch().await.unwrap() {
            assert!(batch.len() <= 2);
            total += batch.len();
        }
        assert!(total <= 5);
        reader.close().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres with the records table"]
    async fn abandoned_cursor_releases_its_connection() {
        let pool = test_pool().await;
        let sql = build_select(&mapping(&[("id", "ID")]), None);
        {
            let mut reader = CursorReader::open(&pool, &sql, 10).await.unwrap();
            let _ = reader.next_batch().await.unwrap();
            // Dropped here without close(): rollback must free the slot.
        }
        // If the drop leaked the connection this acquire would time out.
        let conn = pool.acquire().await;
        assert!(conn.is_ok());
    }
}
