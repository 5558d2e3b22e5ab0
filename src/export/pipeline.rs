//! Export pipeline driver.
//!
//! Wires cursor -> projector/coercer -> encoder -> compressor -> sink. The
//! flow is pull-driven: the bounded sink suspends `send` while the consumer
//! is busy, which suspends the whole pipeline, so no stage ever buffers more
//! than one fetch batch plus one output chunk.

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use sqlx::PgPool;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::config::{CHUNK_TARGET_BYTES, YIELD_INTERVAL_ROWS};
use crate::error_handling::ExportError;
use crate::model::{coerce_row, ExportRequest};
use crate::storage::CursorReader;

use super::{make_encoder, queries, ByteSink, Compressor};

/// Destination for encoded (and possibly compressed) chunks.
///
/// `send` must apply backpressure: suspend until the consumer can take the
/// chunk, and fail once the consumer is gone.
#[async_trait]
pub trait ExportSink: Send {
    /// Delivers one chunk downstream.
    async fn send(&mut self, chunk: Bytes) -> Result<(), ExportError>;
}

/// Sink feeding an HTTP response body through a bounded channel.
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
}

impl ChannelSink {
    /// Wraps the sending half of the response channel.
    pub fn new(tx: mpsc::Sender<Result<Bytes, std::io::Error>>) -> Self {
        ChannelSink { tx }
    }

    /// Pushes a terminal error into the body stream so the transport aborts
    /// the chunked response instead of finishing it cleanly.
    pub async fn terminate(&mut self, message: &str) {
        let _ = self
            .tx
            .send(Err(std::io::Error::other(message.to_string())))
            .await;
    }
}

#[async_trait]
impl ExportSink for ChannelSink {
    async fn send(&mut self, chunk: Bytes) -> Result<(), ExportError> {
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| ExportError::SinkFailed("client disconnected".to_string()))
    }
}

/// Sink writing to a local file (benchmark runs).
pub struct FileSink {
    file: tokio::fs::File,
    bytes_written: u64,
}

impl FileSink {
    /// Wraps an open file.
    pub fn new(file: tokio::fs::File) -> Self {
        FileSink {
            file,
            bytes_written: 0,
        }
    }

    /// Flushes the file and returns the total bytes written.
    pub async fn finish(mut self) -> Result<u64, ExportError> {
        self.file
            .flush()
            .await
            .map_err(|e| ExportError::SinkFailed(e.to_string()))?;
        Ok(self.bytes_written)
    }
}

#[async_trait]
impl ExportSink for FileSink {
    async fn send(&mut self, chunk: Bytes) -> Result<(), ExportError> {
        self.file
            .write_all(&chunk)
            .await
            .map_err(|e| ExportError::SinkFailed(e.to_string()))?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }
}

/// One export invocation: an opened cursor plus the validated request.
///
/// Opening is separated from running so the HTTP handler can still answer
/// with a well-formed 5xx when setup fails, before any byte is committed to
/// the response.
pub struct ExportPipeline {
    reader: CursorReader,
    request: ExportRequest,
}

impl ExportPipeline {
    /// Composes the projected SELECT and opens the server-side cursor.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::CursorFailed` if the transaction or cursor
    /// cannot be established.
    pub async fn open(
        pool: &PgPool,
        request: ExportRequest,
        row_limit: Option<u64>,
    ) -> Result<Self, ExportError> {
        let sql = queries::build_select(&request.columns, row_limit);
        let reader = CursorReader::open(pool, &sql, request.format.batch_size()).await?;
        Ok(ExportPipeline { reader, request })
    }

    /// Streams the whole export into `sink`, returning the row count.
    ///
    /// Yields cooperatively every [`YIELD_INTERVAL_ROWS`] rows; the columnar
    /// format additionally suspends on every row-group fetch. On any error
    /// the cursor transaction is dropped, which rolls back and returns the
    /// connection to the pool.
    ///
    /// # Errors
    ///
    /// Propagates the first `CursorFailed`, `EncoderFailed` or `SinkFailed`
    /// from any stage; the caller owns job-status translation.
    pub async fn run(self, sink: &mut dyn ExportSink) -> Result<u64, ExportError> {
        let ExportPipeline {
            mut reader,
            request,
        } = self;

        let buffer = ByteSink::new();
        let mut encoder = make_encoder(&request, buffer.clone())?;
        let mut compressor = Compressor::new(request.compression);
        let mut rows: u64 = 0;

        encoder.write_header()?;

        while let Some(batch) = reader.next_batch().await? {
            for row in &batch {
                let values = coerce_row(row, &request.columns)?;
                encoder.write_row(&values)?;
                rows += 1;

                if buffer.len() >= CHUNK_TARGET_BYTES {
                    forward(&buffer, &mut compressor, sink).await?;
                }
                if rows % YIELD_INTERVAL_ROWS == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }

        // The cursor and its transaction are released before the encoder
        // finalizes; the footer only touches already-fetched state.
        reader.close().await?;

        encoder.write_footer()?;
        forward(&buffer, &mut compressor, sink).await?;

        let tail = compressor
            .finish()
            .map_err(|e| ExportError::SinkFailed(e.to_string()))?;
        if !tail.is_empty() {
            sink.send(Bytes::from(tail)).await?;
        }

        debug!("Export finished after {rows} rows");
        Ok(rows)
    }
}

/// Drains the encoder buffer through the compressor into the sink.
async fn forward(
    buffer: &ByteSink,
    compressor: &mut Compressor,
    sink: &mut dyn ExportSink,
) -> Result<(), ExportError> {
    let chunk = buffer.drain();
    if chunk.is_empty() {
        return Ok(());
    }
    let ready = compressor
        .process(chunk)
        .map_err(|e| ExportError::SinkFailed(e.to_string()))?;
    if !ready.is_empty() {
        sink.send(Bytes::from(ready)).await?;
    }
    Ok(())
}
