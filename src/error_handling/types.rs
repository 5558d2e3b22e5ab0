//! Error types for the export pipeline.

use thiserror::Error;

/// Failures surfaced by the export pipeline and its HTTP layer.
///
/// The dual mid-stream policy lives in the server module: variants arriving
/// before the first response byte become a JSON 5xx, variants arriving after
/// it terminate the chunked body and only update the job record.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Malformed body, unknown format, empty columns, unknown column source,
    /// or unknown compression. Surfaces as 400; no job is created.
    #[error("invalid export request: {0}")]
    RequestInvalid(String),

    /// Unknown job identifier on download. Surfaces as 404.
    #[error("export job not found")]
    JobNotFound,

    /// Database connect/declare/fetch failure anywhere in the cursor layer.
    #[error("cursor failed: {0}")]
    CursorFailed(#[source] sqlx::Error),

    /// Structural failure inside a format encoder (e.g. the columnar writer
    /// rejected a batch).
    #[error("encoder failed: {0}")]
    EncoderFailed(String),

    /// Write to the compressor or the HTTP socket failed; the usual cause is
    /// the client going away mid-download.
    #[error("sink failed: {0}")]
    SinkFailed(String),
}

impl ExportError {
    /// Short machine-readable cause stored on a failed job.
    pub fn cause(&self) -> &'static str {
        match self {
            ExportError::RequestInvalid(_) => "request_invalid",
            ExportError::JobNotFound => "job_not_found",
            ExportError::CursorFailed(_) => "cursor_failed",
            ExportError::EncoderFailed(_) => "encoder_failed",
            ExportError::SinkFailed(_) => "client_disconnected",
        }
    }
}
