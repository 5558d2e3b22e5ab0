//! Format encoders and the streaming pipeline.
//!
//! Every encoder implements the same capability ([`RowEncoder`]) over a
//! shared [`ByteSink`]; the pipeline drains the sink chunk by chunk, so an
//! encoder never accumulates more than one fetch batch of output.

mod compress;
mod csv;
mod json;
mod parquet;
pub mod pipeline;
pub mod queries;
mod xml;

pub use compress::Compressor;
pub use pipeline::{ChannelSink, ExportPipeline, ExportSink, FileSink};

use std::io;
use std::sync::{Arc, Mutex};

use crate::error_handling::ExportError;
use crate::model::{ExportRequest, Value};

/// The common encoder capability.
///
/// Call order is `write_header`, then `write_row` per record, then
/// `write_footer` exactly once. Encoders push bytes into their [`ByteSink`];
/// they never see the transport.
pub trait RowEncoder: Send {
    /// Emits the format prologue (CSV header line, JSON `[`, XML declaration,
    /// Parquet file header).
    fn write_header(&mut self) -> Result<(), ExportError>;

    /// Emits one projected row.
    fn write_row(&mut self, row: &[Value]) -> Result<(), ExportError>;

    /// Emits the format epilogue and flushes any buffered state.
    fn write_footer(&mut self) -> Result<(), ExportError>;
}

/// Instantiates the encoder for a validated request.
///
/// This is the single format dispatch in the crate; everything else works
/// through the trait object.
pub fn make_encoder(
    request: &ExportRequest,
    sink: ByteSink,
) -> Result<Box<dyn RowEncoder>, ExportError> {
    use crate::model::ExportFormat;
    let encoder: Box<dyn RowEncoder> = match request.format {
        ExportFormat::Csv => Box::new(csv::CsvEncoder::new(&request.columns, sink)),
        ExportFormat::Json => Box::new(json::JsonEncoder::new(&request.columns, sink)),
        ExportFormat::Xml => Box::new(xml::XmlEncoder::new(&request.columns, sink)),
        ExportFormat::Parquet => Box::new(parquet::ParquetEncoder::new(&request.columns, sink)?),
    };
    Ok(encoder)
}

/// A cloneable in-memory byte buffer shared between an encoder and the
/// pipeline that drains it.
///
/// Writes are infallible; the mutex is held only for the memcpy.
#[derive(Clone, Default)]
pub struct ByteSink(Arc<Mutex<Vec<u8>>>);

impl ByteSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw bytes.
    pub fn push(&self, bytes: &[u8]) {
        self.0.lock().expect("byte sink poisoned").extend_from_slice(bytes);
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.0.lock().expect("byte sink poisoned").len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes everything buffered so far.
    pub fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().expect("byte sink poisoned"))
    }
}

impl io::Write for ByteSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
