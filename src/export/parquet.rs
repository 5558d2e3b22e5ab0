//! Parquet encoder.
//!
//! Produces a genuine Parquet file: `PAR1` magic, dictionary-encoded column
//! chunks, Thrift footer. Rows accumulate in Arrow builders for at most one
//! row group (the columnar fetch batch); each full group is converted to a
//! `RecordBatch`, handed to the `ArrowWriter` and flushed to the sink
//! immediately, so a single group is the only columnar state ever resident.
//!
//! Type mapping: `id` INT64, `created_at` TIMESTAMP(µs, UTC), `name` UTF8,
//! `value` DECIMAL128(18,4), `metadata` UTF8 carrying compact JSON.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, Decimal128Builder, Int64Builder, StringBuilder, TimestampMicrosecondBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::config::COLUMNAR_BATCH_SIZE;
use crate::error_handling::ExportError;
use crate::model::{ColumnMapping, Value};

use super::{ByteSink, RowEncoder};

/// Decimal precision/scale of the `value` column.
const DECIMAL_PRECISION: u8 = 18;
const DECIMAL_SCALE: i8 = 4;

pub struct ParquetEncoder {
    writer: Option<ArrowWriter<ByteSink>>,
    schema: Arc<Schema>,
    builders: Vec<ColumnBuilder>,
    rows_in_group: usize,
}

enum ColumnBuilder {
    Int(Int64Builder),
    Timestamp(TimestampMicrosecondBuilder),
    Text(StringBuilder),
    Decimal(Decimal128Builder),
}

impl ParquetEncoder {
    pub fn new(mapping: &[ColumnMapping], sink: ByteSink) -> Result<Self, ExportError> {
        let capacity = COLUMNAR_BATCH_SIZE as usize;
        let mut fields = Vec::with_capacity(mapping.len());
        let mut builders = Vec::with_capacity(mapping.len());

        for column in mapping {
            let (data_type, builder) = match column.source.as_str() {
                "id" => (
                    DataType::Int64,
                    ColumnBuilder::Int(Int64Builder::with_capacity(capacity)),
                ),
                "created_at" => (
                    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                    ColumnBuilder::Timestamp(
                        TimestampMicrosecondBuilder::with_capacity(capacity)
                            .with_timezone("UTC"),
                    ),
                ),
                "value" => (
                    DataType::Decimal128(DECIMAL_PRECISION, DECIMAL_SCALE),
                    ColumnBuilder::Decimal(
                        Decimal128Builder::with_capacity(capacity)
                            .with_precision_and_scale(DECIMAL_PRECISION, DECIMAL_SCALE)
                            .map_err(|e| ExportError::EncoderFailed(e.to_string()))?,
                    ),
                ),
                // name, metadata (as serialized JSON) and anything textual
                _ => (
                    DataType::Utf8,
                    ColumnBuilder::Text(StringBuilder::with_capacity(capacity, capacity * 16)),
                ),
            };
            fields.push(Field::new(&column.target, data_type, true));
            builders.push(builder);
        }

        let schema = Arc::new(Schema::new(fields));
        let props = WriterProperties::builder()
            .set_max_row_group_size(capacity)
            .build();
        let writer = ArrowWriter::try_new(sink, schema.clone(), Some(props))
            .map_err(|e| ExportError::EncoderFailed(e.to_string()))?;

        Ok(ParquetEncoder {
            writer: Some(writer),
            schema,
            builders,
            rows_in_group: 0,
        })
    }

    fn append(builder: &mut ColumnBuilder, value: &Value) -> Result<(), ExportError> {
        match (builder, value) {
            (ColumnBuilder::Int(b), Value::Int(n)) => b.append_value(*n),
            (ColumnBuilder::Int(b), Value::Null) => b.append_null(),
            (ColumnBuilder::Timestamp(b), Value::Timestamp(ts)) => {
                b.append_value(ts.timestamp_micros())
            }
            (ColumnBuilder::Timestamp(b), Value::Null) => b.append_null(),
            (ColumnBuilder::Decimal(b), Value::Decimal(text)) => {
                let scaled = decimal_to_scaled_i128(text).ok_or_else(|| {
                    ExportError::EncoderFailed(format!("unparseable decimal {text:?}"))
                })?;
                b.append_value(scaled)
            }
            (ColumnBuilder::Decimal(b), Value::Int(n)) => {
                b.append_value(i128::from(*n) * 10i128.pow(DECIMAL_SCALE as u32))
            }
            (ColumnBuilder::Decimal(b), Value::Null) => b.append_null(),
            (ColumnBuilder::Text(b), Value::Null) => b.append_null(),
            (ColumnBuilder::Text(b), Value::List(_) | Value::Document(_)) => {
                b.append_value(value.to_json().to_string())
            }
            (ColumnBuilder::Text(b), scalar) => b.append_value(
                scalar
                    .scalar_text()
                    .expect("scalar variants always render"),
            ),
            (_, other) => {
                return Err(ExportError::EncoderFailed(format!(
                    "value {other:?} does not fit the column type"
                )))
            }
        }
        Ok(())
    }

    fn flush_row_group(&mut self) -> Result<(), ExportError> {
        let arrays: Vec<ArrayRef> = self
            .builders
            .iter_mut()
            .map(|builder| match builder {
                ColumnBuilder::Int(b) => Arc::new(b.finish()) as ArrayRef,
                ColumnBuilder::Timestamp(b) => Arc::new(b.finish()) as ArrayRef,
                ColumnBuilder::Text(b) => Arc::new(b.finish()) as ArrayRef,
                ColumnBuilder::Decimal(b) => Arc::new(b.finish()) as ArrayRef,
            })
            .collect();

        let batch = RecordBatch::try_new(self.schema.clone(), arrays)
            .map_err(|e| ExportError::EncoderFailed(e.to_string()))?;

        let writer = self
            .writer
            .as_mut()
            .expect("parquet writer used after close");
        writer
            .write(&batch)
            .map_err(|e| ExportError::EncoderFailed(e.to_string()))?;
        // Force the row group out so the sink sees it now, not at close.
        writer
            .flush()
            .map_err(|e| ExportError::EncoderFailed(e.to_string()))?;
        self.rows_in_group = 0;
        Ok(())
    }
}

impl RowEncoder for ParquetEncoder {
    fn write_header(&mut self) -> Result<(), ExportError> {
        // The ArrowWriter emits the file header itself.
        Ok(())
    }

    fn write_row(&mut self, row: &[Value]) -> Result<(), ExportError> {
        for (builder, value) in self.builders.iter_mut().zip(row) {
            Self::append(builder, value)?;
        }
        self.rows_in_group += 1;
        if self.rows_in_group >= COLUMNAR_BATCH_SIZE as usize {
            self.flush_row_group()?;
        }
        Ok(())
    }

    fn write_footer(&mut self) -> Result<(), ExportError> {
        if self.rows_in_group > 0 {
            self.flush_row_group()?;
        }
        let writer = self
            .writer
            .take()
            .expect("parquet writer closed twice");
        writer
            .close()
            .map_err(|e| ExportError::EncoderFailed(e.to_string()))?;
        Ok(())
    }
}

/// Parses canonical decimal text into an i128 scaled to `DECIMAL_SCALE`.
///
/// Fractions longer than the scale are truncated; shorter ones are padded.
/// Handles negative values including `-0.x`.
fn decimal_to_scaled_i128(text: &str) -> Option<i128> {
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };

    let negative = int_part.starts_with('-');
    let digits = int_part.trim_start_matches(['-', '+']);
    let mut value: i128 = if digits.is_empty() {
        0
    } else {
        digits.parse().ok()?
    };

    let scale = DECIMAL_SCALE as usize;
    let mut frac = String::with_capacity(scale);
    frac.push_str(&frac_part[..frac_part.len().min(scale)]);
    while frac.len() < scale {
        frac.push('0');
    }
    let frac_value: i128 = if frac.is_empty() { 0 } else { frac.parse().ok()? };

    value = value.checked_mul(10i128.pow(scale as u32))?.checked_add(frac_value)?;
    Some(if negative { -value } else { value })
}
