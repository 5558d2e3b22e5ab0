//! JSON array-of-objects encoder.
//!
//! Grammar: `[` newline, one compact object per row separated by `,\n`, then
//! `\n]`. Nested documents are emitted as native JSON, not stringified.
//! Exactly one comma separates consecutive objects and none precedes the
//! first, so concatenating chunks always forms a valid document.

use crate::error_handling::ExportError;
use crate::model::{ColumnMapping, Value};

use super::{ByteSink, RowEncoder};

pub struct JsonEncoder {
    sink: ByteSink,
    targets: Vec<String>,
    rows_written: u64,
}

impl JsonEncoder {
    pub fn new(mapping: &[ColumnMapping], sink: ByteSink) -> Self {
        JsonEncoder {
            sink,
            targets: mapping.iter().map(|c| c.target.clone()).collect(),
            rows_written: 0,
        }
    }
}

impl RowEncoder for JsonEncoder {
    fn write_header(&mut self) -> Result<(), ExportError> {
        self.sink.push(b"[\n");
        Ok(())
    }

    fn write_row(&mut self, row: &[Value]) -> Result<(), ExportError> {
        if self.rows_written > 0 {
            self.sink.push(b",\n");
        }
        let mut object = serde_json::Map::with_capacity(self.targets.len());
        for (target, value) in self.targets.iter().zip(row) {
            object.insert(target.clone(), value.to_json());
        }
        let rendered = serde_json::Value::Object(object).to_string();
        self.sink.push(rendered.as_bytes());
        self.rows_written += 1;
        Ok(())
    }

    fn write_footer(&mut self) -> Result<(), ExportError> {
        self.sink.push(b"\n]");
        Ok(())
    }
}
