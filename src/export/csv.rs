//! CSV encoder.
//!
//! First line is the header (target names in mapping order), then one record
//! per row, `,`-separated and `\n`-terminated. Fields containing `,`, `"` or
//! a newline are quoted with interior quotes doubled; the `csv` writer's
//! quote-when-necessary policy implements exactly that rule. Nested documents
//! are emitted as their compact JSON serialization in a single field.

use crate::error_handling::ExportError;
use crate::model::{ColumnMapping, Value};

use super::{ByteSink, RowEncoder};

pub struct CsvEncoder {
    writer: csv::Writer<ByteSink>,
    targets: Vec<String>,
    width: usize,
}

impl CsvEncoder {
    pub fn new(mapping: &[ColumnMapping], sink: ByteSink) -> Self {
        CsvEncoder {
            writer: csv::WriterBuilder::new().from_writer(sink),
            targets: mapping.iter().map(|c| c.target.clone()).collect(),
            width: mapping.len(),
        }
    }

    fn field_text(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::List(_) | Value::Document(_) => value.to_json().to_string(),
            scalar => scalar
                .scalar_text()
                .expect("scalar variants always render"),
        }
    }
}

impl RowEncoder for CsvEncoder {
    fn write_header(&mut self) -> Result<(), ExportError> {
        self.writer
            .write_record(&self.targets)
            .map_err(|e| ExportError::EncoderFailed(e.to_string()))
    }

    fn write_row(&mut self, row: &[Value]) -> Result<(), ExportError> {
        debug_assert_eq!(row.len(), self.width);
        let fields: Vec<String> = row.iter().map(Self::field_text).collect();
        self.writer
            .write_record(&fields)
            .map_err(|e| ExportError::EncoderFailed(e.to_string()))
    }

    fn write_footer(&mut self) -> Result<(), ExportError> {
        self.writer
            .flush()
            .map_err(|e| ExportError::EncoderFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &str)]) -> Vec<ColumnMapping> {
        pairs
            .iter()
            .map(|(s, t)| ColumnMapping {
                source: s.to_string(),
                target: t.to_string(),
            })
            .collect()
    }

    fn encode(mapping: &[ColumnMapping], rows: &[Vec<Value>]) -> String {
        let sink = ByteSink::new();
        let mut encoder = CsvEncoder::new(mapping, sink.clone());
        encoder.write_header().unwrap();
        for row in rows {
            encoder.write_row(row).unwrap();
        }
        encoder.write_footer().unwrap();
        String::from_utf8(sink.drain()).unwrap()
    }

    #[test]
    fn smoke_two_columns() {
        let out = encode(
            &mapping(&[("id", "ID"), ("name", "Name")]),
            &[vec![Value::Int(1), Value::Text("Record_1".to_string())]],
        );
        assert_eq!(out, "ID,Name\n1,Record_1\n");
    }

    #[test]
    fn quotes_and_doubles_embedded_quotes() {
        let out = encode(
            &mapping(&[("id", "id"), ("name", "name")]),
            &[vec![Value::Int(1), Value::Text("a,b\"c".to_string())]],
        );
        assert_eq!(out.lines().nth(1), Some("1,\"a,b\"\"c\""));
    }

    #[test]
    fn quotes_embedded_newlines() {
        let out = encode(
            &mapping(&[("name", "name")]),
            &[vec![Value::Text("line1\nline2".to_string())]],
        );
        assert_eq!(out, "name\n\"line1\nline2\"\n");
    }

    #[test]
    fn null_is_empty_field_and_nested_is_json_string() {
        let doc = Value::Document(vec![(
            "category".to_string(),
            Value::Text("A".to_string()),
        )]);
        let out = encode(
            &mapping(&[("name", "name"), ("metadata", "metadata")]),
            &[vec![Value::Null, doc]],
        );
        assert_eq!(out.lines().nth(1), Some(",\"{\"\"category\"\":\"\"A\"\"}\""));
    }

    #[test]
    fn empty_table_yields_header_only() {
        let out = encode(&mapping(&[("id", "ID")]), &[]);
        assert_eq!(out, "ID\n");
    }
}
