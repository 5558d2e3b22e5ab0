//! End-to-end checks of the format encoders and the compression adapter,
//! driven through the same factory the pipeline uses.

use chrono::{TimeZone, Utc};
use exportd::export::{make_encoder, ByteSink, Compressor};
use exportd::model::{ColumnMapping, Compression, ExportFormat, ExportRequest, Value};

fn request(format: ExportFormat, pairs: &[(&str, &str)]) -> ExportRequest {
    ExportRequest {
        format,
        columns: pairs
            .iter()
            .map(|(s, t)| ColumnMapping {
                source: s.to_string(),
                target: t.to_string(),
            })
            .collect(),
        compression: None,
    }
}

fn encode(request: &ExportRequest, rows: &[Vec<Value>]) -> Vec<u8> {
    let sink = ByteSink::new();
    let mut encoder = make_encoder(request, sink.clone()).unwrap();
    encoder.write_header().unwrap();
    for row in rows {
        encoder.write_row(row).unwrap();
    }
    encoder.write_footer().unwrap();
    sink.drain()
}

fn sample_row() -> Vec<Value> {
    vec![
        Value::Int(1),
        Value::Timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 0).unwrap()),
        Value::Text("Record_1".to_string()),
        Value::Decimal("45123.5000".to_string()),
        Value::Document(vec![
            ("category".to_string(), Value::Text("A".to_string())),
            (
                "tags".to_string(),
                Value::List(vec![
                    Value::Text("x".to_string()),
                    Value::Text("y".to_string()),
                ]),
            ),
        ]),
    ]
}

const ALL_COLUMNS: &[(&str, &str)] = &[
    ("id", "id"),
    ("created_at", "created_at"),
    ("name", "name"),
    ("value", "value"),
    ("metadata", "metadata"),
];

#[test]
fn csv_smoke_matches_expected_bytes() {
    let out = encode(
        &request(ExportFormat::Csv, &[("id", "ID"), ("name", "Name")]),
        &[vec![Value::Int(1), Value::Text("Record_1".to_string())]],
    );
    assert_eq!(out, b"ID,Name\n1,Record_1\n");
}

#[test]
fn csv_escapes_embedded_delimiters_and_quotes() {
    let out = encode(
        &request(ExportFormat::Csv, &[("id", "id"), ("name", "name")]),
        &[vec![Value::Int(1), Value::Text("a,b\"c".to_string())]],
    );
    assert_eq!(out, b"id,name\n1,\"a,b\"\"c\"\n");
}

#[test]
fn csv_round_trips_hostile_field_through_its_own_escaping() {
    let hostile = "\",\"\n'".to_string();
    let out = encode(
        &request(ExportFormat::Csv, &[("name", "name")]),
        &[vec![Value::Text(hostile.clone())]],
    );
    let mut reader = csv::ReaderBuilder::new().from_reader(out.as_slice());
    let record = reader.records().next().unwrap().unwrap();
    assert_eq!(&record[0], hostile.as_str());
}

#[test]
fn json_nesting_matches_expected_body() {
    let out = encode(&request(ExportFormat::Json, ALL_COLUMNS), &[sample_row()]);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(
        text,
        "[\n{\"id\":1,\"created_at\":\"2024-03-01T08:15:00.000000+00:00\",\
         \"name\":\"Record_1\",\"value\":\"45123.5000\",\
         \"metadata\":{\"category\":\"A\",\"tags\":[\"x\",\"y\"]}}\n]"
    );

    // And a standard parser agrees it is an array of objects with the
    // declared keys.
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    let keys: Vec<&String> = parsed.as_array().unwrap()[0]
        .as_object()
        .unwrap()
        .keys()
        .collect();
    assert_eq!(keys, ["id", "created_at", "name", "value", "metadata"]);
}

#[test]
fn xml_nests_documents_and_indexes_list_items() {
    let out = encode(&request(ExportFormat::Xml, ALL_COLUMNS), &[sample_row()]);
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(text.contains(
        "<metadata><category>A</category><tags><item_0>x</item_0><item_1>y</item_1></tags></metadata>"
    ));
}

#[test]
fn xml_sanitizes_document_keys_starting_with_digits() {
    let row = vec![Value::Document(vec![(
        "1st value".to_string(),
        Value::Text("v".to_string()),
    )])];
    let out = encode(
        &request(ExportFormat::Xml, &[("metadata", "metadata")]),
        &[row],
    );
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("<_1st_value>v</_1st_value>"));
    assert!(!text.contains("<1st"));
}

#[test]
fn empty_table_bodies_per_format() {
    let csv = encode(&request(ExportFormat::Csv, &[("id", "ID")]), &[]);
    assert_eq!(csv, b"ID\n");

    let json = encode(&request(ExportFormat::Json, &[("id", "id")]), &[]);
    assert_eq!(json, b"[\n\n]");

    let xml = encode(&request(ExportFormat::Xml, &[("id", "id")]), &[]);
    assert_eq!(
        xml,
        b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<records>\n</records>"
    );

    let parquet = encode(&request(ExportFormat::Parquet, &[("id", "id")]), &[]);
    assert_eq!(&parquet[0..4], b"PAR1");
    assert_eq!(&parquet[parquet.len() - 4..], b"PAR1");
}

#[test]
fn parquet_emits_one_interoperable_file() {
    use arrow::array::{Decimal128Array, Int64Array};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let out = encode(&request(ExportFormat::Parquet, ALL_COLUMNS), &[sample_row()]);
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(out))
        .unwrap()
        .build()
        .unwrap();
    let batch = reader.into_iter().next().unwrap().unwrap();
    assert_eq!(batch.num_rows(), 1);
    let ids = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(ids.value(0), 1);
    let values = batch
        .column(3)
        .as_any()
        .downcast_ref::<Decimal128Array>()
        .unwrap();
    assert_eq!(values.value(0), 451_235_000);
}

#[test]
fn gzip_compressed_stream_decodes_to_the_uncompressed_body() {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let request = request(ExportFormat::Csv, &[("id", "ID"), ("name", "Name")]);
    let rows = vec![vec![Value::Int(1), Value::Text("Record_1".to_string())]];

    let plain = encode(&request, &rows);

    // Same bytes routed through the gzip adapter, chunked the way the
    // pipeline forwards them.
    let mut compressor = Compressor::new(Some(Compression::Gzip));
    let mut compressed = Vec::new();
    for chunk in plain.chunks(7) {
        compressed.extend(compressor.process(chunk.to_vec()).unwrap());
    }
    compressed.extend(compressor.finish().unwrap());

    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, plain);
}

#[test]
fn column_order_follows_the_mapping_in_every_text_format() {
    let pairs = [("name", "Name"), ("id", "ID")];
    let rows = vec![vec![Value::Text("n".to_string()), Value::Int(1)]];

    let csv = String::from_utf8(encode(&request(ExportFormat::Csv, &pairs), &rows)).unwrap();
    assert!(csv.starts_with("Name,ID\n"));

    let json = String::from_utf8(encode(&request(ExportFormat::Json, &pairs), &rows)).unwrap();
    assert!(json.contains("{\"Name\":\"n\",\"ID\":1}"));

    let xml = String::from_utf8(encode(&request(ExportFormat::Xml, &pairs), &rows)).unwrap();
    let name_pos = xml.find("<Name>").unwrap();
    let id_pos = xml.find("<ID>").unwrap();
    assert!(name_pos < id_pos);
}
