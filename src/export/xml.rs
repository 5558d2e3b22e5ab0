//! XML encoder.
//!
//! Emits an XML 1.0 declaration, a `<records>` root, and one `<record>` per
//! row. Column targets and document keys become element tags after
//! sanitization; list items get synthetic `item_<index>` tags. Scalar content
//! is entity-escaped.

use crate::error_handling::ExportError;
use crate::model::{ColumnMapping, Value};

use super::{ByteSink, RowEncoder};

pub struct XmlEncoder {
    sink: ByteSink,
    tags: Vec<String>,
}

impl XmlEncoder {
    pub fn new(mapping: &[ColumnMapping], sink: ByteSink) -> Self {
        XmlEncoder {
            // Sanitize once; targets repeat on every row.
            tags: mapping.iter().map(|c| sanitize_tag(&c.target)).collect(),
            sink,
        }
    }

    fn write_element(out: &mut String, tag: &str, value: &Value) {
        out.push('<');
        out.push_str(tag);
        out.push('>');
        match value {
            Value::Null => {}
            Value::Document(entries) => {
                for (key, child) in entries {
                    Self::write_element(out, &sanitize_tag(key), child);
                }
            }
            Value::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    Self::write_element(out, &format!("item_{index}"), item);
                }
            }
            scalar => {
                let text = scalar
                    .scalar_text()
                    .expect("scalar variants always render");
                escape_into(out, &text);
            }
        }
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}

impl RowEncoder for XmlEncoder {
    fn write_header(&mut self) -> Result<(), ExportError> {
        self.sink
            .push(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<records>");
        Ok(())
    }

    fn write_row(&mut self, row: &[Value]) -> Result<(), ExportError> {
        let mut record = String::from("\n<record>");
        for (tag, value) in self.tags.iter().zip(row) {
            Self::write_element(&mut record, tag, value);
        }
        record.push_str("</record>");
        self.sink.push(record.as_bytes());
        Ok(())
    }

    fn write_footer(&mut self) -> Result<(), ExportError> {
        self.sink.push(b"\n</records>");
        Ok(())
    }
}

/// Rewrites an arbitrary string into a valid XML name: characters outside
/// `[A-Za-z0-9_-]` become `_`, and a leading digit gets a `_` prefix.
pub fn sanitize_tag(raw: &str) -> String {
    let mut tag: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if tag.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        tag.insert(0, '_');
    }
    tag
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
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
        let mut encoder = XmlEncoder::new(mapping, sink.clone());
        encoder.write_header().unwrap();
        for row in rows {
            encoder.write_row(row).unwrap();
        }
        encoder.write_footer().unwrap();
        String::from_utf8(sink.drain()).unwrap()
    }

    #[test]
    fn empty_table_is_declaration_and_root() {
        let out = encode(&mapping(&[("id", "id")]), &[]);
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<records>\n</records>"
        );
    }

    #[test]
    fn scalars_are_escaped() {
        let out = encode(
            &mapping(&[("name", "name")]),
            &[vec![Value::Text("a<b>&\"c'".to_string())]],
        );
        assert!(out.contains("<name>a&lt;b&gt;&amp;&quot;c&apos;</name>"));
    }

    #[test]
    fn lists_get_indexed_item_tags() {
        let doc = Value::Document(vec![
            ("category".to_string(), Value::Text("A".to_string())),
            (
                "tags".to_string(),
                Value::List(vec![
                    Value::Text("x".to_string()),
                    Value::Text("y".to_string()),
                ]),
            ),
        ]);
        let out = encode(&mapping(&[("metadata", "metadata")]), &[vec![doc]]);
        assert!(out.contains(
            "<metadata><category>A</category><tags><item_0>x</item_0><item_1>y</item_1></tags></metadata>"
        ));
    }

    #[test]
    fn document_keys_are_sanitized() {
        let doc = Value::Document(vec![(
            "1st value".to_string(),
            Value::Text("v".to_string()),
        )]);
        let out = encode(&mapping(&[("metadata", "metadata")]), &[vec![doc]]);
        assert!(out.contains("<_1st_value>v</_1st_value>"));
    }

    #[test]
    fn null_becomes_empty_element() {
        let out = encode(&mapping(&[("name", "name")]), &[vec![Value::Null]]);
        assert!(out.contains("<name></name>"));
    }

    #[test]
    fn sanitize_tag_rules() {
        assert_eq!(sanitize_tag("1st value"), "_1st_value");
        assert_eq!(sanitize_tag("ok-tag_9"), "ok-tag_9");
        assert_eq!(sanitize_tag("weird/key!"), "weird_key_");
    }
}
