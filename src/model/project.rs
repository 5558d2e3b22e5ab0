//! Export request types and the column projector.
//!
//! Validation happens once, at request time; afterwards projection is total
//! and the rest of the pipeline never re-checks column names.

use serde::Deserialize;

use crate::error_handling::ExportError;

/// The fixed allow-list of projectable `records` attributes.
///
/// Sources are checked against this list before they are ever interpolated
/// into SQL; no user-supplied text reaches the query otherwise.
pub const SOURCE_COLUMNS: &[&str] = &["id", "created_at", "name", "value", "metadata"];

/// Output format of an export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    /// Delimited text, one record per line.
    Csv,
    /// A single JSON array of objects.
    Json,
    /// `<records><record>...</record></records>`.
    Xml,
    /// Apache Parquet.
    Parquet,
}

impl ExportFormat {
    /// Parses the wire tag used in requests.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            "xml" => Some(ExportFormat::Xml),
            "parquet" => Some(ExportFormat::Parquet),
            _ => None,
        }
    }

    /// All formats, in benchmark order.
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Csv,
        ExportFormat::Json,
        ExportFormat::Xml,
        ExportFormat::Parquet,
    ];

    /// Wire tag / file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xml => "xml",
            ExportFormat::Parquet => "parquet",
        }
    }

    /// Content type for the download response.
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
            ExportFormat::Xml => "application/xml",
            ExportFormat::Parquet => "application/octet-stream",
        }
    }

    /// Cursor fetch size for this format.
    pub fn batch_size(&self) -> u32 {
        match self {
            ExportFormat::Parquet => crate::config::COLUMNAR_BATCH_SIZE,
            _ => crate::config::TEXT_BATCH_SIZE,
        }
    }
}

/// Stream compression applied on top of the encoded bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    /// RFC 1952 gzip at the default level.
    Gzip,
}

/// One `(source, target)` column pair. Order across the mapping fixes
/// emission order in every format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMapping {
    /// A `records` attribute from [`SOURCE_COLUMNS`].
    pub source: String,
    /// Emitted column/tag name.
    pub target: String,
}

/// A validated export request.
#[derive(Clone, Debug)]
pub struct ExportRequest {
    /// Output format.
    pub format: ExportFormat,
    /// Ordered, non-empty column mapping.
    pub columns: Vec<ColumnMapping>,
    /// Optional stream compression.
    pub compression: Option<Compression>,
}

/// Wire shape of `POST /exports`, before validation.
#[derive(Debug, Deserialize)]
pub struct ExportRequestBody {
    /// Requested format tag.
    pub format: String,
    /// Requested column pairs.
    #[serde(default)]
    pub columns: Vec<ColumnMappingBody>,
    /// Requested compression tag, if any.
    #[serde(default)]
    pub compression: Option<String>,
}

/// Wire shape of one column pair.
#[derive(Debug, Deserialize)]
pub struct ColumnMappingBody {
    /// Source attribute name.
    pub source: String,
    /// Target column/tag name.
    pub target: String,
}

impl ExportRequest {
    /// Validates a wire request into an [`ExportRequest`].
    ///
    /// # Errors
    ///
    /// Returns `ExportError::RequestInvalid` for an unknown format, empty
    /// columns, an empty or unknown source, an empty target, or an unknown
    /// compression tag.
    pub fn validate(body: ExportRequestBody) -> Result<Self, ExportError> {
        let format = ExportFormat::parse(&body.format).ok_or_else(|| {
            ExportError::RequestInvalid(format!("unknown format {:?}", body.format))
        })?;

        if body.columns.is_empty() {
            return Err(ExportError::RequestInvalid(
                "columns must not be empty".to_string(),
            ));
        }

        let mut columns = Vec::with_capacity(body.columns.len());
        for pair in body.columns {
            if pair.target.is_empty() {
                return Err(ExportError::RequestInvalid(format!(
                    "empty target for source {:?}",
                    pair.source
                )));
            }
            if !SOURCE_COLUMNS.contains(&pair.source.as_str()) {
                return Err(ExportError::RequestInvalid(format!(
                    "unknown column source {:?}",
                    pair.source
                )));
            }
            columns.push(ColumnMapping {
                source: pair.source,
                target: pair.target,
            });
        }

        let compression = match body.compression.as_deref() {
            None => None,
            Some("gzip") => Some(Compression::Gzip),
            Some(other) => {
                return Err(ExportError::RequestInvalid(format!(
                    "unknown compression {:?}",
                    other
                )))
            }
        };

        Ok(ExportRequest {
            format,
            columns,
            compression,
        })
    }

    /// Target names in emission order.
    pub fn targets(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.target.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(format: &str, pairs: &[(&str, &str)], compression: Option<&str>) -> ExportRequestBody {
        ExportRequestBody {
            format: format.to_string(),
            columns: pairs
                .iter()
                .map(|(s, t)| ColumnMappingBody {
                    source: s.to_string(),
                    target: t.to_string(),
                })
                .collect(),
            compression: compression.map(str::to_string),
        }
    }

    #[test]
    fn accepts_all_formats_with_gzip() {
        for tag in ["csv", "json", "xml", "parquet"] {
            let request =
                ExportRequest::validate(body(tag, &[("id", "ID")], Some("gzip"))).unwrap();
            assert_eq!(request.compression, Some(Compression::Gzip));
        }
    }

    #[test]
    fn rejects_unknown_format() {
        let err = ExportRequest::validate(body("yaml", &[("id", "ID")], None)).unwrap_err();
        assert!(err.to_string().contains("yaml"));
    }

    #[test]
    fn rejects_empty_columns() {
        assert!(ExportRequest::validate(body("csv", &[], None)).is_err());
    }

    #[test]
    fn rejects_unknown_source_and_empty_target() {
        assert!(ExportRequest::validate(body("csv", &[("uuid", "ID")], None)).is_err());
        assert!(ExportRequest::validate(body("csv", &[("id", "")], None)).is_err());
    }

    #[test]
    fn rejects_unknown_compression() {
        assert!(ExportRequest::validate(body("csv", &[("id", "ID")], Some("zstd"))).is_err());
    }

    #[test]
    fn preserves_mapping_order() {
        let request = ExportRequest::validate(body(
            "json",
            &[("name", "Name"), ("id", "ID"), ("name", "NameAgain")],
            None,
        ))
        .unwrap();
        assert_eq!(request.targets(), vec!["Name", "ID", "NameAgain"]);
    }
}
