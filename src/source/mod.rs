//! Source readers: decode raw payloads into record sets conforming to the
//! declared schema of each source kind.

pub mod csv_export;
pub mod encoding;
pub mod json_feed;

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::constants::*;
use crate::error::{EltError, Result};
use crate::types::{Column, ColumnType, RecordSet, SourceTag, Value};

/// Decoded payload before schema conformance.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Columns every source must deliver.
pub const REQUIRED_COLUMNS: [&str; 21] = [
    CUSTOMER_ID,
    GENDER,
    SENIOR_CITIZEN,
    PARTNER,
    DEPENDENTS,
    TENURE,
    PHONE_SERVICE,
    MULTIPLE_LINES,
    INTERNET_SERVICE,
    ONLINE_SECURITY,
    ONLINE_BACKUP,
    DEVICE_PROTECTION,
    TECH_SUPPORT,
    STREAMING_TV,
    STREAMING_MOVIES,
    CONTRACT,
    PAPERLESS_BILLING,
    PAYMENT_METHOD,
    MONTHLY_CHARGES,
    TOTAL_CHARGES,
    CHURN,
];

/// The declared column contract of one source kind.
#[derive(Debug, Clone, Copy)]
pub struct SourceSchema {
    pub tag: SourceTag,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl SourceSchema {
    pub fn for_source(tag: SourceTag) -> Self {
        let optional: &'static [&'static str] = match tag {
            SourceTag::Csv => &[PROMPT_INPUT, CUSTOMER_FEEDBACK],
            SourceTag::Json => &[CUSTOMER_FEEDBACK, SOURCE, SOURCE_TIMESTAMP],
        };
        Self {
            tag,
            required: &REQUIRED_COLUMNS,
            optional,
        }
    }

    /// Fail on the first required column the record set lacks.
    pub fn validate(&self, records: &RecordSet, context: &str) -> Result<()> {
        for column in self.required {
            records.require_column(column, context)?;
        }
        Ok(())
    }

    /// Project a raw table onto the declared columns, in declared order.
    /// Undeclared columns are dropped.
    pub fn conform(&self, raw: RawTable) -> Result<RecordSet> {
        let context = format!("{} source", self.tag);
        let position = |name: &str| raw.headers.iter().position(|h| h == name);

        for column in self.required {
            if position(column).is_none() {
                return Err(EltError::missing_column(context, column));
            }
        }

        let picked: Vec<(&str, usize)> = self
            .required
            .iter()
            .chain(self.optional.iter())
            .filter_map(|name| position(name).map(|i| (*name, i)))
            .collect();

        let dropped: Vec<&String> = raw
            .headers
            .iter()
            .filter(|h| !picked.iter().any(|(name, _)| name == h))
            .collect();
        if !dropped.is_empty() {
            debug!(source = %self.tag, ?dropped, "Dropping undeclared source columns");
        }

        let mut records = RecordSet::new(
            picked
                .iter()
                .map(|(name, _)| Column::new(*name, ColumnType::Any))
                .collect(),
        );
        for row in raw.rows {
            records.push_row(picked.iter().map(|(_, i)| row[*i].clone()).collect())?;
        }
        Ok(records)
    }
}

/// Decode a raw payload of the given kind into a record set.
///
/// A decoding only counts when its text parses and carries every required
/// column, so a wrong guess (e.g. Latin-1 bytes read as UTF-16) falls through
/// to the next encoding. If no encoding conforms, the schema error of the
/// first encoding that parsed is returned; if none parsed, a decode error.
pub fn read_source(kind: SourceTag, payload: &[u8]) -> Result<RecordSet> {
    let schema = SourceSchema::for_source(kind);
    let mut schema_error: Option<EltError> = None;
    let mut conform = |raw: RawTable| {
        schema.conform(raw).map_err(|e| {
            let reason = e.to_string();
            schema_error.get_or_insert(e);
            reason
        })
    };

    let decoded = match kind {
        SourceTag::Csv => encoding::decode_with(payload, |text| {
            let raw = csv_export::parse_csv(text).map_err(|e| e.to_string())?;
            conform(raw)
        }),
        SourceTag::Json => encoding::decode_with(payload, |text| {
            let document: serde_json::Value =
                serde_json::from_str(text).map_err(|e| e.to_string())?;
            if let Some(version) = document.get("api_version") {
                debug!(api_version = %version, "JSON feed version");
            }
            conform(json_feed::flatten_results(&document)?)
        }),
    };

    let (encoding, records) = match decoded {
        Ok(found) => found,
        Err(reasons) => {
            return Err(schema_error.unwrap_or_else(|| EltError::Decode {
                kind,
                reason: reasons.join("; "),
            }))
        }
    };
    debug!(source = %kind, encoding = encoding.name(), "Decoded source payload");
    info!(
        source = %kind,
        rows = records.len(),
        columns = ?records.column_names(),
        "Extracted source records"
    );
    Ok(records)
}

/// Count of rows per rendered value of `column` (nulls counted under "null").
pub fn value_counts(records: &RecordSet, column: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    if let Some(i) = records.column_index(column) {
        for value in records.column_values(i) {
            let key = value.render().unwrap_or_else(|| "null".to_string());
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_header() -> String {
        let mut cols: Vec<&str> = REQUIRED_COLUMNS.to_vec();
        cols.push(CUSTOMER_FEEDBACK);
        cols.push("Unexpected");
        cols.join(",")
    }

    fn csv_row(id: &str) -> String {
        format!(
            "{id},Female,0,Yes,No,1,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,29.85,29.85,No,great,zzz"
        )
    }

    #[test]
    fn csv_payload_conforms_to_declared_columns() {
        let payload = format!("{}\n{}\n{}\n", csv_header(), csv_row("C1"), csv_row("C2"));
        let records = read_source(SourceTag::Csv, payload.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.columns().len(), 22);
        assert!(!records.has_column("Unexpected"));
        assert_eq!(records.column_names()[0], CUSTOMER_ID);
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let payload = "customerID,gender\nC1,Male\n";
        let err = read_source(SourceTag::Csv, payload.as_bytes()).unwrap_err();
        assert!(matches!(err, EltError::Schema { .. }));
    }

    #[test]
    fn even_length_latin1_csv_falls_through_to_latin1() {
        let latin1_payload = |pad: &str| {
            let row = csv_row("C1").replace("great", "caf\u{1}").replace("zzz", pad);
            let mut bytes = format!("{}\n{row}\n", csv_header()).into_bytes();
            // Swap the placeholder for a bare Latin-1 byte that is invalid UTF-8.
            if let Some(at) = bytes.iter().position(|&b| b == 0x01) {
                bytes[at] = 0xE9;
            }
            bytes
        };
        let mut payload = latin1_payload("zzz");
        if payload.len() % 2 != 0 {
            payload = latin1_payload("zzzz");
        }
        assert_eq!(payload.len() % 2, 0);
        assert!(encoding::TextEncoding::Utf16.decode(&payload).is_some());

        let records = read_source(SourceTag::Csv, &payload).unwrap();
        assert_eq!(records.len(), 1);
        let row = &records.rows()[0];
        assert_eq!(records.value(row, CUSTOMER_FEEDBACK), &Value::Str("café".into()));
    }

    #[test]
    fn missing_column_in_any_encoding_stays_schema_error() {
        let err = read_source(SourceTag::Csv, b"customerID,gender\nC1,Caf\xE9\n").unwrap_err();
        assert!(matches!(err, EltError::Schema { .. }));
    }

    #[test]
    fn undecodable_json_is_decode_error() {
        let err = read_source(SourceTag::Json, b"\x00\x01not json at all").unwrap_err();
        assert!(matches!(err, EltError::Decode { kind: SourceTag::Json, .. }));
    }

    #[test]
    fn utf16_json_feed_is_decoded() {
        let mut record = serde_json::Map::new();
        for col in REQUIRED_COLUMNS {
            record.insert(col.to_string(), serde_json::Value::String("x".into()));
        }
        record.insert(
            "metadata".into(),
            serde_json::json!({"source": "api", "timestamp": "2025-01-01"}),
        );
        let doc = serde_json::json!({"results": [record]}).to_string();
        let mut bytes = vec![0xFF, 0xFE];
        for unit in doc.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }

        let records = read_source(SourceTag::Json, &bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records.has_column(SOURCE));
        assert!(records.has_column(SOURCE_TIMESTAMP));
    }

    #[test]
    fn value_counts_groups_rendered_values() {
        let payload = format!("{}\n{}\n{}\n", csv_header(), csv_row("C1"), csv_row("C2"));
        let records = read_source(SourceTag::Csv, payload.as_bytes()).unwrap();
        let counts = value_counts(&records, CHURN);
        assert_eq!(counts.get("No"), Some(&2));
    }
}
