//! JSON API feed decoding.

use serde_json::{Map, Value as Json};

use super::RawTable;
use crate::types::Value;

/// Nested metadata fields renamed on extraction.
const METADATA_RENAMES: [(&str, &str); 2] = [
    ("metadata.source", crate::constants::SOURCE),
    ("metadata.timestamp", crate::constants::SOURCE_TIMESTAMP),
];

/// Flatten the `results` array of a feed document into a raw table.
/// Nested objects become dot-joined columns; keys missing from a record read
/// as null. A document without `results` yields an empty table.
pub fn flatten_results(document: &Json) -> Result<RawTable, String> {
    let results = match document.get("results") {
        Some(Json::Array(items)) => items.as_slice(),
        Some(_) => return Err("'results' is not an array".to_string()),
        None => &[],
    };

    let mut headers: Vec<String> = Vec::new();
    let mut records: Vec<Vec<(String, Value)>> = Vec::with_capacity(results.len());
    for (i, item) in results.iter().enumerate() {
        let object = item
            .as_object()
            .ok_or_else(|| format!("results[{i}] is not an object"))?;
        let mut flat = Vec::new();
        flatten_into(object, "", &mut flat);
        for (key, _) in &flat {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
        records.push(flat);
    }

    let rows = records
        .into_iter()
        .map(|flat| {
            headers
                .iter()
                .map(|h| {
                    flat.iter()
                        .find(|(k, _)| k == h)
                        .map_or(Value::Null, |(_, v)| v.clone())
                })
                .collect()
        })
        .collect();

    for header in headers.iter_mut() {
        if let Some((_, to)) = METADATA_RENAMES.iter().find(|(from, _)| from == header) {
            *header = to.to_string();
        }
    }

    Ok(RawTable { headers, rows })
}

fn flatten_into(object: &Map<String, Json>, prefix: &str, out: &mut Vec<(String, Value)>) {
    for (key, value) in object {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Json::Object(inner) => flatten_into(inner, &name, out),
            other => out.push((name, json_cell(other))),
        }
    }
}

fn json_cell(value: &Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::from_opt_f64(n.as_f64()),
        },
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(_) => Value::Str(value.to_string()),
        Json::Object(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_and_renames_metadata() {
        let doc = json!({
            "api_version": "v2",
            "results": [
                {"customerID": "J1", "tenure": 3, "metadata": {"source": "crm", "timestamp": "2025-01-01T00:00:00Z"}},
                {"customerID": "J2", "MonthlyCharges": 19.5}
            ]
        });
        let table = flatten_results(&doc).unwrap();
        assert!(table.headers.contains(&"source".to_string()));
        assert!(table.headers.contains(&"source_timestamp".to_string()));
        assert!(!table.headers.iter().any(|h| h.starts_with("metadata.")));

        let tenure = table.headers.iter().position(|h| h == "tenure").unwrap();
        assert_eq!(table.rows[0][tenure], Value::Int(3));
        assert_eq!(table.rows[1][tenure], Value::Null);

        let charges = table.headers.iter().position(|h| h == "MonthlyCharges").unwrap();
        assert_eq!(table.rows[1][charges], Value::Float(19.5));
    }

    #[test]
    fn missing_results_is_empty() {
        let table = flatten_results(&json!({"api_version": "v2"})).unwrap();
        assert!(table.headers.is_empty());
        assert!(table.rows.is_empty());
    }

    #[test]
    fn non_object_record_is_rejected() {
        assert!(flatten_results(&json!({"results": [1, 2]})).is_err());
    }
}
