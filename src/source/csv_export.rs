//! CSV export decoding.

use csv::ReaderBuilder;

use super::RawTable;
use crate::types::Value;

/// Parse CSV text with a header row. Empty fields become null; every other
/// field is kept verbatim as text for the cleaning engine to coerce.
pub fn parse_csv(text: &str) -> Result<RawTable, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    Value::Null
                } else {
                    Value::Str(field.to_string())
                }
            })
            .collect();
        rows.push(row);
    }

    Ok(RawTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_are_null() {
        let table = parse_csv("customerID,TotalCharges\nC1,\nC2, \n").unwrap();
        assert_eq!(table.headers, vec!["customerID", "TotalCharges"]);
        assert_eq!(table.rows[0][1], Value::Null);
        assert_eq!(table.rows[1][1], Value::Str(" ".into()));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(parse_csv("a,b\n1,2,3\n").is_err());
    }

    #[test]
    fn quoted_dollar_amounts_survive() {
        let table = parse_csv("id,TotalCharges\nC1,\"$29.85$29.85\"\n").unwrap();
        assert_eq!(table.rows[0][1], Value::Str("$29.85$29.85".into()));
    }
}
