use std::collections::HashSet;
use tracing::{debug, info};

use crate::constants::*;
use crate::error::{EltError, Result};
use crate::source::SourceSchema;
use crate::types::{capitalize, Column, ColumnType, RecordSet, SourceTag, Value, YesNo};

/// Counters collected while cleaning one record set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningStats {
    pub input_rows: usize,
    pub output_rows: usize,
    pub duplicates_dropped: usize,
    pub unparseable_money: usize,
    pub unparseable_tenure: usize,
    pub imputed_total_charges: usize,
    pub remaining_nulls: usize,
}

/// Normalize a raw record set into the canonical cleaned schema.
pub fn clean(records: &RecordSet, tag: SourceTag) -> Result<RecordSet> {
    clean_with_stats(records, tag).map(|(cleaned, _)| cleaned)
}

pub fn clean_with_stats(records: &RecordSet, tag: SourceTag) -> Result<(RecordSet, CleaningStats)> {
    let context = clean_unit(tag);
    SourceSchema::for_source(tag).validate(records, context)?;

    let idx = |name: &str| records.require_column(name, context);
    let id_col = idx(CUSTOMER_ID)?;
    let gender_col = idx(GENDER)?;
    let senior_col = idx(SENIOR_CITIZEN)?;
    let tenure_col = idx(TENURE)?;
    let monthly_col = idx(MONTHLY_CHARGES)?;
    let total_col = idx(TOTAL_CHARGES)?;
    let yes_no_cols = YES_NO_COLUMNS
        .iter()
        .map(|name| idx(*name))
        .collect::<Result<Vec<usize>>>()?;

    let columns: Vec<Column> = records
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let ty = if i == id_col || i == gender_col || yes_no_cols.contains(&i) {
                ColumnType::Str
            } else if i == senior_col || i == tenure_col {
                ColumnType::Int
            } else if i == monthly_col || i == total_col {
                ColumnType::Float
            } else {
                column.ty
            };
            Column::new(column.name.clone(), ty)
        })
        .collect();

    let mut stats = CleaningStats {
        input_rows: records.len(),
        ..CleaningStats::default()
    };
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut cleaned = RecordSet::new(columns);

    for (row_number, row) in records.rows().iter().enumerate() {
        let customer_id = match row[id_col].render() {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                return Err(EltError::Schema {
                    context: context.to_string(),
                    message: format!("row {row_number} has an empty {CUSTOMER_ID}"),
                })
            }
        };
        if !seen.insert(customer_id.clone()) {
            stats.duplicates_dropped += 1;
            continue;
        }

        let tenure = coerce_tenure(&row[tenure_col]).unwrap_or_else(|_| {
            stats.unparseable_tenure += 1;
            0
        });
        let monthly = coerce_money(&row[monthly_col]).unwrap_or_else(|_| {
            stats.unparseable_money += 1;
            None
        });
        let mut total = coerce_money(&row[total_col]).unwrap_or_else(|_| {
            stats.unparseable_money += 1;
            None
        });
        if total.is_none() {
            total = monthly.map(|m| m * tenure as f64);
            if total.is_some() {
                stats.imputed_total_charges += 1;
            }
        }

        let mut out = row.clone();
        out[id_col] = Value::Str(customer_id);
        out[tenure_col] = Value::Int(tenure);
        out[monthly_col] = Value::from_opt_f64(monthly);
        out[total_col] = Value::from_opt_f64(total);
        out[senior_col] = Value::Int(normalize_senior(&row[senior_col]));
        out[gender_col] = normalize_gender(&row[gender_col]);
        for &col in &yes_no_cols {
            out[col] = Value::Str(normalize_yes_no(&row[col]));
        }
        cleaned.push_row(out)?;
    }

    stats.output_rows = cleaned.len();
    stats.remaining_nulls = cleaned
        .rows()
        .iter()
        .flat_map(|row| row.iter())
        .filter(|v| v.is_null())
        .count();

    if stats.duplicates_dropped > 0 {
        info!(source = %tag, dropped = stats.duplicates_dropped, "Dropped duplicate customers");
    }
    if stats.unparseable_money + stats.unparseable_tenure > 0 {
        debug!(
            source = %tag,
            money = stats.unparseable_money,
            tenure = stats.unparseable_tenure,
            "Absorbed unparseable numeric cells"
        );
    }
    info!(
        source = %tag,
        rows = stats.output_rows,
        remaining_nulls = stats.remaining_nulls,
        imputed_total_charges = stats.imputed_total_charges,
        "Cleaned records"
    );

    Ok((cleaned, stats))
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Extract the first numeric amount from a possibly corrupted money string,
/// e.g. `"$29.85$29.85$29.85"` reads as `29.85`.
pub fn parse_money_text(raw: &str) -> Result<f64> {
    let s = raw.trim();
    if let Some(v) = parse_finite(s) {
        return Ok(v);
    }
    let first = s.trim_start_matches('$').split('$').next().unwrap_or("");
    parse_finite(first.trim()).ok_or_else(|| EltError::Parse {
        value: raw.to_string(),
        target: "money",
    })
}

/// `Ok(None)` for blank or null cells, `Err` for cells with no numeric token.
pub fn coerce_money(value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Int(n) => Ok(Some(*n as f64)),
        Value::Float(f) if f.is_finite() => Ok(Some(*f)),
        Value::Str(s) if s.trim().is_empty() => Ok(None),
        Value::Str(s) => parse_money_text(s).map(Some),
        other => Err(EltError::Parse {
            value: other.to_string(),
            target: "money",
        }),
    }
}

/// Whole, non-negative months. Null reads as zero; fractional values truncate.
pub fn coerce_tenure(value: &Value) -> Result<i64> {
    let months = match value {
        Value::Null => 0,
        Value::Int(n) => *n,
        Value::Bool(b) => *b as i64,
        Value::Float(f) if f.is_finite() => f.trunc() as i64,
        Value::Str(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(n) => n,
                Err(_) => parse_finite(s)
                    .map(|f| f.trunc() as i64)
                    .ok_or_else(|| EltError::Parse {
                        value: s.to_string(),
                        target: "tenure",
                    })?,
            }
        }
        Value::Float(_) => {
            return Err(EltError::Parse {
                value: value.to_string(),
                target: "tenure",
            })
        }
    };
    Ok(months.max(0))
}

/// `{0,1}` from numeric, boolean or Yes/No-like encodings; anything else is 0.
pub fn normalize_senior(value: &Value) -> i64 {
    match value {
        Value::Int(n) => (*n != 0) as i64,
        Value::Float(f) => (f.is_finite() && *f != 0.0) as i64,
        Value::Bool(b) => *b as i64,
        Value::Str(_) => (YesNo::classify(value) == Some(YesNo::Yes)) as i64,
        Value::Null => 0,
    }
}

/// Literal `"Yes"`/`"No"`, title-cased passthrough for anything else, and
/// `"No"` for null.
pub fn normalize_yes_no(value: &Value) -> String {
    YesNo::classify(value).map_or_else(|| "No".to_string(), |yn| yn.label().to_string())
}

fn normalize_gender(value: &Value) -> Value {
    match value.render() {
        Some(text) => Value::Str(capitalize(text.trim())),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::REQUIRED_COLUMNS;

    fn raw_set(rows: Vec<Vec<(&str, Value)>>) -> RecordSet {
        let mut columns: Vec<Column> = REQUIRED_COLUMNS
            .iter()
            .map(|c| Column::new(*c, ColumnType::Any))
            .collect();
        columns.push(Column::new(CUSTOMER_FEEDBACK, ColumnType::Any));
        let mut rs = RecordSet::new(columns.clone());
        for overrides in rows {
            let row = columns
                .iter()
                .map(|c| {
                    overrides
                        .iter()
                        .find(|(name, _)| *name == c.name)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_else(|| default_cell(&c.name))
                })
                .collect();
            rs.push_row(row).unwrap();
        }
        rs
    }

    fn default_cell(column: &str) -> Value {
        match column {
            CUSTOMER_ID => Value::Str("C0".into()),
            GENDER => Value::Str("Female".into()),
            SENIOR_CITIZEN => Value::Int(0),
            TENURE => Value::Str("12".into()),
            MONTHLY_CHARGES => Value::Str("50.0".into()),
            TOTAL_CHARGES => Value::Str("600.0".into()),
            CONTRACT => Value::Str("One year".into()),
            CUSTOMER_FEEDBACK => Value::Null,
            _ => Value::Str("No".into()),
        }
    }

    fn cell<'a>(rs: &'a RecordSet, row: usize, column: &str) -> &'a Value {
        &rs.rows()[row][rs.column_index(column).unwrap()]
    }

    #[test]
    fn corrupted_money_keeps_first_amount() {
        assert_eq!(parse_money_text("$29.85$29.85$29.85").unwrap(), 29.85);
        assert_eq!(parse_money_text(" 42.5 ").unwrap(), 42.5);
        assert_eq!(parse_money_text("$$10$20").unwrap(), 10.0);
        assert!(parse_money_text("abc").is_err());
        assert!(parse_money_text("NaN").is_err());
    }

    #[test]
    fn blank_total_is_imputed_from_monthly_and_tenure() {
        let rs = raw_set(vec![vec![
            (CUSTOMER_ID, Value::Str("C1".into())),
            (TOTAL_CHARGES, Value::Str(" ".into())),
            (MONTHLY_CHARGES, Value::Float(70.0)),
            (TENURE, Value::Int(5)),
        ]]);
        let (out, stats) = clean_with_stats(&rs, SourceTag::Csv).unwrap();
        assert_eq!(cell(&out, 0, TOTAL_CHARGES), &Value::Float(350.0));
        assert_eq!(stats.imputed_total_charges, 1);
    }

    #[test]
    fn unparseable_money_feeds_imputation() {
        let rs = raw_set(vec![vec![
            (MONTHLY_CHARGES, Value::Str("garbage".into())),
            (TOTAL_CHARGES, Value::Str("also garbage".into())),
        ]]);
        let (out, stats) = clean_with_stats(&rs, SourceTag::Json).unwrap();
        assert_eq!(cell(&out, 0, MONTHLY_CHARGES), &Value::Null);
        assert_eq!(cell(&out, 0, TOTAL_CHARGES), &Value::Null);
        assert_eq!(stats.unparseable_money, 2);
    }

    #[test]
    fn tenure_is_whole_and_non_negative() {
        assert_eq!(coerce_tenure(&Value::Str("7.9".into())).unwrap(), 7);
        assert_eq!(coerce_tenure(&Value::Int(-3)).unwrap(), 0);
        assert_eq!(coerce_tenure(&Value::Null).unwrap(), 0);
        assert!(coerce_tenure(&Value::Str("twelve".into())).is_err());

        let rs = raw_set(vec![vec![(TENURE, Value::Str("twelve".into()))]]);
        let out = clean(&rs, SourceTag::Csv).unwrap();
        assert_eq!(cell(&out, 0, TENURE), &Value::Int(0));
    }

    #[test]
    fn senior_citizen_encodings() {
        for yes in [Value::Str("Yes".into()), Value::Int(1), Value::Str("1".into()), Value::Bool(true)] {
            assert_eq!(normalize_senior(&yes), 1, "{yes:?}");
        }
        for no in [Value::Str("No".into()), Value::Int(0), Value::Str("0".into()), Value::Null] {
            assert_eq!(normalize_senior(&no), 0, "{no:?}");
        }
    }

    #[test]
    fn yes_no_columns_are_literal() {
        assert_eq!(normalize_yes_no(&Value::Str("yes".into())), "Yes");
        assert_eq!(normalize_yes_no(&Value::Bool(false)), "No");
        assert_eq!(normalize_yes_no(&Value::Int(1)), "Yes");
        assert_eq!(normalize_yes_no(&Value::Null), "No");
        assert_eq!(normalize_yes_no(&Value::Str("  mAYbe ".into())), "Maybe");
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let rs = raw_set(vec![
            vec![(CUSTOMER_ID, Value::Str("C1".into())), (GENDER, Value::Str("male".into()))],
            vec![(CUSTOMER_ID, Value::Str("C2".into()))],
            vec![(CUSTOMER_ID, Value::Str("C1".into())), (GENDER, Value::Str("female".into()))],
        ]);
        let (out, stats) = clean_with_stats(&rs, SourceTag::Csv).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(stats.duplicates_dropped, 1);
        assert_eq!(cell(&out, 0, CUSTOMER_ID), &Value::Str("C1".into()));
        assert_eq!(cell(&out, 0, GENDER), &Value::Str("Male".into()));
        assert_eq!(cell(&out, 1, CUSTOMER_ID), &Value::Str("C2".into()));
    }

    #[test]
    fn empty_customer_id_aborts() {
        let rs = raw_set(vec![vec![(CUSTOMER_ID, Value::Null)]]);
        let err = clean(&rs, SourceTag::Csv).unwrap_err();
        assert!(matches!(err, EltError::Schema { .. }));
    }

    #[test]
    fn missing_required_column_aborts() {
        let rs = raw_set(vec![vec![]]).project(&[CUSTOMER_ID, GENDER]);
        let err = clean(&rs, SourceTag::Json).unwrap_err();
        assert!(matches!(err, EltError::Schema { .. }));
    }

    #[test]
    fn cleaning_is_idempotent() {
        let rs = raw_set(vec![
            vec![
                (CUSTOMER_ID, Value::Int(17)),
                (GENDER, Value::Str(" fEmale ".into())),
                (SENIOR_CITIZEN, Value::Str("Yes".into())),
                (PARTNER, Value::Bool(true)),
                (CHURN, Value::Str("maybe".into())),
                (MONTHLY_CHARGES, Value::Str("$19.99$19.99".into())),
                (TOTAL_CHARGES, Value::Null),
                (TENURE, Value::Float(3.7)),
            ],
            vec![(CUSTOMER_ID, Value::Str("C2".into())), (MONTHLY_CHARGES, Value::Str("??".into()))],
            vec![(CUSTOMER_ID, Value::Int(17))],
        ]);
        let once = clean(&rs, SourceTag::Json).unwrap();
        let twice = clean(&once, SourceTag::Json).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn passthrough_columns_are_untouched() {
        let rs = raw_set(vec![vec![(CUSTOMER_FEEDBACK, Value::Str("Too expensive".into()))]]);
        let out = clean(&rs, SourceTag::Csv).unwrap();
        assert_eq!(cell(&out, 0, CUSTOMER_FEEDBACK), &Value::Str("Too expensive".into()));
        assert_eq!(cell(&out, 0, CONTRACT), &Value::Str("One year".into()));
    }
}
