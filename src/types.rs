use crate::error::{EltError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator for the two source branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Csv,
    Json,
}

impl SourceTag {
    pub const ALL: [SourceTag; 2] = [SourceTag::Csv, SourceTag::Json];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Csv => "csv",
            SourceTag::Json => "json",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic type of a record set column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Str,
    Int,
    Float,
    Bool,
    /// Nullable value of whatever kind the source delivered.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view of integer and float cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Textual rendering of a non-null cell. Floats with no fractional part keep
    /// a trailing `.0` so `1.0` never reads as the integer `1`.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Str(s) => Some(s.clone()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(f) if !f.is_finite() => None,
            Value::Float(f) if f.fract() == 0.0 => Some(format!("{f:.1}")),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(true) => Some("True".to_string()),
            Value::Bool(false) => Some("False".to_string()),
        }
    }

    pub fn from_opt_f64(v: Option<f64>) -> Value {
        v.filter(|f| f.is_finite()).map_or(Value::Null, Value::Float)
    }

    pub fn from_opt_bool(v: Option<bool>) -> Value {
        v.map_or(Value::Null, Value::Bool)
    }

    pub fn from_opt_str(v: Option<&str>) -> Value {
        v.map_or(Value::Null, |s| Value::Str(s.to_string()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.render().as_deref().unwrap_or(""))
    }
}

/// Three-way outcome of a Yes/No classification. Null cells classify to `None`
/// so "no data" stays distinguishable from an explicit "No".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YesNo {
    Yes,
    No,
    Other(String),
}

impl YesNo {
    pub fn classify(value: &Value) -> Option<YesNo> {
        let text = value.render()?;
        let trimmed = text.trim();
        Some(match trimmed.to_lowercase().as_str() {
            "yes" | "true" | "1" => YesNo::Yes,
            "no" | "false" | "0" => YesNo::No,
            _ => YesNo::Other(capitalize(trimmed)),
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            YesNo::Yes => Some(true),
            YesNo::No => Some(false),
            YesNo::Other(_) => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            YesNo::Yes => "Yes",
            YesNo::No => "No",
            YesNo::Other(s) => s,
        }
    }
}

/// Upper-cases the first character and lower-cases the rest.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Typed rows that can be laid out as a record set.
pub trait TableRow {
    fn columns() -> Vec<Column>;
    fn into_row(self) -> Vec<Value>;
}

/// Ordered rows sharing one fixed column schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl RecordSet {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows<T: TableRow>(rows: impl IntoIterator<Item = T>) -> Self {
        Self {
            columns: T::columns(),
            rows: rows.into_iter().map(TableRow::into_row).collect(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Index of a column the caller cannot work without.
    pub fn require_column(&self, name: &str, context: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| EltError::missing_column(context, name))
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EltError::Schema {
                context: "record set".to_string(),
                message: format!(
                    "row has {} cells but the schema declares {} columns",
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Cell lookup by column name; absent columns read as null.
    pub fn value<'a>(&'a self, row: &'a [Value], column: &str) -> &'a Value {
        const NULL: &Value = &Value::Null;
        self.column_index(column).map_or(NULL, |i| &row[i])
    }

    /// New record set with extra columns appended. Each value vector must have
    /// one entry per existing row.
    pub fn with_columns(&self, extra: Vec<(Column, Vec<Value>)>) -> Result<RecordSet> {
        for (column, values) in &extra {
            if values.len() != self.rows.len() {
                return Err(EltError::Schema {
                    context: "record set".to_string(),
                    message: format!(
                        "derived column '{}' has {} values for {} rows",
                        column.name,
                        values.len(),
                        self.rows.len()
                    ),
                });
            }
        }

        let mut columns = self.columns.clone();
        let mut rows = self.rows.clone();
        for (column, values) in extra {
            columns.push(column);
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
        Ok(RecordSet { columns, rows })
    }

    /// Ordered subset of the named columns that are present.
    pub fn project(&self, names: &[&str]) -> RecordSet {
        let picked: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        RecordSet {
            columns: picked.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| picked.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Same rows with one column renamed.
    pub fn rename_column(mut self, from: &str, to: &str) -> RecordSet {
        if let Some(i) = self.column_index(from) {
            self.columns[i].name = to.to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_column_set() -> RecordSet {
        let mut rs = RecordSet::new(vec![
            Column::new("a", ColumnType::Str),
            Column::new("b", ColumnType::Int),
        ]);
        rs.push_row(vec![Value::Str("x".into()), Value::Int(1)]).unwrap();
        rs.push_row(vec![Value::Str("y".into()), Value::Int(2)]).unwrap();
        rs
    }

    #[test]
    fn push_row_rejects_wrong_width() {
        let mut rs = two_column_set();
        let err = rs.push_row(vec![Value::Null]).unwrap_err();
        assert!(matches!(err, EltError::Schema { .. }));
        assert_eq!(rs.len(), 2);
    }

    #[test]
    fn with_columns_leaves_input_untouched() {
        let rs = two_column_set();
        let out = rs
            .with_columns(vec![(
                Column::new("c", ColumnType::Bool),
                vec![Value::Bool(true), Value::Bool(false)],
            )])
            .unwrap();
        assert_eq!(rs.columns().len(), 2);
        assert_eq!(out.column_names(), vec!["a", "b", "c"]);
        assert_eq!(out.rows()[1][2], Value::Bool(false));
    }

    #[test]
    fn with_columns_checks_length() {
        let rs = two_column_set();
        let err = rs
            .with_columns(vec![(Column::new("c", ColumnType::Int), vec![Value::Int(1)])])
            .unwrap_err();
        assert!(matches!(err, EltError::Schema { .. }));
    }

    #[test]
    fn project_keeps_requested_order_and_skips_missing() {
        let rs = two_column_set();
        let p = rs.project(&["b", "missing", "a"]);
        assert_eq!(p.column_names(), vec!["b", "a"]);
        assert_eq!(p.rows()[0], vec![Value::Int(1), Value::Str("x".into())]);
    }

    #[test]
    fn yes_no_classification() {
        assert_eq!(YesNo::classify(&Value::Str(" YES ".into())), Some(YesNo::Yes));
        assert_eq!(YesNo::classify(&Value::Bool(false)), Some(YesNo::No));
        assert_eq!(YesNo::classify(&Value::Int(1)), Some(YesNo::Yes));
        assert_eq!(
            YesNo::classify(&Value::Str("maybe".into())),
            Some(YesNo::Other("Maybe".into()))
        );
        assert_eq!(YesNo::classify(&Value::Null), None);
    }

    #[test]
    fn float_render_keeps_decimal_point() {
        assert_eq!(Value::Float(1.0).render().as_deref(), Some("1.0"));
        assert_eq!(Value::Float(29.85).render().as_deref(), Some("29.85"));
        assert_eq!(Value::Float(f64::NAN).render(), None);
    }

    #[test]
    fn capitalize_lowercases_tail() {
        assert_eq!(capitalize("fEMALE"), "Female");
        assert_eq!(capitalize(""), "");
    }
}
