use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single scalar cell of a query result.
///
/// `Int` and `Float` are both "numbers"; the split only keeps integral values
/// printing without a fractional part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric coercion used by sorting. Only finite values count.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        let number = match self {
            Self::Null => return None,
            Self::Bool(value) => f64::from(u8::from(*value)),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(value) => *value as f64,
            Self::Float(value) => *value,
            Self::Text(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok()?
            }
        };
        number.is_finite().then_some(number)
    }

    /// Text shown in the results grid; nulls read `NULL`.
    #[must_use]
    pub fn display_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed("NULL"),
            Self::Text(value) => Cow::Borrowed(value.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Text written to exports; nulls become the empty string.
    #[must_use]
    pub fn export_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed(""),
            other => other.display_text(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultSetError {
    #[error("row {row} has {actual} cells but the result has {expected} columns")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Column names plus positionally aligned rows. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl TabularResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self, ResultSetError> {
        let expected = columns.len();
        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != expected)
        {
            return Err(ResultSetError::RaggedRow {
                row,
                expected,
                actual: cells.len(),
            });
        }

        Ok(Self { columns, rows })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{CellValue, ResultSetError, TabularResult};

    #[test]
    fn rejects_rows_that_do_not_match_column_count() {
        let err = TabularResult::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![CellValue::from(1), CellValue::from("a")],
                vec![CellValue::from(2)],
            ],
        )
        .expect_err("ragged row should be rejected");

        assert_eq!(
            err,
            ResultSetError::RaggedRow {
                row: 1,
                expected: 2,
                actual: 1,
            }
        );
    }

    #[test]
    fn null_renders_differently_on_screen_and_in_exports() {
        assert_eq!(CellValue::Null.display_text(), "NULL");
        assert_eq!(CellValue::Null.export_text(), "");
        assert_eq!(CellValue::from(None::<i64>), CellValue::Null);
    }

    #[test]
    fn numbers_and_booleans_use_default_text_form() {
        assert_eq!(CellValue::from(1001).display_text(), "1001");
        assert_eq!(CellValue::from(249.5).display_text(), "249.5");
        assert_eq!(CellValue::from(75.0).display_text(), "75");
        assert_eq!(CellValue::from(false).export_text(), "false");
        assert_eq!(CellValue::from(0).export_text(), "0");
    }

    #[test]
    fn numeric_coercion_accepts_only_finite_values() {
        assert_eq!(CellValue::from(" 42 ").as_number(), Some(42.0));
        assert_eq!(CellValue::from(true).as_number(), Some(1.0));
        assert_eq!(CellValue::from("").as_number(), None);
        assert_eq!(CellValue::from("inf").as_number(), None);
        assert_eq!(CellValue::from("NaN").as_number(), None);
        assert_eq!(CellValue::from("pending").as_number(), None);
        assert_eq!(CellValue::Null.as_number(), None);
    }

    #[test]
    fn cells_round_trip_through_json_as_plain_scalars() {
        let cells = vec![
            CellValue::Null,
            CellValue::from(true),
            CellValue::from(7),
            CellValue::from(1.5),
            CellValue::from("x"),
        ];
        let rendered = serde_json::to_string(&cells).expect("cells serialize");
        assert_eq!(rendered, r#"[null,true,7,1.5,"x"]"#);

        let parsed: Vec<CellValue> = serde_json::from_str(&rendered).expect("cells parse");
        assert_eq!(parsed, cells);
    }
}
