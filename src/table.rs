//! In-memory table model and render-safe scalar values.
//!
//! A [`Table`] is an ordered collection of named [`Column`]s of equal length.
//! Each column is classified exactly once (by the loader or the caller) into
//! one of three storage shapes: numeric, text, or timestamp. Downstream
//! heuristics match on the [`ColumnData`] tag instead of re-inspecting raw
//! values.
//!
//! [`Scalar`] is the only value type that crosses the serialization boundary.
//! Its `Serialize` impl emits `null` for NaN and ±infinity, which keeps every
//! persisted shape (schemas, chart payloads, previews) free of tokens that
//! most wire formats cannot represent.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::error::PipelineError;

/// A single render-ready value. Non-finite numbers serialize as `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Null,
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Number(n) => !n.is_finite(),
            Scalar::Text(_) => false,
        }
    }

    /// Canonical display form, used for grouping keys and join keys.
    pub fn display(&self) -> String {
        match self {
            Scalar::Number(n) if !n.is_finite() => String::new(),
            Scalar::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{n:.0}")
                } else {
                    n.to_string()
                }
            }
            Scalar::Text(s) => s.clone(),
            Scalar::Null => String::new(),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Scalar::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            Scalar::Number(_) | Scalar::Null => serializer.serialize_none(),
            Scalar::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.time() == chrono::NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Column storage, decided once when the table is built.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Text(values) => values.len(),
            ColumnData::Timestamp(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values
                .iter()
                .filter(|v| !matches!(v, Some(n) if n.is_finite()))
                .count(),
            ColumnData::Text(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnData::Timestamp(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// Sanitized scalar at `row`; out-of-range rows and non-finite numbers
    /// surface as [`Scalar::Null`].
    pub fn scalar_at(&self, row: usize) -> Scalar {
        match self {
            ColumnData::Numeric(values) => match values.get(row) {
                Some(Some(n)) if n.is_finite() => Scalar::Number(*n),
                _ => Scalar::Null,
            },
            ColumnData::Text(values) => match values.get(row) {
                Some(Some(s)) => Scalar::Text(s.clone()),
                _ => Scalar::Null,
            },
            ColumnData::Timestamp(values) => match values.get(row) {
                Some(Some(ts)) => Scalar::Text(format_timestamp(ts)),
                _ => Scalar::Null,
            },
        }
    }

    /// Finite numeric value at `row`, when this is numeric storage.
    pub fn number_at(&self, row: usize) -> Option<f64> {
        match self {
            ColumnData::Numeric(values) => values
                .get(row)
                .copied()
                .flatten()
                .filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn timestamp_at(&self, row: usize) -> Option<NaiveDateTime> {
        match self {
            ColumnData::Timestamp(values) => values.get(row).copied().flatten(),
            _ => None,
        }
    }

    /// Builds a new column by picking rows from this one. `None` entries
    /// become nulls; used to assemble join output without restringing values.
    pub fn take(&self, rows: &[Option<usize>]) -> ColumnData {
        match self {
            ColumnData::Numeric(values) => ColumnData::Numeric(
                rows.iter()
                    .map(|row| row.and_then(|idx| values.get(idx).copied().flatten()))
                    .collect(),
            ),
            ColumnData::Text(values) => ColumnData::Text(
                rows.iter()
                    .map(|row| row.and_then(|idx| values.get(idx).cloned().flatten()))
                    .collect(),
            ),
            ColumnData::Timestamp(values) => ColumnData::Timestamp(
                rows.iter()
                    .map(|row| row.and_then(|idx| values.get(idx).copied().flatten()))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Count of distinct non-null display values.
    pub fn distinct_count(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        for row in 0..self.len() {
            let value = self.data.scalar_at(row);
            if !value.is_null() {
                seen.insert(value.display());
            }
        }
        seen.len()
    }
}

/// An in-memory tabular dataset. Immutable once constructed; every pipeline
/// stage reads it in place and builds fresh outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Builds a table, enforcing the equal-length invariant across columns.
    pub fn new(columns: Vec<Column>) -> Result<Self, PipelineError> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            for column in &columns {
                if column.len() != expected {
                    return Err(PipelineError::ColumnMismatch(format!(
                        "column '{}' has {} row(s), expected {}",
                        column.name,
                        column.len(),
                        expected
                    )));
                }
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
