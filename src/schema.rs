//! Schema inference: semantic typing, per-column statistics, and validation.
//!
//! This module owns the [`Schema`] struct (the canonical description of a
//! loaded table), the [`SemanticType`] enum, and the inference engine that
//! maps a [`Table`] to a schema in a single pass per column.
//!
//! ## Responsibilities
//!
//! - Semantic typing, including the time-dimension override that forces
//!   integer-coded period columns (`month_id` = `202401`) onto the time axis
//! - Null counts, distinct counts (categorical), min/max/mean/median (numeric)
//! - Sanitized sample values and a 10-row preview, guaranteed free of
//!   NaN/±infinity before serialization
//! - Dataset bounds validation, reported as data rather than errors

use std::{collections::BTreeMap, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::table::{Column, ColumnData, Scalar, Table};

pub const MIN_ROWS: usize = 2;
pub const MAX_ROWS: usize = 100_000;
pub const MAX_COLUMNS: usize = 50;
pub const SAMPLE_VALUES: usize = 5;
pub const PREVIEW_ROWS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Numeric,
    Categorical,
    Datetime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub semantic_type: SemanticType,
    pub null_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct_count: Option<usize>,
    pub sample_values: Vec<Scalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_stats: Option<NumericStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub columns: Vec<ColumnDescriptor>,
    pub row_count: usize,
    pub preview: Vec<BTreeMap<String, Scalar>>,
}

impl Schema {
    pub fn descriptor(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Outcome of dataset-shape validation. A failed validation is data, not an
/// error; the caller decides how to surface the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Validation {
    fn pass() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

fn time_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|_)(month|week|day|quarter|period|year)").expect("valid regex")
    })
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"_id$|_code$|_cip$|id|code").expect("valid regex"))
}

/// True when a column name signals a calendar period even though its values
/// are numeric. Many real datasets encode periods as integer codes
/// (`month_id` = `202401`); those must chart as a time axis, not a metric.
pub fn is_time_dimension_name(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    if lowered.contains("date") || lowered == "year" {
        return true;
    }
    lowered.ends_with("_id") && time_token_pattern().is_match(&lowered)
}

/// True when a column name signals an identifier or code rather than a
/// measurable quantity.
pub fn is_identifier_name(name: &str) -> bool {
    identifier_pattern().is_match(&name.to_ascii_lowercase())
}

/// Maps a column to its semantic type.
///
/// Timestamp storage is always `datetime`. Numeric storage is `numeric`
/// unless the name marks it as a time dimension. Text storage is
/// `categorical` unless a 100-row sample parses entirely as dates (a column
/// the loader would normally have promoted already; the rule is restated here
/// so tables built directly through the API type the same way).
pub fn infer_semantic_type(column: &Column) -> SemanticType {
    match &column.data {
        ColumnData::Timestamp(_) => SemanticType::Datetime,
        ColumnData::Numeric(_) => {
            if is_time_dimension_name(&column.name) {
                SemanticType::Datetime
            } else {
                SemanticType::Numeric
            }
        }
        ColumnData::Text(values) => {
            let sample: Vec<&String> = values
                .iter()
                .flatten()
                .take(crate::loader::DATE_SAMPLE_ROWS)
                .collect();
            if !sample.is_empty()
                && sample
                    .iter()
                    .all(|v| crate::loader::parse_timestamp(v).is_some())
            {
                SemanticType::Datetime
            } else {
                SemanticType::Categorical
            }
        }
    }
}

fn numeric_stats(column: &Column) -> Option<NumericStats> {
    let ColumnData::Numeric(values) = &column.data else {
        return None;
    };
    let mut finite: Vec<f64> = values
        .iter()
        .copied()
        .flatten()
        .filter(|n| n.is_finite())
        .collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    let count = finite.len();
    let sum: f64 = finite.iter().sum();
    let mid = count / 2;
    let median = if count % 2 == 0 {
        (finite[mid - 1] + finite[mid]) / 2.0
    } else {
        finite[mid]
    };
    Some(NumericStats {
        min: finite[0],
        max: finite[count - 1],
        mean: sum / count as f64,
        median,
    })
}

fn sample_values(column: &Column) -> Vec<Scalar> {
    let mut samples = Vec::with_capacity(SAMPLE_VALUES);
    for row in 0..column.len() {
        let value = column.data.scalar_at(row);
        if !value.is_null() {
            samples.push(value);
            if samples.len() == SAMPLE_VALUES {
                break;
            }
        }
    }
    samples
}

/// Maps a table to its schema. Deterministic and recomputed wholesale: the
/// same table always yields a byte-identical serialized schema, and a merged
/// table gets a fresh schema rather than a patched one.
pub fn analyze_schema(table: &Table) -> Schema {
    let columns = table
        .columns()
        .iter()
        .map(|column| {
            let semantic_type = infer_semantic_type(column);
            ColumnDescriptor {
                name: column.name.clone(),
                semantic_type,
                null_count: column.data.null_count(),
                distinct_count: (semantic_type == SemanticType::Categorical)
                    .then(|| column.distinct_count()),
                sample_values: sample_values(column),
                numeric_stats: (semantic_type == SemanticType::Numeric)
                    .then(|| numeric_stats(column))
                    .flatten(),
            }
        })
        .collect();

    let preview = (0..table.row_count().min(PREVIEW_ROWS))
        .map(|row| {
            table
                .columns()
                .iter()
                .map(|column| (column.name.clone(), column.data.scalar_at(row)))
                .collect()
        })
        .collect();

    Schema {
        columns,
        row_count: table.row_count(),
        preview,
    }
}

/// Checks the dataset bounds that keep downstream compute tractable. Bounds
/// are inclusive at the limits: exactly [`MAX_ROWS`] rows or [`MAX_COLUMNS`]
/// columns is still valid.
pub fn validate(table: &Table) -> Validation {
    let rows = table.row_count();
    if rows < MIN_ROWS {
        return Validation::fail(format!(
            "dataset has {rows} row(s); at least {MIN_ROWS} required"
        ));
    }
    if rows > MAX_ROWS {
        return Validation::fail(format!(
            "dataset has {rows} rows; at most {MAX_ROWS} supported"
        ));
    }
    if table.column_count() > MAX_COLUMNS {
        return Validation::fail(format!(
            "dataset has {} columns; at most {MAX_COLUMNS} supported",
            table.column_count()
        ));
    }
    let numeric_columns = table
        .columns()
        .iter()
        .filter(|c| infer_semantic_type(c) == SemanticType::Numeric)
        .count();
    if numeric_columns == 0 {
        return Validation::fail(
            "dataset has no numeric columns; at least one numeric column is required for analysis",
        );
    }
    Validation::pass()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnData};

    fn numeric(name: &str, values: &[f64]) -> Column {
        Column::new(
            name,
            ColumnData::Numeric(values.iter().copied().map(Some).collect()),
        )
    }

    fn text(name: &str, values: &[&str]) -> Column {
        Column::new(
            name,
            ColumnData::Text(values.iter().map(|v| Some(v.to_string())).collect()),
        )
    }

    fn simple_table() -> Table {
        Table::new(vec![
            text("region", &["north", "south", "north"]),
            numeric("sales", &[10.0, 20.0, 30.0]),
        ])
        .expect("table")
    }

    #[test]
    fn time_dimension_names_are_recognized() {
        assert!(is_time_dimension_name("month_id"));
        assert!(is_time_dimension_name("fiscal_quarter_id"));
        assert!(is_time_dimension_name("year"));
        assert!(is_time_dimension_name("order_date"));
        assert!(!is_time_dimension_name("user_id"));
        assert!(!is_time_dimension_name("price"));
    }

    #[test]
    fn integer_coded_month_id_is_datetime() {
        let column = numeric("month_id", &[202401.0, 202402.0]);
        assert_eq!(infer_semantic_type(&column), SemanticType::Datetime);
    }

    #[test]
    fn plain_numeric_column_is_numeric() {
        let column = numeric("sales", &[1.0, 2.0]);
        assert_eq!(infer_semantic_type(&column), SemanticType::Numeric);
    }

    #[test]
    fn schema_counts_match_table_shape() {
        let table = simple_table();
        let schema = analyze_schema(&table);
        assert_eq!(schema.columns.len(), table.column_count());
        assert_eq!(schema.row_count, table.row_count());
        assert_eq!(schema.preview.len(), 3);
    }

    #[test]
    fn categorical_columns_report_distinct_counts() {
        let schema = analyze_schema(&simple_table());
        let region = schema.descriptor("region").expect("region");
        assert_eq!(region.distinct_count, Some(2));
        assert!(region.numeric_stats.is_none());
    }

    #[test]
    fn numeric_stats_cover_min_max_mean_median() {
        let schema = analyze_schema(&simple_table());
        let stats = schema
            .descriptor("sales")
            .and_then(|d| d.numeric_stats.clone())
            .expect("stats");
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.mean, 20.0);
        assert_eq!(stats.median, 20.0);
    }

    #[test]
    fn numeric_stats_skip_non_finite_values() {
        let column = Column::new(
            "v",
            ColumnData::Numeric(vec![Some(1.0), Some(f64::NAN), Some(3.0)]),
        );
        let table = Table::new(vec![column]).expect("table");
        let schema = analyze_schema(&table);
        let stats = schema.columns[0].numeric_stats.clone().expect("stats");
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.mean, 2.0);
    }

    #[test]
    fn analyze_schema_is_deterministic() {
        let table = simple_table();
        let first = serde_json::to_string(&analyze_schema(&table)).unwrap();
        let second = serde_json::to_string(&analyze_schema(&table)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn validate_accepts_in_bounds_table() {
        let validation = validate(&simple_table());
        assert!(validation.ok);
        assert!(validation.reason.is_none());
    }

    #[test]
    fn validate_rejects_single_row() {
        let table = Table::new(vec![numeric("sales", &[1.0])]).expect("table");
        let validation = validate(&table);
        assert!(!validation.ok);
        assert!(validation.reason.unwrap().contains("at least 2"));
    }

    #[test]
    fn validate_rejects_zero_numeric_columns() {
        let table = Table::new(vec![text("region", &["a", "b"])]).expect("table");
        let validation = validate(&table);
        assert!(!validation.ok);
        assert!(validation.reason.unwrap().contains("numeric column"));
    }

    #[test]
    fn validate_rejects_too_many_columns() {
        let columns: Vec<Column> = (0..=MAX_COLUMNS)
            .map(|idx| numeric(&format!("c{idx}"), &[1.0, 2.0]))
            .collect();
        let table = Table::new(columns).expect("table");
        assert!(!validate(&table).ok);
    }

    #[test]
    fn validate_accepts_exact_column_limit() {
        let columns: Vec<Column> = (0..MAX_COLUMNS)
            .map(|idx| numeric(&format!("c{idx}"), &[1.0, 2.0]))
            .collect();
        let table = Table::new(columns).expect("table");
        assert!(validate(&table).ok);
    }

    #[test]
    fn preview_sanitizes_non_finite_cells() {
        let column = Column::new("v", ColumnData::Numeric(vec![Some(f64::NAN), Some(2.0)]));
        let table = Table::new(vec![column]).expect("table");
        let schema = analyze_schema(&table);
        assert_eq!(schema.preview[0]["v"], Scalar::Null);
        let json = serde_json::to_string(&schema.preview[0]).unwrap();
        assert!(json.contains("null"));
    }
}
