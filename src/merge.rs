//! Merge/join engine: compatibility validation, join execution, and schema
//! re-inference.
//!
//! Validation never mutates either table and reports heuristic cardinality
//! estimates only — the inner-join estimate
//! (`|A| × matching_keys / max(|unique(A.key)|, 1)`) is an advisory preview
//! number, not a prediction the executed join is reconciled against.
//!
//! Execution is a hash join on the display value of the key columns. A join
//! that produces zero rows is an error distinct from "valid but empty": in
//! practice it means the nominated keys do not match, and callers should
//! surface it prominently rather than accept empty output.

use std::collections::{HashMap, HashSet};

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    error::PipelineError,
    schema::{Schema, analyze_schema},
    table::{Column, Scalar, Table},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Outer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EstimatedRows {
    pub inner: usize,
    pub left: usize,
    pub right: usize,
    pub outer: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeReport {
    pub compatible: bool,
    pub warnings: Vec<String>,
    pub estimated_rows: EstimatedRows,
}

fn storage_name(column: &Column) -> &'static str {
    match column.data {
        crate::table::ColumnData::Numeric(_) => "numeric",
        crate::table::ColumnData::Text(_) => "text",
        crate::table::ColumnData::Timestamp(_) => "timestamp",
    }
}

/// Non-null key display value for one row, used for matching. Null keys
/// never match anything.
fn key_at(column: &Column, row: usize) -> Option<String> {
    let value = column.data.scalar_at(row);
    (!value.is_null()).then(|| value.display())
}

fn distinct_keys(column: &Column) -> HashSet<String> {
    (0..column.len()).filter_map(|row| key_at(column, row)).collect()
}

/// Checks whether a join between `a` and `b` on the nominated keys is
/// feasible, without executing it or touching either table.
pub fn validate_merge_compatibility(
    a: &Table,
    b: &Table,
    left_key: &str,
    right_key: &str,
) -> MergeReport {
    let mut warnings = Vec::new();

    let left = a.column(left_key);
    let right = b.column(right_key);
    if left.is_none() {
        warnings.push(format!("left key column '{left_key}' not found"));
    }
    if right.is_none() {
        warnings.push(format!("right key column '{right_key}' not found"));
    }
    let (Some(left), Some(right)) = (left, right) else {
        return MergeReport {
            compatible: false,
            warnings,
            estimated_rows: EstimatedRows::default(),
        };
    };

    if storage_name(left) != storage_name(right) {
        warnings.push(format!(
            "key type mismatch: left '{left_key}' is {}, right '{right_key}' is {}; \
             joins across mismatched key types typically match zero rows",
            storage_name(left),
            storage_name(right)
        ));
    }

    let left_distinct = distinct_keys(left);
    let right_distinct = distinct_keys(right);
    let matching = left_distinct.intersection(&right_distinct).count();
    if matching == 0 {
        warnings.push("key columns share no common values; an inner join would be empty".into());
    }

    let rows_a = a.row_count();
    let rows_b = b.row_count();
    let inner = rows_a * matching / left_distinct.len().max(1);
    let estimated_rows = EstimatedRows {
        inner,
        left: rows_a,
        right: rows_b,
        outer: (rows_a + rows_b).saturating_sub(inner),
    };

    MergeReport {
        compatible: true,
        warnings,
        estimated_rows,
    }
}

/// Executes the join and re-derives a schema for the result. Shared non-key
/// column names take the respective suffix; the merged table is passed back
/// through schema inference wholesale, never patched incrementally.
pub fn merge_tables(
    a: &Table,
    b: &Table,
    left_key: &str,
    right_key: &str,
    kind: JoinKind,
    left_suffix: &str,
    right_suffix: &str,
) -> Result<(Table, Schema), PipelineError> {
    let left = a
        .column(left_key)
        .ok_or_else(|| PipelineError::MergeKey(format!("left key column '{left_key}' not found")))?;
    let right = b.column(right_key).ok_or_else(|| {
        PipelineError::MergeKey(format!("right key column '{right_key}' not found"))
    })?;

    let mut right_lookup: HashMap<String, Vec<usize>> = HashMap::new();
    for row in 0..right.len() {
        if let Some(key) = key_at(right, row) {
            right_lookup.entry(key).or_default().push(row);
        }
    }

    // Row pairs of the output: (left row, right row), either side absent for
    // unmatched rows kept by the join kind.
    let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::new();
    let mut matched_right: HashSet<usize> = HashSet::new();
    let keep_left = matches!(kind, JoinKind::Left | JoinKind::Outer);
    let keep_right = matches!(kind, JoinKind::Right | JoinKind::Outer);

    for row in 0..left.len() {
        let bucket = key_at(left, row).and_then(|key| right_lookup.get(&key));
        match bucket {
            Some(rows) => {
                for &right_row in rows {
                    matched_right.insert(right_row);
                    pairs.push((Some(row), Some(right_row)));
                }
            }
            None if keep_left => pairs.push((Some(row), None)),
            None => {}
        }
    }
    if keep_right {
        for row in 0..right.len() {
            if !matched_right.contains(&row) {
                pairs.push((None, Some(row)));
            }
        }
    }

    if pairs.is_empty() {
        return Err(PipelineError::MergeKey(format!(
            "join on '{left_key}' = '{right_key}' produced no rows; \
             the key columns most likely do not match"
        )));
    }

    let left_rows: Vec<Option<usize>> = pairs.iter().map(|(l, _)| *l).collect();
    let right_rows: Vec<Option<usize>> = pairs.iter().map(|(_, r)| *r).collect();
    let shared: HashSet<&str> = a
        .column_names()
        .into_iter()
        .filter(|name| b.column(name).is_some())
        .collect();

    let mut columns = Vec::with_capacity(a.column_count() + b.column_count());
    for column in a.columns() {
        let name = if column.name == left_key {
            // Key column keeps its left name; fill from the right side for
            // right-only rows so outer joins keep the key populated.
            column.name.clone()
        } else if shared.contains(column.name.as_str()) {
            format!("{}{left_suffix}", column.name)
        } else {
            column.name.clone()
        };
        let mut data = column.data.take(&left_rows);
        if column.name == left_key {
            data = fill_key_from_right(&data, right, &right_rows);
        }
        columns.push(Column::new(name, data));
    }
    for column in b.columns() {
        if column.name == right_key {
            continue;
        }
        let name = if shared.contains(column.name.as_str()) {
            format!("{}{right_suffix}", column.name)
        } else {
            column.name.clone()
        };
        columns.push(Column::new(name, column.data.take(&right_rows)));
    }

    let merged = Table::new(columns)?;
    info!(
        "Merged {} + {} row(s) into {} row(s) ({} column(s))",
        a.row_count(),
        b.row_count(),
        merged.row_count(),
        merged.column_count()
    );
    let schema = analyze_schema(&merged);
    Ok((merged, schema))
}

/// For rows that only exist on the right (right/outer joins), the left key
/// column is null after `take`; copy the right key value in when the storage
/// shapes allow it, otherwise leave the null.
fn fill_key_from_right(
    data: &crate::table::ColumnData,
    right_key: &Column,
    right_rows: &[Option<usize>],
) -> crate::table::ColumnData {
    use crate::table::ColumnData;
    match data {
        ColumnData::Numeric(values) => ColumnData::Numeric(
            values
                .iter()
                .enumerate()
                .map(|(idx, value)| {
                    value.or_else(|| {
                        right_rows[idx].and_then(|row| match right_key.data.scalar_at(row) {
                            Scalar::Number(n) => Some(n),
                            _ => None,
                        })
                    })
                })
                .collect(),
        ),
        ColumnData::Text(values) => ColumnData::Text(
            values
                .iter()
                .enumerate()
                .map(|(idx, value)| {
                    value.clone().or_else(|| {
                        right_rows[idx].and_then(|row| {
                            let scalar = right_key.data.scalar_at(row);
                            (!scalar.is_null()).then(|| scalar.display())
                        })
                    })
                })
                .collect(),
        ),
        ColumnData::Timestamp(values) => ColumnData::Timestamp(
            values
                .iter()
                .enumerate()
                .map(|(idx, value)| {
                    value.or_else(|| {
                        right_rows[idx].and_then(|row| right_key.data.timestamp_at(row))
                    })
                })
                .collect(),
        ),
    }
}
