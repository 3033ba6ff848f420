//! Chart recommendation: heuristic candidate generation and oracle-suggested
//! chart construction.
//!
//! Heuristic mode generates every candidate across all priority tiers into a
//! flat list, sorts stably by priority, and truncates — ordering and
//! tie-breaks are explicit rather than implicit in loop nesting. Each
//! candidate builder returns `Result<ChartPayload, SkipReason>`: a failed
//! candidate is logged at debug and dropped, never aborting the batch.
//!
//! Suggestion mode validates each externally supplied binding independently
//! against the schema; invalid suggestions are skipped and the result may
//! legitimately contain fewer charts than requested, including zero.

use std::collections::HashMap;

use itertools::Itertools;
use log::debug;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    schema::{Schema, SemanticType, is_identifier_name, is_time_dimension_name},
    table::{Column, ColumnData, Scalar, Table},
};

pub const DEFAULT_MAX_CHARTS: usize = 4;
pub const MAX_PIE_CATEGORIES: usize = 8;
pub const MAX_BAR_CATEGORIES: usize = 15;
pub const MAX_SCATTER_POINTS: usize = 500;
/// Columns with more than this fraction of nulls are skipped by heuristics.
pub const NULL_EXCLUSION_RATIO: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Scatter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartPoint {
    Xy { x: Scalar, y: Scalar },
    Category { category: String, value: Scalar },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPayload {
    pub chart_kind: ChartKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_column: Option<String>,
    pub data: Vec<ChartPoint>,
    pub priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight: Option<String>,
}

/// A chart binding proposed by an external oracle. Always re-validated here;
/// the oracle is advisory.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartSuggestion {
    pub chart_kind: ChartKind,
    #[serde(default)]
    pub x_column: Option<String>,
    #[serde(default)]
    pub y_column: Option<String>,
    #[serde(default)]
    pub category_column: Option<String>,
    #[serde(default)]
    pub value_column: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub insight: Option<String>,
}

/// Why a single candidate was dropped. Absorbed locally; never propagates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("no data points after dropping nulls")]
    NoData,
    #[error("column '{0}' not found")]
    ColumnMissing(String),
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),
}

/// Produces at most `max_charts` render-ready payloads. With suggestions
/// present the oracle's bindings are validated and materialized; otherwise
/// the heuristic candidate list is used.
pub fn generate_charts(
    table: &Table,
    schema: &Schema,
    suggestions: Option<&[ChartSuggestion]>,
    max_charts: usize,
) -> Vec<ChartPayload> {
    let mut charts = match suggestions {
        Some(suggestions) => suggested_charts(table, schema, suggestions),
        None => heuristic_charts(table),
    };
    charts.sort_by_key(|chart| chart.priority);
    charts.truncate(max_charts);
    charts
}

/// True when heuristics should not consider this column: identifier-style
/// names (unless they mark a time dimension), constant columns, and columns
/// that are mostly null carry no visual signal.
fn is_excluded(column: &Column) -> bool {
    if is_identifier_name(&column.name) && !is_time_dimension_name(&column.name) {
        return true;
    }
    if column.distinct_count() <= 1 {
        return true;
    }
    let rows = column.len();
    rows > 0 && column.data.null_count() as f64 / rows as f64 > NULL_EXCLUSION_RATIO
}

fn heuristic_charts(table: &Table) -> Vec<ChartPayload> {
    let mut datetime_cols = Vec::new();
    let mut numeric_cols = Vec::new();
    let mut categorical_cols = Vec::new();
    for column in table.columns() {
        if is_excluded(column) {
            debug!("Excluding column '{}' from chart heuristics", column.name);
            continue;
        }
        match crate::schema::infer_semantic_type(column) {
            SemanticType::Datetime => datetime_cols.push(column),
            SemanticType::Numeric => numeric_cols.push(column),
            SemanticType::Categorical => categorical_cols.push(column),
        }
    }

    let mut charts = Vec::new();
    let mut push = |candidate: Result<ChartPayload, SkipReason>| match candidate {
        Ok(chart) => charts.push(chart),
        Err(reason) => debug!("Skipping chart candidate: {reason}"),
    };

    for time_col in &datetime_cols {
        for num_col in &numeric_cols {
            push(build_line(time_col, num_col));
        }
    }
    for cat_col in &categorical_cols {
        if cat_col.distinct_count() <= MAX_PIE_CATEGORIES {
            for num_col in &numeric_cols {
                push(build_pie(cat_col, num_col));
            }
        }
    }
    for cat_col in &categorical_cols {
        for num_col in &numeric_cols {
            push(build_bar(cat_col, num_col));
        }
    }
    for (a, b) in numeric_cols.iter().tuple_combinations() {
        push(build_scatter(a, b));
    }

    charts
}

fn suggested_charts(
    table: &Table,
    schema: &Schema,
    suggestions: &[ChartSuggestion],
) -> Vec<ChartPayload> {
    let mut charts = Vec::new();
    for (idx, suggestion) in suggestions.iter().enumerate() {
        match build_suggested(table, schema, suggestion, idx as u8 + 1) {
            Ok(chart) => charts.push(chart),
            Err(reason) => debug!("Skipping suggested chart {}: {reason}", idx + 1),
        }
    }
    charts
}

fn build_suggested(
    table: &Table,
    schema: &Schema,
    suggestion: &ChartSuggestion,
    priority: u8,
) -> Result<ChartPayload, SkipReason> {
    let resolve = |name: &Option<String>, role: &str| -> Result<&Column, SkipReason> {
        let name = name.as_deref().ok_or_else(|| {
            SkipReason::UnsupportedBinding(format!("missing {role} column binding"))
        })?;
        if schema.descriptor(name).is_none() {
            return Err(SkipReason::ColumnMissing(name.to_string()));
        }
        table
            .column(name)
            .ok_or_else(|| SkipReason::ColumnMissing(name.to_string()))
    };

    let semantic =
        |column: &Column| -> SemanticType { crate::schema::infer_semantic_type(column) };

    let mut chart = match suggestion.chart_kind {
        ChartKind::Line => {
            let x = resolve(&suggestion.x_column, "x")?;
            let y = resolve(&suggestion.y_column, "y")?;
            if semantic(x) != SemanticType::Datetime {
                return Err(SkipReason::UnsupportedBinding(format!(
                    "line chart x column '{}' is not a time axis",
                    x.name
                )));
            }
            if semantic(y) != SemanticType::Numeric {
                return Err(SkipReason::UnsupportedBinding(format!(
                    "line chart y column '{}' is not numeric",
                    y.name
                )));
            }
            build_line(x, y)?
        }
        ChartKind::Scatter => {
            let x = resolve(&suggestion.x_column, "x")?;
            let y = resolve(&suggestion.y_column, "y")?;
            if semantic(x) != SemanticType::Numeric || semantic(y) != SemanticType::Numeric {
                return Err(SkipReason::UnsupportedBinding(
                    "scatter chart requires two numeric columns".to_string(),
                ));
            }
            build_scatter(x, y)?
        }
        ChartKind::Pie | ChartKind::Bar => {
            let category = resolve(&suggestion.category_column, "category")?;
            let value = resolve(&suggestion.value_column, "value")?;
            if semantic(category) != SemanticType::Categorical {
                return Err(SkipReason::UnsupportedBinding(format!(
                    "column '{}' is not categorical",
                    category.name
                )));
            }
            if semantic(value) != SemanticType::Numeric {
                return Err(SkipReason::UnsupportedBinding(format!(
                    "column '{}' is not numeric",
                    value.name
                )));
            }
            match suggestion.chart_kind {
                ChartKind::Pie => build_pie(category, value)?,
                _ => build_bar(category, value)?,
            }
        }
    };

    chart.priority = priority;
    if let Some(title) = &suggestion.title {
        chart.title = title.clone();
    }
    chart.insight = suggestion.insight.clone();
    Ok(chart)
}

/// Per-row time-axis value: a sort key plus the rendered scalar. Covers real
/// timestamps, integer period codes, and date-like text columns.
pub(crate) fn time_axis_value(column: &Column, row: usize) -> Option<(f64, Scalar)> {
    match &column.data {
        ColumnData::Timestamp(_) => {
            let ts = column.data.timestamp_at(row)?;
            Some((
                ts.and_utc().timestamp() as f64,
                Scalar::Text(crate::table::format_timestamp(&ts)),
            ))
        }
        ColumnData::Numeric(_) => {
            let code = column.data.number_at(row)?;
            Some((code, Scalar::Number(code)))
        }
        ColumnData::Text(values) => {
            let raw = values.get(row)?.as_deref()?;
            let ts = crate::loader::parse_timestamp(raw)?;
            Some((ts.and_utc().timestamp() as f64, Scalar::Text(raw.to_string())))
        }
    }
}

fn build_line(time_col: &Column, num_col: &Column) -> Result<ChartPayload, SkipReason> {
    let mut rows: Vec<(f64, Scalar, f64)> = (0..time_col.len())
        .filter_map(|row| {
            let (key, x) = time_axis_value(time_col, row)?;
            let y = num_col.data.number_at(row)?;
            Some((key, x, y))
        })
        .collect();
    if rows.is_empty() {
        return Err(SkipReason::NoData);
    }
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));
    let data = rows
        .into_iter()
        .map(|(_, x, y)| ChartPoint::Xy {
            x,
            y: Scalar::Number(y),
        })
        .collect();
    Ok(ChartPayload {
        chart_kind: ChartKind::Line,
        title: format!("{} over {}", num_col.name, time_col.name),
        x_column: Some(time_col.name.clone()),
        y_column: Some(num_col.name.clone()),
        category_column: None,
        value_column: None,
        data,
        priority: 1,
        insight: None,
    })
}

/// Groups `val_col` by the display value of `cat_col` and sums, ordered by
/// descending total with the category name as tie-break.
pub(crate) fn grouped_sums(cat_col: &Column, val_col: &Column) -> Vec<(String, f64)> {
    let mut sums: HashMap<String, f64> = HashMap::new();
    for row in 0..cat_col.len() {
        let category = cat_col.data.scalar_at(row);
        if category.is_null() {
            continue;
        }
        let Some(value) = val_col.data.number_at(row) else {
            continue;
        };
        *sums.entry(category.display()).or_insert(0.0) += value;
    }
    let mut items: Vec<(String, f64)> = sums.into_iter().collect();
    items.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items
}

fn category_payload(
    kind: ChartKind,
    cat_col: &Column,
    val_col: &Column,
    limit: Option<usize>,
    priority: u8,
) -> Result<ChartPayload, SkipReason> {
    let mut items = grouped_sums(cat_col, val_col);
    if items.is_empty() {
        return Err(SkipReason::NoData);
    }
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    let data = items
        .into_iter()
        .map(|(category, value)| ChartPoint::Category {
            category,
            value: Scalar::Number(value),
        })
        .collect();
    Ok(ChartPayload {
        chart_kind: kind,
        title: format!("{} by {}", val_col.name, cat_col.name),
        x_column: None,
        y_column: None,
        category_column: Some(cat_col.name.clone()),
        value_column: Some(val_col.name.clone()),
        data,
        priority,
        insight: None,
    })
}

fn build_pie(cat_col: &Column, val_col: &Column) -> Result<ChartPayload, SkipReason> {
    category_payload(ChartKind::Pie, cat_col, val_col, None, 2)
}

fn build_bar(cat_col: &Column, val_col: &Column) -> Result<ChartPayload, SkipReason> {
    category_payload(ChartKind::Bar, cat_col, val_col, Some(MAX_BAR_CATEGORIES), 3)
}

/// Down-samples to [`MAX_SCATTER_POINTS`] preserving row order. The RNG seed
/// derives from the candidate size so repeated runs on the same table emit
/// identical payloads.
pub(crate) fn sample_points(points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    if points.len() <= MAX_SCATTER_POINTS {
        return points;
    }
    let mut rng = StdRng::seed_from_u64(points.len() as u64);
    let mut picked = rand::seq::index::sample(&mut rng, points.len(), MAX_SCATTER_POINTS)
        .into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|idx| points[idx]).collect()
}

fn build_scatter(col_a: &Column, col_b: &Column) -> Result<ChartPayload, SkipReason> {
    let points: Vec<(f64, f64)> = (0..col_a.len())
        .filter_map(|row| {
            let x = col_a.data.number_at(row)?;
            let y = col_b.data.number_at(row)?;
            Some((x, y))
        })
        .collect();
    if points.is_empty() {
        return Err(SkipReason::NoData);
    }
    let data = sample_points(points)
        .into_iter()
        .map(|(x, y)| ChartPoint::Xy {
            x: Scalar::Number(x),
            y: Scalar::Number(y),
        })
        .collect();
    Ok(ChartPayload {
        chart_kind: ChartKind::Scatter,
        title: format!("{} vs {}", col_b.name, col_a.name),
        x_column: Some(col_a.name.clone()),
        y_column: Some(col_b.name.clone()),
        category_column: None,
        value_column: None,
        data,
        priority: 4,
        insight: None,
    })
}
