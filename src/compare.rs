//! Cross-file comparison: common-column discovery, overlay charts, and delta
//! metrics.
//!
//! Two independently loaded tables are compared on their structurally
//! compatible columns only. Overlay charts carry two parallel series with the
//! source labels; metrics report row-count and per-numeric-column deltas.
//! An empty intersection produces empty output, not an error — the caller
//! decides whether that is a failure.

use std::collections::{BTreeMap, HashMap};

use clap::ValueEnum;
use log::debug;
use serde::Serialize;

use crate::{
    charts::{ChartKind, ChartPoint, grouped_sums, sample_points, time_axis_value},
    schema::{SemanticType, infer_semantic_type},
    table::{Column, Scalar, Table},
};

pub const MAX_OVERLAY_CHARTS: usize = 4;
pub const MAX_OVERLAY_CATEGORIES: usize = 10;
/// Tier cap: categorical and scatter overlays only join while fewer charts
/// than this exist, keeping time-series overlays dominant.
const SECONDARY_OVERLAY_CUTOFF: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ComparisonKind {
    Full,
    ChartsOnly,
    MetricsOnly,
}

/// Column names present in both tables, grouped by their joint semantic
/// classification: numeric when numeric on both sides, datetime when datetime
/// on either, categorical otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommonColumns {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub datetime: Vec<String>,
}

pub fn find_common_columns(a: &Table, b: &Table) -> CommonColumns {
    let mut common = CommonColumns::default();
    for column_a in a.columns() {
        let Some(column_b) = b.column(&column_a.name) else {
            continue;
        };
        let type_a = infer_semantic_type(column_a);
        let type_b = infer_semantic_type(column_b);
        let name = column_a.name.clone();
        if type_a == SemanticType::Numeric && type_b == SemanticType::Numeric {
            common.numeric.push(name);
        } else if type_a == SemanticType::Datetime || type_b == SemanticType::Datetime {
            common.datetime.push(name);
        } else {
            common.categorical.push(name);
        }
    }
    common
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayChartPayload {
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
    pub label_a: String,
    pub label_b: String,
    pub series_a: Vec<ChartPoint>,
    pub series_b: Vec<ChartPoint>,
}

/// Time series for one side: values grouped by timestamp, duplicate
/// timestamps averaged, sorted ascending. Unparseable rows are dropped.
fn grouped_mean_series(time_col: &Column, value_col: &Column) -> Vec<ChartPoint> {
    let mut groups: HashMap<u64, (f64, Scalar, f64, usize)> = HashMap::new();
    for row in 0..time_col.len() {
        let Some((key, x)) = time_axis_value(time_col, row) else {
            continue;
        };
        let Some(value) = value_col.data.number_at(row) else {
            continue;
        };
        let entry = groups
            .entry(key.to_bits())
            .or_insert((key, x, 0.0, 0));
        entry.2 += value;
        entry.3 += 1;
    }
    let mut items: Vec<(f64, Scalar, f64, usize)> = groups.into_values().collect();
    items.sort_by(|a, b| a.0.total_cmp(&b.0));
    items
        .into_iter()
        .map(|(_, x, sum, n)| ChartPoint::Xy {
            x,
            y: Scalar::Number(sum / n as f64),
        })
        .collect()
}

fn top_category_series(cat_col: &Column, val_col: &Column) -> Vec<ChartPoint> {
    let mut items = grouped_sums(cat_col, val_col);
    items.truncate(MAX_OVERLAY_CATEGORIES);
    items
        .into_iter()
        .map(|(category, value)| ChartPoint::Category {
            category,
            value: Scalar::Number(value),
        })
        .collect()
}

fn scatter_series(col_x: &Column, col_y: &Column) -> Vec<ChartPoint> {
    let points: Vec<(f64, f64)> = (0..col_x.len())
        .filter_map(|row| {
            let x = col_x.data.number_at(row)?;
            let y = col_y.data.number_at(row)?;
            Some((x, y))
        })
        .collect();
    sample_points(points)
        .into_iter()
        .map(|(x, y)| ChartPoint::Xy {
            x: Scalar::Number(x),
            y: Scalar::Number(y),
        })
        .collect()
}

/// Builds overlay charts over the common columns of `a` and `b`. Time-series
/// overlays are generated first, then one categorical tier, then a scatter
/// tier; the list is truncated to [`MAX_OVERLAY_CHARTS`] in generation order.
pub fn generate_overlay_charts(
    a: &Table,
    b: &Table,
    label_a: &str,
    label_b: &str,
) -> Vec<OverlayChartPayload> {
    let common = find_common_columns(a, b);
    let mut charts: Vec<OverlayChartPayload> = Vec::new();

    if let Some(time_name) = common.datetime.first() {
        for value_name in common.numeric.iter().take(2) {
            let (Some(time_a), Some(val_a)) = (a.column(time_name), a.column(value_name)) else {
                continue;
            };
            let (Some(time_b), Some(val_b)) = (b.column(time_name), b.column(value_name)) else {
                continue;
            };
            let series_a = grouped_mean_series(time_a, val_a);
            let series_b = grouped_mean_series(time_b, val_b);
            if series_a.is_empty() || series_b.is_empty() {
                debug!("Skipping time overlay for '{value_name}': empty series");
                continue;
            }
            charts.push(OverlayChartPayload {
                chart_kind: ChartKind::Line,
                title: format!("{value_name} over {time_name}"),
                x_column: Some(time_name.clone()),
                y_column: Some(value_name.clone()),
                category_column: None,
                value_column: None,
                label_a: label_a.to_string(),
                label_b: label_b.to_string(),
                series_a,
                series_b,
            });
        }
    }

    if charts.len() < SECONDARY_OVERLAY_CUTOFF
        && let Some(cat_name) = common.categorical.first()
    {
        for value_name in common.numeric.iter().take(2) {
            if charts.len() >= SECONDARY_OVERLAY_CUTOFF {
                break;
            }
            let (Some(cat_a), Some(val_a)) = (a.column(cat_name), a.column(value_name)) else {
                continue;
            };
            let (Some(cat_b), Some(val_b)) = (b.column(cat_name), b.column(value_name)) else {
                continue;
            };
            // The two sides keep their own top-10 sets; they need not match.
            let series_a = top_category_series(cat_a, val_a);
            let series_b = top_category_series(cat_b, val_b);
            if series_a.is_empty() || series_b.is_empty() {
                continue;
            }
            charts.push(OverlayChartPayload {
                chart_kind: ChartKind::Bar,
                title: format!("{value_name} by {cat_name}"),
                x_column: None,
                y_column: None,
                category_column: Some(cat_name.clone()),
                value_column: Some(value_name.clone()),
                label_a: label_a.to_string(),
                label_b: label_b.to_string(),
                series_a,
                series_b,
            });
        }
    }

    if charts.len() < SECONDARY_OVERLAY_CUTOFF && common.numeric.len() >= 2 {
        let x_name = &common.numeric[0];
        let y_name = &common.numeric[1];
        let columns = (
            a.column(x_name).zip(a.column(y_name)),
            b.column(x_name).zip(b.column(y_name)),
        );
        if let (Some((ax, ay)), Some((bx, by))) = columns {
            let series_a = scatter_series(ax, ay);
            let series_b = scatter_series(bx, by);
            if !series_a.is_empty() && !series_b.is_empty() {
                charts.push(OverlayChartPayload {
                    chart_kind: ChartKind::Scatter,
                    title: format!("{y_name} vs {x_name}"),
                    x_column: Some(x_name.clone()),
                    y_column: Some(y_name.clone()),
                    category_column: None,
                    value_column: None,
                    label_a: label_a.to_string(),
                    label_b: label_b.to_string(),
                    series_a,
                    series_b,
                });
            }
        }
    }

    charts.truncate(MAX_OVERLAY_CHARTS);
    charts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDelta {
    pub mean_a: f64,
    pub mean_b: f64,
    pub mean_diff: f64,
    /// `None` when the baseline mean is exactly 0: a percentage of nothing
    /// is not a meaningful number.
    pub mean_pct_change: Option<f64>,
    pub sum_a: f64,
    pub sum_b: f64,
    pub sum_diff: f64,
    pub sum_pct_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonMetrics {
    pub row_count_a: usize,
    pub row_count_b: usize,
    pub row_count_delta: i64,
    pub row_count_pct_change: f64,
    pub columns: BTreeMap<String, ColumnDelta>,
}

fn mean_and_sum(column: &Column) -> (f64, f64) {
    let mut sum = 0.0;
    let mut count = 0usize;
    for row in 0..column.len() {
        if let Some(value) = column.data.number_at(row) {
            sum += value;
            count += 1;
        }
    }
    if count == 0 {
        (0.0, 0.0)
    } else {
        (sum / count as f64, sum)
    }
}

fn pct_change(baseline: f64, new: f64) -> Option<f64> {
    if baseline == 0.0 {
        None
    } else {
        Some((new - baseline) / baseline * 100.0)
    }
}

pub fn calculate_metrics(a: &Table, b: &Table) -> ComparisonMetrics {
    let rows_a = a.row_count();
    let rows_b = b.row_count();
    let row_count_pct_change = if rows_a == 0 {
        if rows_b > 0 { 100.0 } else { 0.0 }
    } else {
        (rows_b as f64 - rows_a as f64) / rows_a as f64 * 100.0
    };

    let mut columns = BTreeMap::new();
    for name in find_common_columns(a, b).numeric {
        let (Some(col_a), Some(col_b)) = (a.column(&name), b.column(&name)) else {
            continue;
        };
        let (mean_a, sum_a) = mean_and_sum(col_a);
        let (mean_b, sum_b) = mean_and_sum(col_b);
        columns.insert(
            name,
            ColumnDelta {
                mean_a,
                mean_b,
                mean_diff: mean_b - mean_a,
                mean_pct_change: pct_change(mean_a, mean_b),
                sum_a,
                sum_b,
                sum_diff: sum_b - sum_a,
                sum_pct_change: pct_change(sum_a, sum_b),
            },
        );
    }

    ComparisonMetrics {
        row_count_a: rows_a,
        row_count_b: rows_b,
        row_count_delta: rows_b as i64 - rows_a as i64,
        row_count_pct_change,
        columns,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub label_a: String,
    pub label_b: String,
    pub charts: Vec<OverlayChartPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ComparisonMetrics>,
}

/// Compares two tables end to end; `kind` selects which outputs are built.
pub fn compare_files(
    a: &Table,
    b: &Table,
    label_a: &str,
    label_b: &str,
    kind: ComparisonKind,
) -> ComparisonResult {
    let charts = match kind {
        ComparisonKind::MetricsOnly => Vec::new(),
        _ => generate_overlay_charts(a, b, label_a, label_b),
    };
    let metrics = match kind {
        ComparisonKind::ChartsOnly => None,
        _ => Some(calculate_metrics(a, b)),
    };
    ComparisonResult {
        label_a: label_a.to_string(),
        label_b: label_b.to_string(),
        charts,
        metrics,
    }
}
