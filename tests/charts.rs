mod common;

use common::{SALES_CSV, TestWorkspace};
use datasight::charts::{
    ChartKind, ChartPayload, ChartPoint, ChartSuggestion, DEFAULT_MAX_CHARTS, generate_charts,
};
use datasight::loader::load_table;
use datasight::schema::analyze_schema;
use datasight::table::Table;
use encoding_rs::UTF_8;

fn load(csv: &str) -> Table {
    let workspace = TestWorkspace::new();
    let path = workspace.write("input.csv", csv);
    load_table(&path, None, UTF_8).expect("load table")
}

fn heuristic(table: &Table, max: usize) -> Vec<ChartPayload> {
    let schema = analyze_schema(table);
    generate_charts(table, &schema, None, max)
}

#[test]
fn sales_fixture_yields_capped_prioritized_charts() {
    let table = load(SALES_CSV);
    let charts = heuristic(&table, DEFAULT_MAX_CHARTS);
    assert!(charts.len() <= DEFAULT_MAX_CHARTS);
    assert!(!charts.is_empty());
    for chart in &charts {
        assert!(!chart.data.is_empty());
        assert!(!chart.title.is_empty());
    }
    for pair in charts.windows(2) {
        assert!(pair[0].priority <= pair[1].priority);
    }
    assert_eq!(charts[0].chart_kind, ChartKind::Line);
    assert_eq!(charts[0].title, "sales over date");
}

#[test]
fn line_charts_precede_category_charts() {
    let table = load(SALES_CSV);
    let charts = heuristic(&table, 8);
    let first_line = charts
        .iter()
        .position(|c| c.chart_kind == ChartKind::Line)
        .expect("line chart");
    let first_bar = charts
        .iter()
        .position(|c| c.chart_kind == ChartKind::Bar)
        .expect("bar chart");
    assert!(first_line < first_bar);
}

#[test]
fn user_id_column_never_appears_in_chart_bindings() {
    let table = load("user_id,sales,profit\n1,10,1\n2,20,2\n3,30,3\n");
    let charts = heuristic(&table, 8);
    assert!(!charts.is_empty());
    for chart in &charts {
        let bindings = [
            &chart.x_column,
            &chart.y_column,
            &chart.category_column,
            &chart.value_column,
        ];
        assert!(bindings.iter().all(|b| b.as_deref() != Some("user_id")));
    }
}

#[test]
fn month_id_codes_produce_a_sorted_line_chart() {
    let table = load("month_id,sales\n202403,30\n202401,10\n202402,20\n");
    let charts = heuristic(&table, 4);
    let line = charts
        .iter()
        .find(|c| c.chart_kind == ChartKind::Line)
        .expect("line chart");
    let xs: Vec<String> = line
        .data
        .iter()
        .map(|point| match point {
            ChartPoint::Xy { x, .. } => x.display(),
            other => panic!("expected xy point, got {other:?}"),
        })
        .collect();
    assert_eq!(xs, vec!["202401", "202402", "202403"]);
}

#[test]
fn mostly_null_columns_are_not_charted() {
    let mut csv = String::from("sparse,dense,other\n");
    for i in 0..20 {
        let sparse = if i == 0 { "1" } else { "" };
        csv.push_str(&format!("{sparse},{i},{}\n", i * 2));
    }
    let table = load(&csv);
    let charts = heuristic(&table, 8);
    for chart in &charts {
        assert_ne!(chart.x_column.as_deref(), Some("sparse"));
        assert_ne!(chart.y_column.as_deref(), Some("sparse"));
    }
}

#[test]
fn serialized_payload_uses_wire_names() {
    let table = load(SALES_CSV);
    let charts = heuristic(&table, 1);
    let json = serde_json::to_value(&charts).unwrap();
    let chart = &json[0];
    assert_eq!(chart["chart_kind"], "line");
    assert!(chart["data"].as_array().is_some_and(|d| !d.is_empty()));
    assert!(chart["data"][0]["x"].is_string());
    assert!(chart["data"][0]["y"].is_number());
}

#[test]
fn oracle_suggestions_are_validated_independently() {
    let table = load(SALES_CSV);
    let schema = analyze_schema(&table);
    let raw = r#"[
        {"chart_kind": "pie", "category_column": "region", "value_column": "sales",
         "title": "Share of sales", "insight": "north dominates"},
        {"chart_kind": "line", "x_column": "date", "y_column": "missing"},
        {"chart_kind": "scatter", "x_column": "sales", "y_column": "profit"}
    ]"#;
    let suggestions: Vec<ChartSuggestion> = serde_json::from_str(raw).expect("parse suggestions");
    let charts = generate_charts(&table, &schema, Some(&suggestions), 4);
    assert_eq!(charts.len(), 2);
    assert_eq!(charts[0].chart_kind, ChartKind::Pie);
    assert_eq!(charts[0].title, "Share of sales");
    assert_eq!(charts[0].insight.as_deref(), Some("north dominates"));
    assert_eq!(charts[1].chart_kind, ChartKind::Scatter);
}

#[test]
fn all_invalid_suggestions_yield_zero_charts() {
    let table = load(SALES_CSV);
    let schema = analyze_schema(&table);
    let suggestions: Vec<ChartSuggestion> = serde_json::from_str(
        r#"[{"chart_kind": "line", "x_column": "nope", "y_column": "sales"}]"#,
    )
    .expect("parse suggestions");
    let charts = generate_charts(&table, &schema, Some(&suggestions), 4);
    assert!(charts.is_empty());
}
