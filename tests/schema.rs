mod common;

use common::{SALES_CSV, TestWorkspace};
use datasight::loader::load_table;
use datasight::schema::{
    self, MAX_COLUMNS, MAX_ROWS, SemanticType, analyze_schema, validate,
};
use datasight::table::{Column, ColumnData, Table};
use encoding_rs::UTF_8;
use proptest::prelude::*;

fn load(csv: &str) -> Table {
    let workspace = TestWorkspace::new();
    let path = workspace.write("input.csv", csv);
    load_table(&path, None, UTF_8).expect("load table")
}

#[test]
fn loader_types_the_sales_fixture() {
    let table = load(SALES_CSV);
    assert_eq!(table.row_count(), 4);
    assert_eq!(table.column_count(), 4);
    assert!(matches!(
        table.column("date").unwrap().data,
        ColumnData::Timestamp(_)
    ));
    assert!(matches!(
        table.column("region").unwrap().data,
        ColumnData::Text(_)
    ));
    assert!(matches!(
        table.column("sales").unwrap().data,
        ColumnData::Numeric(_)
    ));
}

#[test]
fn schema_mirrors_table_shape_and_types() {
    let table = load(SALES_CSV);
    let schema = analyze_schema(&table);
    assert_eq!(schema.columns.len(), 4);
    assert_eq!(schema.row_count, 4);
    assert_eq!(schema.preview.len(), 4);

    let date = schema.descriptor("date").expect("date");
    assert_eq!(date.semantic_type, SemanticType::Datetime);
    let region = schema.descriptor("region").expect("region");
    assert_eq!(region.semantic_type, SemanticType::Categorical);
    assert_eq!(region.distinct_count, Some(3));
    let sales = schema.descriptor("sales").expect("sales");
    let stats = sales.numeric_stats.clone().expect("stats");
    assert_eq!(stats.min, 10.0);
    assert_eq!(stats.max, 40.0);
    assert_eq!(stats.mean, 25.0);
    assert_eq!(stats.median, 25.0);
}

#[test]
fn month_id_codes_type_as_datetime() {
    let table = load("month_id,sales\n202401,10\n202402,20\n");
    let schema = analyze_schema(&table);
    assert_eq!(
        schema.descriptor("month_id").unwrap().semantic_type,
        SemanticType::Datetime
    );
    assert_eq!(
        schema.descriptor("sales").unwrap().semantic_type,
        SemanticType::Numeric
    );
}

#[test]
fn empty_cells_count_as_nulls_and_are_absent_from_samples() {
    let table = load("region,sales\nnorth,1\n,2\nsouth,\n");
    let schema = analyze_schema(&table);
    assert_eq!(schema.descriptor("region").unwrap().null_count, 1);
    assert_eq!(schema.descriptor("sales").unwrap().null_count, 1);
    for descriptor in &schema.columns {
        assert!(descriptor.sample_values.iter().all(|v| !v.is_null()));
        assert!(descriptor.sample_values.len() <= 5);
    }
}

#[test]
fn validation_reports_reason_for_numeric_free_tables() {
    let table = load("a,b\nx,y\nz,w\n");
    let validation = validate(&table);
    assert!(!validation.ok);
    assert!(validation.reason.unwrap().contains("numeric"));
}

#[test]
fn validation_passes_the_sales_fixture() {
    let validation = validate(&load(SALES_CSV));
    assert!(validation.ok);
    assert_eq!(validation.reason, None);
}

#[test]
fn schema_serialization_is_stable_across_runs() {
    let table = load(SALES_CSV);
    let first = serde_json::to_vec(&analyze_schema(&table)).unwrap();
    let second = serde_json::to_vec(&analyze_schema(&table)).unwrap();
    assert_eq!(first, second);
}

fn numeric_table(rows: usize, columns: usize) -> Table {
    let data: Vec<Option<f64>> = (0..rows).map(|i| Some(i as f64)).collect();
    let columns = (0..columns)
        .map(|idx| Column::new(format!("c{idx}"), ColumnData::Numeric(data.clone())))
        .collect();
    Table::new(columns).expect("table")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn tables_inside_bounds_always_validate(
        rows in schema::MIN_ROWS..500usize,
        columns in 1usize..8usize,
    ) {
        let validation = validate(&numeric_table(rows, columns));
        prop_assert!(validation.ok);
        prop_assert!(validation.reason.is_none());
    }
}

#[test]
fn bounds_are_inclusive_at_the_limits() {
    assert!(validate(&numeric_table(MAX_ROWS, 1)).ok);
    assert!(!validate(&numeric_table(MAX_ROWS + 1, 1)).ok);
    assert!(validate(&numeric_table(2, MAX_COLUMNS)).ok);
    assert!(!validate(&numeric_table(2, MAX_COLUMNS + 1)).ok);
}

#[test]
fn unparseable_file_is_an_unsupported_input_error() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("ragged.csv", "a,b\n1,2\n3\n");
    let err = load_table(&path, None, UTF_8).expect_err("ragged rows must fail");
    assert!(matches!(
        err,
        datasight::error::PipelineError::UnsupportedInput(_)
    ));
}
