//! CSV ingestion: raw bytes → typed [`Table`].
//!
//! The loader reads the whole file into memory, then classifies each column
//! exactly once into numeric, timestamp, or text storage. Classification is
//! the only place raw strings are inspected; every downstream heuristic works
//! from the [`ColumnData`] tag.
//!
//! Classification rules, in order:
//!
//! 1. every non-null value parses as a number → numeric storage;
//! 2. the first [`DATE_SAMPLE_ROWS`] non-null values all parse with one of
//!    the supported date/datetime formats → timestamp storage;
//! 3. otherwise → text storage.
//!
//! Files that cannot be parsed at all (unreadable, ragged rows, undecodable
//! bytes) surface as [`PipelineError::UnsupportedInput`]; that error class is
//! the caller's to handle.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::Encoding;
use log::debug;

use crate::{
    error::PipelineError,
    io_utils,
    table::{Column, ColumnData, Table},
};

/// Rows sampled when deciding whether a text column is a date column.
pub const DATE_SAMPLE_ROWS: usize = 100;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(parsed);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Some(parsed.and_hms_opt(0, 0, 0).unwrap_or_default());
        }
    }
    None
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Loads a CSV file into a typed table.
pub fn load_table(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Table, PipelineError> {
    let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, true)
        .map_err(|err| PipelineError::UnsupportedInput(format!("{err:#}")))?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .map_err(|err| PipelineError::UnsupportedInput(format!("{err:#}")))?;
    if headers.is_empty() {
        return Err(PipelineError::UnsupportedInput(format!(
            "{path:?} has no header row"
        )));
    }

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    let mut record = csv::ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                return Err(PipelineError::UnsupportedInput(format!(
                    "{path:?}: {err}"
                )));
            }
        }
        if record.len() != headers.len() {
            return Err(PipelineError::UnsupportedInput(format!(
                "{path:?}: row {} has {} field(s), expected {}",
                record.position().map_or(0, |p| p.line()),
                record.len(),
                headers.len()
            )));
        }
        for (idx, field) in record.iter().enumerate() {
            let decoded = io_utils::decode_bytes(field, encoding)
                .map_err(|err| PipelineError::UnsupportedInput(format!("{err:#}")))?;
            let trimmed = decoded.trim();
            cells[idx].push((!trimmed.is_empty()).then(|| trimmed.to_string()));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| classify_column(name, values))
        .collect();
    let table = Table::new(columns)?;
    debug!(
        "Loaded {:?}: {} row(s), {} column(s)",
        path,
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

/// Classifies one raw string column into its storage shape.
pub fn classify_column(name: String, values: Vec<Option<String>>) -> Column {
    let non_null: Vec<&str> = values.iter().flatten().map(String::as_str).collect();

    if !non_null.is_empty() && non_null.iter().all(|v| parse_number(v).is_some()) {
        let data = values
            .iter()
            .map(|v| v.as_deref().and_then(parse_number))
            .collect();
        return Column::new(name, ColumnData::Numeric(data));
    }

    let sample: Vec<&&str> = non_null.iter().take(DATE_SAMPLE_ROWS).collect();
    if !sample.is_empty() && sample.iter().all(|v| parse_timestamp(v).is_some()) {
        let data = values
            .iter()
            .map(|v| v.as_deref().and_then(parse_timestamp))
            .collect();
        return Column::new(name, ColumnData::Timestamp(data));
    }

    Column::new(name, ColumnData::Text(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    #[test]
    fn all_integer_column_becomes_numeric_storage() {
        let column = classify_column("amount".into(), strings(&["1", "2", "", "3"]));
        assert!(matches!(column.data, ColumnData::Numeric(_)));
        assert_eq!(column.data.number_at(3), Some(3.0));
        assert_eq!(column.data.number_at(2), None);
    }

    #[test]
    fn iso_date_column_becomes_timestamp_storage() {
        let column = classify_column("day".into(), strings(&["2024-01-05", "2024-01-06"]));
        assert!(matches!(column.data, ColumnData::Timestamp(_)));
    }

    #[test]
    fn mixed_column_falls_back_to_text() {
        let column = classify_column("note".into(), strings(&["12", "hello", "2024-01-05"]));
        assert!(matches!(column.data, ColumnData::Text(_)));
    }

    #[test]
    fn parse_timestamp_accepts_date_and_datetime_forms() {
        assert!(parse_timestamp("2024-05-06").is_some());
        assert!(parse_timestamp("2024-05-06T14:30:00").is_some());
        assert!(parse_timestamp("06/05/2024 14:30:00").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }
}
