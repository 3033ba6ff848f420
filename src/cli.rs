use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{compare::ComparisonKind, merge::JoinKind};

#[derive(Debug, Parser)]
#[command(author, version, about = "Understand tabular datasets without a schema", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer a semantic schema for a CSV file and report validation status
    Probe(ProbeArgs),
    /// Recommend and materialize charts for a CSV file
    Charts(ChartsArgs),
    /// Compare two CSV files: overlay charts and delta metrics
    Compare(CompareArgs),
    /// Validate and execute a join between two CSV files
    Merge(MergeArgs),
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input CSV file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination JSON file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ChartsArgs {
    /// Input CSV file to chart
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination JSON file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Maximum number of charts to emit
    #[arg(long = "max-charts", default_value_t = crate::charts::DEFAULT_MAX_CHARTS)]
    pub max_charts: usize,
    /// JSON file of oracle chart suggestions to validate and render
    #[arg(long)]
    pub suggestions: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Left CSV input
    #[arg(long = "left")]
    pub left: PathBuf,
    /// Right CSV input
    #[arg(long = "right")]
    pub right: PathBuf,
    /// Destination JSON file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Which outputs to build (full, charts-only, metrics-only)
    #[arg(long = "kind", value_enum, default_value = "full")]
    pub kind: ComparisonKind,
    /// CSV delimiter character for both inputs
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding for input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Left CSV input
    #[arg(long = "left")]
    pub left: PathBuf,
    /// Right CSV input
    #[arg(long = "right")]
    pub right: PathBuf,
    /// Key column in the left file
    #[arg(long = "left-key")]
    pub left_key: String,
    /// Key column in the right file
    #[arg(long = "right-key")]
    pub right_key: String,
    /// Join type (inner, left, right, outer)
    #[arg(long = "type", value_enum, default_value = "inner")]
    pub kind: JoinKind,
    /// Suffix for left-side columns that exist in both files
    #[arg(long = "left-suffix", default_value = "_x")]
    pub left_suffix: String,
    /// Suffix for right-side columns that exist in both files
    #[arg(long = "right-suffix", default_value = "_y")]
    pub right_suffix: String,
    /// Only report merge compatibility; do not execute the join
    #[arg(long = "validate-only")]
    pub validate_only: bool,
    /// Destination CSV file for the merged table (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Destination JSON file for the merged table's schema
    #[arg(long = "schema-out")]
    pub schema_out: Option<PathBuf>,
    /// CSV delimiter character for both inputs
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding for input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
