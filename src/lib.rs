//! datasight: a tabular data-understanding pipeline.
//!
//! Four engines over in-memory tables, each pure and synchronous:
//!
//! - [`schema`] — semantic typing, per-column statistics, dataset validation
//! - [`charts`] — heuristic and oracle-suggested chart recommendation
//! - [`compare`] — cross-file overlay charts and delta metrics
//! - [`merge`] — join feasibility validation and execution
//!
//! The [`loader`] turns CSV files into typed [`table::Table`]s; everything
//! else consumes tables already resident in memory. No engine mutates its
//! inputs, so callers may run pipeline invocations concurrently across
//! independent requests without shared state.

pub mod cache;
pub mod charts;
pub mod cli;
pub mod compare;
pub mod error;
pub mod io_utils;
pub mod loader;
pub mod merge;
pub mod schema;
pub mod table;

use std::{env, fs::File, io::BufReader, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info};
use serde::Serialize;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("datasight", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Charts(args) => handle_charts(&args),
        Commands::Compare(args) => handle_compare(&args),
        Commands::Merge(args) => handle_merge(&args),
    }
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let table = loader::load_table(&args.input, args.delimiter, encoding)
        .with_context(|| format!("Loading {:?}", args.input))?;
    let validation = schema::validate(&table);
    if let Some(reason) = &validation.reason {
        info!("Validation failed for {:?}: {reason}", args.input);
    }
    let inferred = schema::analyze_schema(&table);

    #[derive(Serialize)]
    struct ProbeOutput<'a> {
        validation: &'a schema::Validation,
        schema: &'a schema::Schema,
    }
    write_json(
        &ProbeOutput {
            validation: &validation,
            schema: &inferred,
        },
        args.output.as_deref(),
    )?;
    info!(
        "Inferred schema for {} column(s), {} row(s)",
        inferred.columns.len(),
        inferred.row_count
    );
    Ok(())
}

fn handle_charts(args: &cli::ChartsArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let table = loader::load_table(&args.input, args.delimiter, encoding)
        .with_context(|| format!("Loading {:?}", args.input))?;
    let validation = schema::validate(&table);
    if !validation.ok {
        return Err(anyhow!(
            "dataset validation failed: {}",
            validation.reason.unwrap_or_default()
        ));
    }
    let inferred = schema::analyze_schema(&table);

    let suggestions: Option<Vec<charts::ChartSuggestion>> = match &args.suggestions {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Opening suggestions file {path:?}"))?;
            Some(
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("Parsing suggestions from {path:?}"))?,
            )
        }
        None => None,
    };

    let charts = charts::generate_charts(
        &table,
        &inferred,
        suggestions.as_deref(),
        args.max_charts,
    );
    write_json(&charts, args.output.as_deref())?;
    info!("Generated {} chart(s)", charts.len());
    Ok(())
}

fn handle_compare(args: &cli::CompareArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let left = loader::load_table(&args.left, args.delimiter, encoding)
        .with_context(|| format!("Loading {:?}", args.left))?;
    let right = loader::load_table(&args.right, args.delimiter, encoding)
        .with_context(|| format!("Loading {:?}", args.right))?;
    let result = compare::compare_files(
        &left,
        &right,
        &file_label(&args.left),
        &file_label(&args.right),
        args.kind,
    );
    write_json(&result, args.output.as_deref())?;
    info!(
        "Compared {:?} and {:?}: {} overlay chart(s)",
        args.left,
        args.right,
        result.charts.len()
    );
    Ok(())
}

fn handle_merge(args: &cli::MergeArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let left = loader::load_table(&args.left, args.delimiter, encoding)
        .with_context(|| format!("Loading {:?}", args.left))?;
    let right = loader::load_table(&args.right, args.delimiter, encoding)
        .with_context(|| format!("Loading {:?}", args.right))?;

    let report =
        merge::validate_merge_compatibility(&left, &right, &args.left_key, &args.right_key);
    for warning in &report.warnings {
        info!("Merge warning: {warning}");
    }
    if args.validate_only {
        return write_json(&report, args.output.as_deref());
    }
    if !report.compatible {
        return Err(anyhow!(
            "merge keys are incompatible: {}",
            report.warnings.join("; ")
        ));
    }

    let (merged, merged_schema) = merge::merge_tables(
        &left,
        &right,
        &args.left_key,
        &args.right_key,
        args.kind,
        &args.left_suffix,
        &args.right_suffix,
    )?;

    write_table_csv(&merged, args.output.as_deref())?;
    if let Some(path) = &args.schema_out {
        write_json(&merged_schema, Some(path))?;
    }
    info!(
        "Merge complete: {} row(s), {} column(s)",
        merged.row_count(),
        merged.column_count()
    );
    Ok(())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Serializing output")?;
    match path {
        Some(path) if !io_utils::is_dash(path) => {
            std::fs::write(path, rendered + "\n")
                .with_context(|| format!("Writing output to {path:?}"))?;
        }
        _ => println!("{rendered}"),
    }
    Ok(())
}

fn write_table_csv(table: &table::Table, path: Option<&Path>) -> Result<()> {
    let delimiter = path.map_or(io_utils::DEFAULT_CSV_DELIMITER, |p| {
        io_utils::resolve_input_delimiter(p, None)
    });
    let mut writer = io_utils::open_csv_writer(path, delimiter)?;
    let headers: Vec<&str> = table.column_names();
    writer.write_record(&headers).context("Writing headers")?;
    for row in 0..table.row_count() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|column| column.data.scalar_at(row).display())
            .collect();
        writer.write_record(&record).context("Writing row")?;
    }
    writer.flush().context("Flushing output")?;
    Ok(())
}
