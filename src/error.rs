//! Error taxonomy for the data-understanding pipeline.
//!
//! Per-item failures (a single chart candidate, a single oracle suggestion)
//! are not represented here; those are absorbed as skip reasons inside the
//! chart engine and never propagate. `PipelineError` covers whole-pipeline
//! failures that callers must be able to distinguish by kind.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Dataset shape violates the validation bounds. Usually carried as data
    /// by [`crate::schema::validate`]; raised only when an operation needs a
    /// valid table and was handed one that is not.
    #[error("dataset validation failed: {reason}")]
    Validation { reason: String },

    /// A join key is missing from its table, or an executed join produced
    /// zero rows (almost always a key mismatch, not a legitimate empty
    /// result).
    #[error("merge key error: {0}")]
    MergeKey(String),

    /// The input could not be parsed into a table at all. This is the only
    /// class the pipeline does not recover from internally.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// Internal construction error: columns of unequal length, or a column
    /// referenced by index that does not exist.
    #[error("column mismatch: {0}")]
    ColumnMismatch(String),
}
