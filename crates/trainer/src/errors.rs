//! Error types for the segment trainer

use thiserror::Error;

use crate::settings::ConfigError;

/// Run-level errors; any of these stops a pipeline before segments are processed
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("duplicate column `{0}`")]
    DuplicateColumn(String),

    #[error("column `{column}` has {actual} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("required column `{column}` not found in dataset")]
    MissingColumn { column: String },

    #[error("segmentation column `{column}` has no non-missing values")]
    EmptySegmentationColumn { column: String },

    #[error("label column `{column}` must hold only 0 or 1, found {value} at row {row}")]
    InvalidLabel {
        column: String,
        row: usize,
        value: String,
    },

    #[error("feature matrix error: {0}")]
    Features(#[from] propensity_gbdt::GbdtError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
