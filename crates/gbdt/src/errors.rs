use thiserror::Error;

/// Errors returned by the booster.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GbdtError {
    #[error("dataset is empty")]
    EmptyDataset,

    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("label at row {row} is {value}, expected 0 or 1")]
    InvalidLabel { row: usize, value: f64 },

    #[error("categorical index {index} out of range for {n_features} features")]
    InvalidCategoricalIndex { index: usize, n_features: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("deadline exceeded after {completed_rounds} boosting rounds")]
    DeadlineExceeded { completed_rounds: usize },
}

/// Result type for booster operations
pub type Result<T> = std::result::Result<T, GbdtError>;
