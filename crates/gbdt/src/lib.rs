//! Propensity GBDT - deterministic boosted-tree binary classifier
//!
//! Trains gradient boosted decision trees on a binary log-loss objective with
//! native categorical splits, and reports per-feature importances.
//!
//! Modules:
//! - `matrix`: column-major feature matrix
//! - `binning`: histogram bins for numeric and categorical features
//! - `cart`: depth-limited histogram tree builder
//! - `trainer`: boosting loop and configuration
//! - `model`: fitted ensemble, probabilities and importances
//! - `deterministic`: seeded RNG and split tie-breaking

pub mod binning;
pub mod cart;
pub mod deterministic;
pub mod errors;
pub mod matrix;
pub mod model;
pub mod objective;
pub mod trainer;
pub mod tree;

pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::{GbdtError, Result};
pub use matrix::FeatureMatrix;
pub use model::{BoostedModel, ImportanceType};
pub use trainer::{GbdtConfig, GbdtTrainer};
pub use tree::{Node, SplitRule, Tree};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
