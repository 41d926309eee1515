//! Propensity Trainer - per-segment purchase-propensity classifiers
//!
//! Trains one boosted-tree classifier per value of a segmentation key
//! (distribution channel or city tier), scores each on a held-out stratified
//! partition by ROC AUC and ranks its most important features.
//!
//! Modules:
//! - `dataset`: columnar table and CSV loading
//! - `schema`: explicit column-kind descriptor
//! - `normalize`: typed, sentinel-filled feature table
//! - `partition`: segments and the single-class guard
//! - `split`: seeded stratified train/test split
//! - `classifier`: fit/predict capability and the boosted-tree implementation
//! - `metrics`, `importance`: AUC and top-k feature ranking
//! - `pipeline`: the generic segment pipeline
//! - `report`: charts and JSON summaries
//! - `settings`: layered configuration

pub mod classifier;
pub mod dataset;
pub mod errors;
pub mod features;
pub mod importance;
pub mod metrics;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod settings;
pub mod split;

use std::path::Path;

use tracing::{info, warn};

pub use classifier::{Classifier, FitError, FittedClassifier, GbdtClassifier};
pub use dataset::{CategoricalColumn, Column, Table};
pub use errors::{PipelineError, Result};
pub use features::FeatureSet;
pub use importance::{rank_features, RankedFeature};
pub use metrics::{roc_auc, MetricError};
pub use normalize::FeatureNormalizer;
pub use partition::{Partition, Segment, SegmentPartitioner};
pub use pipeline::{
    ResultsTable, RunReport, SegmentPipeline, SegmentResult, SegmentationSpec, SkipReason,
    SkippedSegment,
};
pub use report::{PngBarChart, ReportEmitter, ReportError};
pub use schema::{ColumnKind, ColumnSpec, Schema, SchemaConfig};
pub use settings::{AppConfig, ConfigError, ReportPolicy, TrainingConfig};
pub use split::{stratified_split, SplitError, SplitPair};

/// Load a CSV file and normalize it with the configured schema
pub fn load_normalized(path: &Path, schema: &SchemaConfig) -> Result<Table> {
    let table = Table::from_csv(path)?;
    info!(
        "Loaded {} rows x {} columns from {}",
        table.n_rows(),
        table.n_columns(),
        path.display()
    );
    Ok(FeatureNormalizer::new(schema.clone()).normalize(table))
}

/// Run one segmentation over a normalized table and write its reports
pub fn run_segmentation(
    table: &Table,
    spec: SegmentationSpec,
    config: &AppConfig,
) -> Result<RunReport> {
    let pipeline = SegmentPipeline::new(spec, &config.schema.label, &config.training);
    let run = pipeline.run(table)?;

    info!(
        "{}: {} segments trained, {} skipped",
        run.spec.display,
        run.results.len(),
        run.skipped.len()
    );

    report::emit_charts(
        &run,
        &PngBarChart::from(&config.report),
        config.report.policy,
        &config.results_dir,
        config.training.top_k,
    );
    match report::write_summary(&run, &config.results_dir) {
        Ok(path) => info!("Summary written to {}", path.display()),
        Err(e) => warn!("Summary for {} not written: {}", run.spec.display, e),
    }

    Ok(run)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
