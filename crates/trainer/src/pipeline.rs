//! Per-segment training pipeline
//!
//! One generic pipeline serves every segmentation dimension. For each segment
//! of the key column it splits rows into stratified train/test partitions,
//! fits a classifier, scores it by AUC on the test rows and ranks the
//! classifier's native feature importances.
//!
//! Run-level problems (missing key or label column, non-binary labels) stop
//! the run before any segment is processed. Segment-level problems become a
//! [`SkippedSegment`] and the remaining segments carry on.

use std::fmt;
use std::time::{Duration, Instant};

use propensity_gbdt::FeatureMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, FitError, FittedClassifier, GbdtClassifier};
use crate::dataset::Table;
use crate::errors::{PipelineError, Result};
use crate::features::FeatureSet;
use crate::importance::{rank_features, RankedFeature};
use crate::metrics::{roc_auc, MetricError};
use crate::partition::{binary_labels, Segment, SegmentPartitioner};
use crate::settings::TrainingConfig;
use crate::split::stratified_split;

/// Identifier, label, timestamp and time-derived columns never used as features
pub const LEAKAGE_COLUMNS: [&str; 7] = [
    "user_ID",
    "sku_ID",
    "purchase",
    "request_time",
    "channel",
    "hour",
    "weekday",
];

/// What a pipeline segments by and how its outputs are named
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationSpec {
    /// Segmentation column
    pub key: String,
    /// Human-readable dimension name used in logs and chart titles
    pub display: String,
    /// Prefix of output file names
    pub file_prefix: String,
    /// Columns excluded from the features besides `key`
    pub leakage_columns: Vec<String>,
}

impl SegmentationSpec {
    pub fn new(key: &str, display: &str, file_prefix: &str) -> Self {
        Self {
            key: key.to_string(),
            display: display.to_string(),
            file_prefix: file_prefix.to_string(),
            leakage_columns: LEAKAGE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Segments by distribution channel
    pub fn channel() -> Self {
        Self::new("channel", "Channel", "channel")
    }

    /// Segments by city tier
    pub fn region() -> Self {
        Self::new("city_level", "Region", "region")
    }

    /// Every column kept out of the feature set
    pub fn excluded_columns(&self, label: &str) -> Vec<String> {
        let mut excluded = self.leakage_columns.clone();
        for column in [self.key.as_str(), label] {
            if !excluded.iter().any(|c| c == column) {
                excluded.push(column.to_string());
            }
        }
        excluded
    }
}

/// Why a segment produced no result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer than two label values in the segment
    SingleClass { classes: usize },
    /// The stratified split could not be made
    Unstratifiable { detail: String },
    /// The test partition ended up with one label value
    SingleClassTest,
    TimedOut { completed_rounds: usize },
    Training { detail: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SingleClass { classes } => {
                write!(f, "only {classes} label class(es) present")
            }
            SkipReason::Unstratifiable { detail } => write!(f, "cannot stratify: {detail}"),
            SkipReason::SingleClassTest => write!(f, "test partition holds a single label class"),
            SkipReason::TimedOut { completed_rounds } => {
                write!(f, "timed out after {completed_rounds} boosting rounds")
            }
            SkipReason::Training { detail } => write!(f, "training failed: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSegment {
    pub key: String,
    pub rows: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub key: String,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub auc: f64,
    pub top_features: Vec<RankedFeature>,
}

/// Segment results in segment order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsTable {
    entries: Vec<SegmentResult>,
}

impl ResultsTable {
    fn push(&mut self, result: SegmentResult) {
        self.entries.push(result);
    }

    pub fn get(&self, key: &str) -> Option<&SegmentResult> {
        self.entries.iter().find(|r| r.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn first(&self) -> Option<&SegmentResult> {
        self.entries.first()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|r| r.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SegmentResult> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub spec: SegmentationSpec,
    pub total_rows: usize,
    pub unassigned_rows: usize,
    pub features: Vec<String>,
    pub results: ResultsTable,
    pub skipped: Vec<SkippedSegment>,
}

impl RunReport {
    pub fn is_skipped(&self, key: &str) -> bool {
        self.skipped.iter().any(|s| s.key == key)
    }
}

/// Settings every segment of a run shares
#[derive(Debug, Clone)]
struct SegmentSettings {
    test_fraction: f64,
    seed: u64,
    top_k: usize,
    timeout: Option<Duration>,
    threads: usize,
}

impl From<&TrainingConfig> for SegmentSettings {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            test_fraction: config.test_fraction,
            seed: config.seed,
            top_k: config.top_k,
            timeout: config.segment_timeout(),
            threads: config.threads,
        }
    }
}

pub struct SegmentPipeline<C = GbdtClassifier> {
    spec: SegmentationSpec,
    label: String,
    classifier: C,
    settings: SegmentSettings,
}

impl SegmentPipeline<GbdtClassifier> {
    /// Pipeline backed by the boosted-tree classifier configured in `training`
    pub fn new(spec: SegmentationSpec, label: &str, training: &TrainingConfig) -> Self {
        let classifier = GbdtClassifier::new(training.gbdt_config(), training.importance_type);
        Self::with_classifier(spec, label, training, classifier)
    }
}

impl<C: Classifier> SegmentPipeline<C> {
    pub fn with_classifier(
        spec: SegmentationSpec,
        label: &str,
        training: &TrainingConfig,
        classifier: C,
    ) -> Self {
        Self {
            spec,
            label: label.to_string(),
            classifier,
            settings: SegmentSettings::from(training),
        }
    }

    /// Train and evaluate every segment of a normalized table
    pub fn run(&self, table: &Table) -> Result<RunReport> {
        if !table.contains(&self.spec.key) {
            return Err(PipelineError::MissingColumn {
                column: self.spec.key.clone(),
            });
        }
        let labels = binary_labels(table, &self.label)?;
        let partition = SegmentPartitioner::new(&self.spec.key).partition(table, &labels)?;

        info!(
            "Segmenting {} rows by `{}`: {} segments ({} eligible), {} rows without a value",
            table.n_rows(),
            self.spec.key,
            partition.segments.len(),
            partition.eligible().count(),
            partition.unassigned_rows
        );

        let features = FeatureSet::select(table, &self.spec.excluded_columns(&self.label));
        let matrix = features.matrix(table)?;
        debug!(
            "Using {} features ({} categorical)",
            features.len(),
            features.categorical.len()
        );

        let eligible: Vec<&Segment> = partition.eligible().collect();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.threads)
            .build()?;
        let outcomes: Vec<std::result::Result<SegmentResult, SkipReason>> = pool.install(|| {
            eligible
                .par_iter()
                .map(|segment| self.process_segment(segment, &features, &matrix, &labels))
                .collect()
        });

        let mut results = ResultsTable::default();
        let mut skipped = Vec::new();
        let mut outcomes = outcomes.into_iter();

        for segment in &partition.segments {
            let outcome = if segment.is_eligible() {
                match outcomes.next() {
                    Some(outcome) => outcome,
                    None => continue,
                }
            } else {
                Err(SkipReason::SingleClass {
                    classes: segment.label_classes(),
                })
            };

            match outcome {
                Ok(result) => {
                    self.log_result(&result);
                    results.push(result);
                }
                Err(reason) => {
                    warn!(
                        "Skipping {} {} ({} rows): {}",
                        self.spec.display,
                        segment.value,
                        segment.len(),
                        reason
                    );
                    skipped.push(SkippedSegment {
                        key: segment.value.clone(),
                        rows: segment.len(),
                        reason,
                    });
                }
            }
        }

        Ok(RunReport {
            spec: self.spec.clone(),
            total_rows: table.n_rows(),
            unassigned_rows: partition.unassigned_rows,
            features: features.names,
            results,
            skipped,
        })
    }

    fn process_segment(
        &self,
        segment: &Segment,
        features: &FeatureSet,
        matrix: &FeatureMatrix,
        labels: &[f64],
    ) -> std::result::Result<SegmentResult, SkipReason> {
        let segment_labels: Vec<f64> = segment.rows.iter().map(|&row| labels[row]).collect();
        let split = stratified_split(&segment_labels, self.settings.test_fraction, self.settings.seed)
            .map_err(|e| SkipReason::Unstratifiable {
                detail: e.to_string(),
            })?;

        let train_rows: Vec<usize> = split.train.iter().map(|&i| segment.rows[i]).collect();
        let test_rows: Vec<usize> = split.test.iter().map(|&i| segment.rows[i]).collect();
        let y_train: Vec<f64> = train_rows.iter().map(|&row| labels[row]).collect();
        let y_test: Vec<f64> = test_rows.iter().map(|&row| labels[row]).collect();

        debug!(
            "{} {}: training on {} rows, testing on {}",
            self.spec.display,
            segment.value,
            train_rows.len(),
            test_rows.len()
        );

        let deadline = self.settings.timeout.map(|t| Instant::now() + t);
        let fitted = self
            .classifier
            .fit(
                &matrix.select_rows(&train_rows),
                &y_train,
                &features.categorical,
                deadline,
            )
            .map_err(|e| match e {
                FitError::TimedOut { completed_rounds } => SkipReason::TimedOut { completed_rounds },
                FitError::Failed(detail) => SkipReason::Training { detail },
            })?;

        let scores = fitted.predict_proba(&matrix.select_rows(&test_rows));
        let auc = roc_auc(&y_test, &scores).map_err(|e| match e {
            MetricError::SingleClass => SkipReason::SingleClassTest,
            other => SkipReason::Training {
                detail: other.to_string(),
            },
        })?;

        let top_features = rank_features(
            &features.names,
            &fitted.feature_importances(),
            self.settings.top_k,
        );

        Ok(SegmentResult {
            key: segment.value.clone(),
            rows: segment.len(),
            train_rows: train_rows.len(),
            test_rows: test_rows.len(),
            auc,
            top_features,
        })
    }

    fn log_result(&self, result: &SegmentResult) {
        info!("{}: {} | AUC: {:.4}", self.spec.display, result.key, result.auc);
        for feature in &result.top_features {
            info!("    {:<32} {}", feature.name, feature.importance);
        }
    }
}
