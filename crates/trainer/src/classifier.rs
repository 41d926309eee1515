//! Classifier capability
//!
//! The pipeline only needs `fit`, `predict_proba` and a native importance
//! vector, so any boosting implementation can stand behind these traits.

use std::time::Instant;

use propensity_gbdt::{BoostedModel, FeatureMatrix, GbdtConfig, GbdtError, GbdtTrainer, ImportanceType};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("deadline exceeded after {completed_rounds} boosting rounds")]
    TimedOut { completed_rounds: usize },

    #[error("{0}")]
    Failed(String),
}

impl From<GbdtError> for FitError {
    fn from(err: GbdtError) -> Self {
        match err {
            GbdtError::DeadlineExceeded { completed_rounds } => FitError::TimedOut { completed_rounds },
            other => FitError::Failed(other.to_string()),
        }
    }
}

/// Something that can be fitted to a binary target
pub trait Classifier: Send + Sync {
    type Model: FittedClassifier;

    fn fit(
        &self,
        features: &FeatureMatrix,
        labels: &[f64],
        categorical: &[usize],
        deadline: Option<Instant>,
    ) -> Result<Self::Model, FitError>;
}

pub trait FittedClassifier: Send {
    /// Positive-class probability per row
    fn predict_proba(&self, features: &FeatureMatrix) -> Vec<f64>;

    /// One score per input feature, in feature order
    fn feature_importances(&self) -> Vec<f64>;
}

/// Boosted trees from `propensity-gbdt`
#[derive(Debug, Clone, Default)]
pub struct GbdtClassifier {
    trainer: GbdtTrainer,
    importance: ImportanceType,
}

impl GbdtClassifier {
    pub fn new(config: GbdtConfig, importance: ImportanceType) -> Self {
        Self {
            trainer: GbdtTrainer::new(config),
            importance,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FittedGbdt {
    pub model: BoostedModel,
    importance: ImportanceType,
}

impl Classifier for GbdtClassifier {
    type Model = FittedGbdt;

    fn fit(
        &self,
        features: &FeatureMatrix,
        labels: &[f64],
        categorical: &[usize],
        deadline: Option<Instant>,
    ) -> Result<FittedGbdt, FitError> {
        let model = self.trainer.train_until(features, labels, categorical, deadline)?;
        Ok(FittedGbdt {
            model,
            importance: self.importance,
        })
    }
}

impl FittedClassifier for FittedGbdt {
    fn predict_proba(&self, features: &FeatureMatrix) -> Vec<f64> {
        self.model.predict_proba(features)
    }

    fn feature_importances(&self) -> Vec<f64> {
        self.model.feature_importance(self.importance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn data() -> (FeatureMatrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..200)
            .map(|i| vec![f64::from(i % 3), f64::from(i)])
            .collect();
        let labels = (0..200).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }).collect();
        (FeatureMatrix::from_rows(&rows).unwrap(), labels)
    }

    #[test]
    fn test_fit_predict_and_importance() {
        let (x, y) = data();
        let classifier = GbdtClassifier::new(
            GbdtConfig {
                n_estimators: 20,
                ..GbdtConfig::default()
            },
            ImportanceType::Split,
        );

        let fitted = classifier.fit(&x, &y, &[0], None).unwrap();
        let p = fitted.predict_proba(&x);
        assert!(p[0] > p[1]);

        let importances = fitted.feature_importances();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] > 0.0);
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let (x, y) = data();
        let deadline = Instant::now() - Duration::from_millis(1);
        let err = GbdtClassifier::default()
            .fit(&x, &y, &[0], Some(deadline))
            .unwrap_err();
        assert_eq!(err, FitError::TimedOut { completed_rounds: 0 });
    }

    #[test]
    fn test_invalid_label_is_a_failure() {
        let (x, mut y) = data();
        y[3] = 2.0;
        let err = GbdtClassifier::default().fit(&x, &y, &[], None).unwrap_err();
        assert!(matches!(err, FitError::Failed(_)));
    }
}
