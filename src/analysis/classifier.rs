// Classifier - trained-model wrapper turning feature vectors into labels
//
// The wrapper owns a probability estimator and its label encoding. Every
// prediction is width-checked against the trained input width before the
// estimator is touched, so a mismatched vector can never reach the model.
//
// Serving shares one immutable `CryClassifier` behind `ModelHandle`; a reload
// builds a complete new instance and swaps the `Arc`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::analysis::forest::arg_max;
use crate::analysis::model::{LabelEncoding, ModelArtifacts, ProbabilisticModel};
use crate::config::FeatureConfig;
use crate::error::{ErrorCode, ModelError};

/// Result of classifying one feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Most probable class, first in trained order on ties
    pub label: String,
    /// Probability of `label`; always the maximum of `probabilities`
    pub confidence: f64,
    /// Probability per trained class
    pub probabilities: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Success,
    Error,
}

/// Response envelope handed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: String,
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
    pub status: PredictionStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
}

impl PredictionResponse {
    /// Structured failure: no label, zero confidence, empty distribution
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            prediction: "unknown".to_string(),
            confidence: 0.0,
            probabilities: BTreeMap::new(),
            status: PredictionStatus::Error,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PredictionStatus::Success
    }
}

impl From<ClassificationResult> for PredictionResponse {
    fn from(result: ClassificationResult) -> Self {
        Self {
            prediction: result.label,
            confidence: result.confidence,
            probabilities: result.probabilities,
            status: PredictionStatus::Success,
            message: None,
        }
    }
}

/// Trained model plus the label encoding it was fitted with
pub struct CryClassifier {
    model: Box<dyn ProbabilisticModel>,
    encoding: LabelEncoding,
    expected_width: usize,
}

impl CryClassifier {
    /// Pair a model with its encoding
    ///
    /// The expected width comes from the model, falling back to the feature
    /// contract length when the model does not record one.
    pub fn new(
        model: Box<dyn ProbabilisticModel>,
        encoding: LabelEncoding,
    ) -> Result<Self, ModelError> {
        if model.n_classes() != encoding.len() {
            return Err(ModelError::ModelLoad {
                reason: format!(
                    "model has {} classes but label encoding has {}",
                    model.n_classes(),
                    encoding.len()
                ),
            });
        }
        let expected_width = model
            .n_features()
            .unwrap_or(FeatureConfig::CONTRACT.feature_len);

        Ok(Self {
            model,
            encoding,
            expected_width,
        })
    }

    pub fn from_artifacts(artifacts: ModelArtifacts) -> Result<Self, ModelError> {
        Self::new(Box::new(artifacts.forest), artifacts.encoding)
    }

    /// Load the artifact pair from `dir`
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, ModelError> {
        let classifier = Self::from_artifacts(ModelArtifacts::load(dir.as_ref())?)?;
        log::info!(
            "[Classifier] Loaded model from {:?}: classes={:?}, expected_features={}",
            dir.as_ref(),
            classifier.classes(),
            classifier.expected_width
        );
        Ok(classifier)
    }

    pub fn classes(&self) -> &[String] {
        self.encoding.classes()
    }

    pub fn expected_width(&self) -> usize {
        self.expected_width
    }

    /// Classify one feature vector
    pub fn predict(&self, features: &[f64]) -> Result<ClassificationResult, ModelError> {
        if features.len() != self.expected_width {
            return Err(ModelError::FeatureMismatch {
                expected: self.expected_width,
                actual: features.len(),
            });
        }

        let proba = self.model.predict_proba(features)?;
        if proba.len() != self.encoding.len() {
            return Err(ModelError::Prediction {
                reason: format!(
                    "estimator returned {} probabilities for {} classes",
                    proba.len(),
                    self.encoding.len()
                ),
            });
        }
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(ModelError::Prediction {
                reason: "estimator returned a non-finite probability".to_string(),
            });
        }

        let best = arg_max(&proba);
        let label = self
            .encoding
            .decode(best)
            .ok_or_else(|| ModelError::Prediction {
                reason: format!("class index {} out of range", best),
            })?
            .to_string();

        let probabilities = self
            .encoding
            .classes()
            .iter()
            .cloned()
            .zip(proba.iter().copied())
            .collect();

        tracing::debug!(label = %label, confidence = proba[best], "classified");

        Ok(ClassificationResult {
            label,
            confidence: proba[best],
            probabilities,
        })
    }

    /// Classify several vectors; the first failure aborts the batch
    pub fn predict_batch(
        &self,
        batch: &[Vec<f64>],
    ) -> Result<Vec<ClassificationResult>, ModelError> {
        batch.iter().map(|features| self.predict(features)).collect()
    }

    /// Classify and wrap the outcome in the client envelope
    ///
    /// Failures become a `status: "error"` response instead of an `Err`.
    pub fn respond(&self, features: &[f64]) -> PredictionResponse {
        match self.predict(features) {
            Ok(result) => result.into(),
            Err(err) => {
                log::warn!("[Classifier] Prediction failed: {}", err.message());
                PredictionResponse::error(err.message())
            }
        }
    }
}

/// Swappable shared classifier
///
/// Readers clone the inner `Arc` and release the lock immediately; in-flight
/// predictions keep the instance they started with across a swap.
pub struct ModelHandle {
    current: RwLock<Arc<CryClassifier>>,
}

impl ModelHandle {
    pub fn new(classifier: CryClassifier) -> Self {
        Self {
            current: RwLock::new(Arc::new(classifier)),
        }
    }

    pub fn get(&self) -> Arc<CryClassifier> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => {
                log::error!("[Classifier] Model lock poisoned on read, recovering");
                Arc::clone(&poisoned.into_inner())
            }
        }
    }

    /// Replace the classifier, returning the previous one
    pub fn swap(&self, classifier: CryClassifier) -> Arc<CryClassifier> {
        self.install(Arc::new(classifier))
    }

    /// Load artifacts from `dir` and swap them in; the current model stays on failure
    ///
    /// Returns the instance this call installed, even if another swap has
    /// already replaced it.
    pub fn reload<P: AsRef<Path>>(&self, dir: P) -> Result<Arc<CryClassifier>, ModelError> {
        let loaded = Arc::new(CryClassifier::load(dir)?);
        self.install(Arc::clone(&loaded));
        Ok(loaded)
    }

    fn install(&self, next: Arc<CryClassifier>) -> Arc<CryClassifier> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::error!("[Classifier] Model lock poisoned on write, recovering");
                poisoned.into_inner()
            }
        };
        std::mem::replace(&mut *guard, next)
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
