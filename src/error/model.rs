// Model error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Model error code constants
///
/// Error code range: 3001-3004
pub struct ModelErrorCodes {}

impl ModelErrorCodes {
    /// Feature vector width differs from the model's expected width
    pub const FEATURE_MISMATCH: i32 = 3001;

    /// Model or label encoding missing, corrupt or incompatible
    pub const MODEL_LOAD: i32 = 3002;

    /// Probability estimation failed
    pub const PREDICTION: i32 = 3003;

    /// Artifacts could not be written
    pub const ARTIFACT_WRITE: i32 = 3004;
}

/// Log a model error with structured context
pub fn log_model_error(err: &ModelError, context: &str) {
    error!(
        "Model error in {}: code={}, component=CryClassifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Classifier and artifact errors
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Width check failed before estimation was attempted
    FeatureMismatch { expected: usize, actual: usize },

    /// Artifacts cannot back a classifier; fatal at startup
    ModelLoad { reason: String },

    /// Unexpected failure inside probability estimation
    Prediction { reason: String },

    /// Saving artifacts failed
    ArtifactWrite { reason: String },
}

impl ErrorCode for ModelError {
    fn code(&self) -> i32 {
        match self {
            ModelError::FeatureMismatch { .. } => ModelErrorCodes::FEATURE_MISMATCH,
            ModelError::ModelLoad { .. } => ModelErrorCodes::MODEL_LOAD,
            ModelError::Prediction { .. } => ModelErrorCodes::PREDICTION,
            ModelError::ArtifactWrite { .. } => ModelErrorCodes::ARTIFACT_WRITE,
        }
    }

    fn message(&self) -> String {
        match self {
            ModelError::FeatureMismatch { expected, actual } => {
                format!("Expected {} features, got {}", expected, actual)
            }
            ModelError::ModelLoad { reason } => format!("Model loading failed: {}", reason),
            ModelError::Prediction { reason } => format!("Prediction failed: {}", reason),
            ModelError::ArtifactWrite { reason } => {
                format!("Failed to write model artifacts: {}", reason)
            }
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ModelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_codes() {
        assert_eq!(
            ModelError::FeatureMismatch {
                expected: 53,
                actual: 52
            }
            .code(),
            3001
        );
        assert_eq!(
            ModelError::ModelLoad {
                reason: "x".to_string()
            }
            .code(),
            3002
        );
        assert_eq!(
            ModelError::Prediction {
                reason: "x".to_string()
            }
            .code(),
            3003
        );
        assert_eq!(
            ModelError::ArtifactWrite {
                reason: "x".to_string()
            }
            .code(),
            3004
        );
    }

    #[test]
    fn test_feature_mismatch_message() {
        let err = ModelError::FeatureMismatch {
            expected: 53,
            actual: 54,
        };
        assert_eq!(err.message(), "Expected 53 features, got 54");
    }
}
