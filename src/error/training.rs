// Training pipeline error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::path::PathBuf;

/// Training error code constants
///
/// Error code range: 4001-4004
pub struct TrainingErrorCodes {}

impl TrainingErrorCodes {
    pub const MISSING_CLASS_DIR: i32 = 4001;
    pub const INCONSISTENT_FEATURE_LENGTHS: i32 = 4002;
    pub const EMPTY_CORPUS: i32 = 4003;
    pub const FIT_FAILED: i32 = 4004;
}

/// Log a training error with structured context
pub fn log_training_error(err: &TrainingError, context: &str) {
    error!(
        "Training error in {}: code={}, component=TrainingPipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Training pipeline errors
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingError {
    /// A configured class has no directory under the corpus root
    MissingClassDir { path: PathBuf },

    /// Extracted feature vectors do not all share one width
    InconsistentFeatureLengths { lengths: Vec<usize> },

    /// No file produced a feature vector
    EmptyCorpus,

    /// Split or forest fitting could not proceed
    Fit { reason: String },
}

impl ErrorCode for TrainingError {
    fn code(&self) -> i32 {
        match self {
            TrainingError::MissingClassDir { .. } => TrainingErrorCodes::MISSING_CLASS_DIR,
            TrainingError::InconsistentFeatureLengths { .. } => {
                TrainingErrorCodes::INCONSISTENT_FEATURE_LENGTHS
            }
            TrainingError::EmptyCorpus => TrainingErrorCodes::EMPTY_CORPUS,
            TrainingError::Fit { .. } => TrainingErrorCodes::FIT_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            TrainingError::MissingClassDir { path } => {
                format!("Missing class directory: {}", path.display())
            }
            TrainingError::InconsistentFeatureLengths { lengths } => {
                format!("Inconsistent feature lengths: {:?}", lengths)
            }
            TrainingError::EmptyCorpus => "No usable audio files found in corpus".to_string(),
            TrainingError::Fit { reason } => format!("Training failed: {}", reason),
        }
    }
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrainingError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TrainingError {}
