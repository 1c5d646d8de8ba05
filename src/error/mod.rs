// Error types for the cry classifier
//
// This module defines the typed error taxonomy shared by the loader, the
// feature extractor, the classifier wrapper and the training pipeline. Every
// error carries a numeric code and a human-readable message so callers can
// pattern-match on the kind instead of parsing strings.

mod audio;
mod features;
mod model;
mod training;

use std::fmt;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use features::{log_feature_error, FeatureError, FeatureErrorCodes};
pub use model::{log_model_error, ModelError, ModelErrorCodes};
pub use training::{log_training_error, TrainingError, TrainingErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the HTTP and CLI boundaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Any failure on the path from audio bytes to a classification
///
/// The serving boundary turns every variant into a rejected prediction; no
/// partial results are produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CryError {
    Audio(AudioError),
    Feature(FeatureError),
    Model(ModelError),
}

impl ErrorCode for CryError {
    fn code(&self) -> i32 {
        match self {
            CryError::Audio(err) => err.code(),
            CryError::Feature(err) => err.code(),
            CryError::Model(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            CryError::Audio(err) => err.message(),
            CryError::Feature(err) => err.message(),
            CryError::Model(err) => err.message(),
        }
    }
}

impl fmt::Display for CryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryError::Audio(err) => err.fmt(f),
            CryError::Feature(err) => err.fmt(f),
            CryError::Model(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for CryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CryError::Audio(err) => Some(err),
            CryError::Feature(err) => Some(err),
            CryError::Model(err) => Some(err),
        }
    }
}

/// Log any classification-path error through its category's helper
pub fn log_cry_error(err: &CryError, context: &str) {
    match err {
        CryError::Audio(err) => log_audio_error(err, context),
        CryError::Feature(err) => log_feature_error(err, context),
        CryError::Model(err) => log_model_error(err, context),
    }
}

impl From<AudioError> for CryError {
    fn from(err: AudioError) -> Self {
        CryError::Audio(err)
    }
}

impl From<FeatureError> for CryError {
    fn from(err: FeatureError) -> Self {
        CryError::Feature(err)
    }
}

impl From<ModelError> for CryError {
    fn from(err: ModelError) -> Self {
        CryError::Model(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cry_error_delegates_code_and_message() {
        let err: CryError = AudioError::EmptyAudio.into();
        assert_eq!(err.code(), AudioErrorCodes::EMPTY_AUDIO);
        assert!(err.message().contains("empty"));

        let err: CryError = ModelError::FeatureMismatch {
            expected: 53,
            actual: 10,
        }
        .into();
        assert_eq!(err.code(), ModelErrorCodes::FEATURE_MISMATCH);
        assert!(err.to_string().contains("FeatureMismatch"));
    }

    #[test]
    fn test_every_category_has_a_log_helper() {
        log_audio_error(&AudioError::EmptyAudio, "load_path");
        log_feature_error(&FeatureError::InvalidSampleRate { sample_rate: 0 }, "extract");
        log_model_error(
            &ModelError::ModelLoad {
                reason: "missing".to_string(),
            },
            "startup",
        );
        log_training_error(&TrainingError::EmptyCorpus, "run");
        for err in [
            CryError::Audio(AudioError::EmptyAudio),
            CryError::Feature(FeatureError::InvalidInput {
                reason: "nan".to_string(),
            }),
            CryError::Model(ModelError::FeatureMismatch {
                expected: 53,
                actual: 52,
            }),
        ] {
            log_cry_error(&err, "predict");
        }
    }

    #[test]
    fn test_error_code_trait_objects() {
        let errors: Vec<Box<dyn ErrorCode>> = vec![
            Box::new(AudioError::EmptyAudio),
            Box::new(FeatureError::InvalidInput {
                reason: "empty".to_string(),
            }),
            Box::new(TrainingError::EmptyCorpus),
        ];
        let codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes, vec![1002, 2001, 4003]);
    }
}
