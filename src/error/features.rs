// Feature extraction error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Feature extraction error code constants
///
/// Error code range: 2001-2002
pub struct FeatureErrorCodes {}

impl FeatureErrorCodes {
    /// Waveform is empty or contains non-finite samples
    pub const INVALID_INPUT: i32 = 2001;

    /// Sample rate cannot describe a waveform
    pub const INVALID_SAMPLE_RATE: i32 = 2002;
}

/// Log a feature extraction error with structured context
pub fn log_feature_error(err: &FeatureError, context: &str) {
    error!(
        "Feature error in {}: code={}, component=FeatureExtractor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Feature extractor errors
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureError {
    /// Waveform is unusable for extraction
    InvalidInput { reason: String },

    /// Sample rate of zero
    InvalidSampleRate { sample_rate: u32 },
}

impl ErrorCode for FeatureError {
    fn code(&self) -> i32 {
        match self {
            FeatureError::InvalidInput { .. } => FeatureErrorCodes::INVALID_INPUT,
            FeatureError::InvalidSampleRate { .. } => FeatureErrorCodes::INVALID_SAMPLE_RATE,
        }
    }

    fn message(&self) -> String {
        match self {
            FeatureError::InvalidInput { reason } => format!("Invalid waveform: {}", reason),
            FeatureError::InvalidSampleRate { sample_rate } => {
                format!("Invalid sample rate: {} Hz", sample_rate)
            }
        }
    }
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FeatureError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for FeatureError {}
