// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Error code range: 1001-1004
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Input could not be parsed as audio
    pub const DECODE_FAILED: i32 = 1001;

    /// Decoded waveform has zero samples
    pub const EMPTY_AUDIO: i32 = 1002;

    /// Sample-rate conversion failed
    pub const RESAMPLE_FAILED: i32 = 1003;

    /// Underlying file or stream I/O failed
    pub const IO: i32 = 1004;
}

/// Log an audio error with structured context
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=WaveformLoader, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Waveform loader errors
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Input is not decodable audio (unknown container, corrupt stream, no track)
    Decode { reason: String },

    /// Decoding succeeded but produced no samples
    EmptyAudio,

    /// Resampler construction or processing failed
    Resample { reason: String },

    /// File could not be opened or read
    Io { details: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::Decode { .. } => AudioErrorCodes::DECODE_FAILED,
            AudioError::EmptyAudio => AudioErrorCodes::EMPTY_AUDIO,
            AudioError::Resample { .. } => AudioErrorCodes::RESAMPLE_FAILED,
            AudioError::Io { .. } => AudioErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::Decode { reason } => format!("Failed to decode audio: {}", reason),
            AudioError::EmptyAudio => "Decoded audio is empty".to_string(),
            AudioError::Resample { reason } => format!("Resampling failed: {}", reason),
            AudioError::Io { details } => format!("Audio I/O error: {}", details),
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

/// Convert from std::io::Error to AudioError
impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::Io {
            details: err.to_string(),
        }
    }
}
