// Infant cry classifier core
// Audio conditioning, 53-slot feature extraction, random-forest classification,
// training pipeline and an optional HTTP prediction service

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod history;
#[cfg(feature = "http")]
pub mod http;
pub mod training;

// Re-exports for convenience
pub use analysis::{
    ClassificationResult, ClipProcessor, CryClassifier, FeatureExtractor, FeatureVector,
    ModelArtifacts, ModelHandle, PredictionResponse,
};
pub use audio::{Waveform, WaveformLoader};
pub use config::{AppConfig, FeatureConfig, FEATURE_SET_VERSION};
pub use error::{AudioError, CryError, ErrorCode, FeatureError, ModelError, TrainingError};
pub use training::{TrainingPipeline, TrainingReport};

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber; the level comes from `RUST_LOG` (default `info`)
///
/// `log` records are bridged into the subscriber. Calling this twice is a no-op.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        log::debug!("Logging already initialized");
    }
}
