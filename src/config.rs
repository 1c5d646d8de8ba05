//! Configuration management
//!
//! Two kinds of settings live here:
//!
//! - The feature contract (`FeatureConfig::CONTRACT`). These values are baked
//!   into every trained model; they are compiled in and versioned via
//!   `FEATURE_SET_VERSION` so they cannot drift between the training and
//!   serving paths.
//! - Runtime configuration (`AppConfig`) loaded from a JSON file, covering the
//!   prediction service and the training pipeline. Missing or malformed files
//!   fall back to defaults with a warning.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::forest::ForestParams;

/// Version of the feature layout. Bump whenever any `FeatureConfig` value or
/// the slot order of `FeatureVector` changes; artifacts trained under another
/// version are refused at load time.
pub const FEATURE_SET_VERSION: u32 = 1;

/// Predictions strictly above this confidence are written to the prediction log
pub const CONFIDENCE_LOG_THRESHOLD: f64 = 0.5;

/// Class names in the order the training corpus is walked
pub const DEFAULT_CLASSES: [&str; 5] = ["hungry", "belly_pain", "burping", "discomfort", "tired"];

/// Fixed loader and feature-extraction parameters shared by training and serving
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Target sample rate in Hz
    pub sample_rate: u32,
    /// Maximum clip duration in seconds
    pub max_duration_secs: u32,
    /// STFT frame size
    pub n_fft: usize,
    /// STFT hop size
    pub hop_length: usize,
    /// Number of cepstral coefficients kept
    pub n_mfcc: usize,
    /// Number of mel bands feeding the cepstrum
    pub n_mels: usize,
    /// Number of pitch classes
    pub n_chroma: usize,
    /// Octave sub-bands for spectral contrast (output has n + 1 rows)
    pub contrast_bands: usize,
    /// Lower edge of the first contrast sub-band in Hz
    pub contrast_fmin: f64,
    /// Quantile used for contrast peaks and valleys
    pub contrast_quantile: f64,
    /// Waveforms longer than this many samples are denoised
    pub denoise_threshold: usize,
    /// Length of the final feature vector
    pub feature_len: usize,
}

impl FeatureConfig {
    pub const CONTRACT: FeatureConfig = FeatureConfig {
        sample_rate: 22_050,
        max_duration_secs: 5,
        n_fft: 2048,
        hop_length: 512,
        n_mfcc: 13,
        n_mels: 128,
        n_chroma: 12,
        contrast_bands: 6,
        contrast_fmin: 200.0,
        contrast_quantile: 0.02,
        denoise_threshold: 2048,
        feature_len: 53,
    };

    /// Exact number of samples every clip is padded or truncated to
    pub fn target_len(&self) -> usize {
        self.sample_rate as usize * self.max_duration_secs as usize
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub training: TrainingConfig,
}

/// Prediction service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP listener binds to
    pub bind_addr: String,
    /// Directory holding the paired model and label-encoder artifacts
    pub model_dir: PathBuf,
    /// Optional JSON-lines file that confident predictions are appended to
    pub prediction_log: Option<PathBuf>,
    /// Number of predictions retained in memory for `/history`
    pub history_capacity: usize,
    /// Origins allowed by the CORS layer
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            model_dir: PathBuf::from("models"),
            prediction_log: None,
            history_capacity: 1000,
            allowed_origins: vec![
                "http://localhost".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:19006".to_string(),
            ],
        }
    }
}

/// Training pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Corpus root; each class has a sub-directory named after it
    pub data_dir: PathBuf,
    /// Classes to load, each must exist as a directory
    pub classes: Vec<String>,
    /// Fraction of every class held out for evaluation
    pub test_fraction: f64,
    /// Seed for the split and the forest
    pub seed: u64,
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            classes: DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect(),
            test_fraction: 0.2,
            seed: 42,
            forest: ForestParams::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from `CRY_CONFIG` (default `config.json`) and apply
    /// environment overrides
    pub fn load() -> Self {
        let path = std::env::var("CRY_CONFIG").unwrap_or_else(|_| "config.json".to_string());
        let mut config = if Path::new(&path).exists() {
            Self::load_from_file(&path)
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config
    }

    /// Apply `CRY_SERVER_ADDR` and `CRY_MODEL_DIR` on top of the loaded values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("CRY_SERVER_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("CRY_MODEL_DIR") {
            self.server.model_dir = PathBuf::from(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_values() {
        let contract = FeatureConfig::CONTRACT;
        assert_eq!(contract.sample_rate, 22_050);
        assert_eq!(contract.n_fft, 2048);
        assert_eq!(contract.hop_length, 512);
        assert_eq!(contract.target_len(), 110_250);
        assert_eq!(
            2 * contract.n_mfcc + contract.n_chroma + contract.contrast_bands + 1 + 6 + 2,
            contract.feature_len
        );
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8000");
        assert_eq!(config.training.classes.len(), 5);
        assert_eq!(config.training.test_fraction, 0.2);
        assert_eq!(config.training.forest.n_trees, 200);
        assert_eq!(config.training.forest.max_depth, Some(15));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.server.model_dir, config.server.model_dir);
        assert_eq!(parsed.training.seed, config.training.seed);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"server": {"bind_addr": "0.0.0.0:9000"}}"#).unwrap();
        assert_eq!(parsed.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(parsed.server.history_capacity, 1000);
        assert_eq!(parsed.training.seed, 42);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/cry_config.json");
        assert_eq!(config.server.bind_addr, ServerConfig::default().bind_addr);
    }
}
