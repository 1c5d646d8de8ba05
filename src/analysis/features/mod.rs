// FeatureExtractor - acoustic feature extraction for cry classification
//
// This module turns a mono waveform into the fixed 53-slot FeatureVector that
// every trained model consumes. It is the single implementation shared by the
// training pipeline and the prediction service; both reach it through
// `FeatureExtractor::extract`, so the two paths cannot diverge.
//
// Module organization:
// - types: FeatureVector and its slot layout
// - fft: centered STFT (forward and inverse)
// - mel: mel filterbank, dB conversion, DCT, cepstral coefficients
// - chroma: chroma filterbank, chromagram, tonal centroid
// - contrast: octave-band spectral contrast
// - temporal: RMS energy and zero-crossing rate
// - mod.rs: Coordinator (FeatureExtractor)
//
// All arithmetic is done in f64 over a single STFT (n_fft 2048, hop 512), and
// every per-frame feature is summarized by its mean across frames (plus the
// standard deviation for cepstral coefficients).

pub mod chroma;
pub mod contrast;
pub mod fft;
pub mod mel;
pub mod temporal;
mod types;

pub use types::{
    FeatureVector, CHROMA_MEAN, CONTRAST_MEAN, FEATURE_LEN, MFCC_MEAN, MFCC_STD, RMS_MEAN,
    TONNETZ_MEAN, ZCR_MEAN,
};

use crate::audio::Waveform;
use crate::config::FeatureConfig;
use crate::error::FeatureError;

use contrast::ContrastBands;
use fft::{Spectrogram, Stft};
use temporal::TemporalFeatures;

/// Sample-rate dependent filterbanks
struct FilterBanks {
    sample_rate: u32,
    mel: Vec<Vec<f64>>,
    chroma: Vec<Vec<f64>>,
    contrast: ContrastBands,
}

impl FilterBanks {
    fn new(config: &FeatureConfig, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            mel: mel::mel_filterbank(sample_rate, config.n_fft, config.n_mels),
            chroma: chroma::chroma_filterbank(sample_rate, config.n_fft, config.n_chroma),
            contrast: ContrastBands::new(
                sample_rate,
                config.n_fft,
                config.contrast_bands,
                config.contrast_fmin,
                config.contrast_quantile,
            ),
        }
    }
}

/// FeatureExtractor coordinates the feature extraction pipeline
///
/// Holds only immutable, pre-computed tables (window, FFT plans,
/// filterbanks), so a single instance can be shared across threads and
/// extraction has no dependency on call order.
pub struct FeatureExtractor {
    config: FeatureConfig,
    stft: Stft,
    temporal: TemporalFeatures,
    /// Filterbanks for the contract sample rate
    banks: FilterBanks,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    /// Create an extractor for the fixed feature contract
    pub fn new() -> Self {
        let config = FeatureConfig::CONTRACT;
        Self {
            stft: Stft::new(config.n_fft, config.hop_length),
            temporal: TemporalFeatures::new(config.n_fft, config.hop_length),
            banks: FilterBanks::new(&config, config.sample_rate),
            config,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract the feature vector of a loaded waveform
    pub fn extract_waveform(&self, waveform: &Waveform) -> Result<FeatureVector, FeatureError> {
        self.extract(waveform.samples(), waveform.sample_rate())
    }

    /// Extract the feature vector of raw samples
    ///
    /// # Arguments
    /// * `samples` - Mono waveform, nominally in [-1.0, 1.0]
    /// * `sample_rate` - Sample rate of `samples` in Hz
    ///
    /// # Errors
    /// `FeatureError::InvalidInput` for an empty waveform or non-finite
    /// samples, `FeatureError::InvalidSampleRate` for a zero sample rate.
    pub fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<FeatureVector, FeatureError> {
        if samples.is_empty() {
            return Err(FeatureError::InvalidInput {
                reason: "waveform is empty".to_string(),
            });
        }
        if sample_rate == 0 {
            return Err(FeatureError::InvalidSampleRate { sample_rate });
        }
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(FeatureError::InvalidInput {
                reason: format!("non-finite sample at index {}", pos),
            });
        }

        // Clips at a foreign rate get their own tables; the result is the same
        // as an extractor built for that rate
        let local_banks;
        let banks = if sample_rate == self.banks.sample_rate {
            &self.banks
        } else {
            local_banks = FilterBanks::new(&self.config, sample_rate);
            &local_banks
        };

        let signal: Vec<f64> = samples.iter().map(|&s| s as f64).collect();

        let stft = self.stft.forward(&signal);
        let power = fft::power(&stft);
        let magnitude = fft::magnitude(&stft);

        let mfcc = mel::mfcc(&power, &banks.mel, self.config.n_mfcc);
        let (mfcc_mean, mfcc_std) = column_mean_std(&mfcc);

        let chromagram = chroma::chromagram(&power, &banks.chroma);
        let (chroma_mean, _) = column_mean_std(&chromagram);

        let contrast = banks.contrast.contrast(&magnitude);
        let (contrast_mean, _) = column_mean_std(&contrast);

        let tonnetz = chroma::tonnetz(&chromagram);
        let (tonnetz_mean, _) = column_mean_std(&tonnetz);

        let rms_mean = mean(&self.temporal.compute_rms(&signal));
        let zcr_mean = mean(&self.temporal.compute_zcr(&signal));

        tracing::debug!(
            frames = stft.len(),
            samples = samples.len(),
            sample_rate,
            "[FeatureExtractor] extracted feature vector"
        );

        Ok(FeatureVector::from_parts(
            &mfcc_mean,
            &mfcc_std,
            &chroma_mean,
            &contrast_mean,
            &tonnetz_mean,
            rms_mean,
            zcr_mean,
        ))
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Per-column mean and population standard deviation of `[frame][column]` data
fn column_mean_std(frames: &Spectrogram) -> (Vec<f64>, Vec<f64>) {
    let n_cols = frames.first().map(Vec::len).unwrap_or(0);
    let n = frames.len().max(1) as f64;

    let means: Vec<f64> = (0..n_cols)
        .map(|c| frames.iter().map(|f| f[c]).sum::<f64>() / n)
        .collect();
    let stds: Vec<f64> = (0..n_cols)
        .map(|c| {
            let var = frames.iter().map(|f| (f[c] - means[c]).powi(2)).sum::<f64>() / n;
            var.sqrt()
        })
        .collect();

    (means, stds)
}
