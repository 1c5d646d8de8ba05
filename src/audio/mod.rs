// Audio module - clip decoding and conditioning
//
// Turns an audio file or byte stream into a `Waveform` at the contract sample
// rate and length:
// - loader: decode (WAV via hound, other containers via symphonia), downmix,
//   resample, truncate, denoise, pad
// - resample: band-limited sample-rate conversion
// - denoise: stationary spectral gating

pub mod denoise;
pub mod loader;
pub mod resample;

pub use denoise::StationaryDenoiser;
pub use loader::{DecodedAudio, WaveformLoader};

use crate::error::AudioError;

/// Mono waveform paired with its sample rate
///
/// Never empty; the constructor rejects zero-length sample buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AudioError> {
        if samples.is_empty() {
            return Err(AudioError::EmptyAudio);
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_waveform_is_rejected() {
        assert_eq!(Waveform::new(vec![], 22_050), Err(AudioError::EmptyAudio));
    }

    #[test]
    fn test_waveform_duration() {
        let waveform = Waveform::new(vec![0.0; 44_100], 22_050).unwrap();
        assert_eq!(waveform.len(), 44_100);
        assert!((waveform.duration_secs() - 2.0).abs() < 1e-12);
    }
}
