// FFT module - short-time Fourier transform
//
// Frames are centered: the signal is zero-padded by n_fft / 2 on both sides,
// so a signal of N samples yields 1 + N / hop frames. Each frame is weighted
// by a periodic Hann window before the forward transform. Only the
// n_fft / 2 + 1 non-negative frequency bins are kept.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Complex STFT laid out as `[frame][bin]`
pub type ComplexSpectrogram = Vec<Vec<Complex<f64>>>;

/// Real-valued spectrogram laid out as `[frame][bin]`
pub type Spectrogram = Vec<Vec<f64>>;

/// Forward and inverse STFT with a fixed frame and hop size
pub struct Stft {
    n_fft: usize,
    hop: usize,
    /// Periodic Hann window (pre-computed)
    window: Vec<f64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let window = (0..n_fft)
            .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n_fft as f64).cos())
            .collect();

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(n_fft);
        let inverse = planner.plan_fft_inverse(n_fft);

        Self {
            n_fft,
            hop,
            window,
            forward,
            inverse,
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of centered frames for a signal of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    /// Compute the centered complex STFT of `signal`
    pub fn forward(&self, signal: &[f64]) -> ComplexSpectrogram {
        let pad = self.n_fft / 2;
        let n_frames = self.frame_count(signal.len());
        let mut frames = Vec::with_capacity(n_frames);
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];

        for frame in 0..n_frames {
            let start = frame * self.hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                // Position in the unpadded signal; outside it reads as zero
                let sample = (start + i)
                    .checked_sub(pad)
                    .and_then(|pos| signal.get(pos))
                    .copied()
                    .unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[i], 0.0);
            }
            self.forward.process(&mut buffer);
            frames.push(buffer[..self.n_bins()].to_vec());
        }

        frames
    }

    /// Invert a centered STFT by windowed overlap-add
    ///
    /// # Arguments
    /// * `frames` - Spectrogram produced by `forward` (possibly modified)
    /// * `len` - Length of the original signal
    pub fn inverse(&self, frames: &ComplexSpectrogram, len: usize) -> Vec<f64> {
        let pad = self.n_fft / 2;
        let padded_len = self.n_fft + self.hop * frames.len().saturating_sub(1);
        let mut output = vec![0.0; padded_len];
        let mut envelope = vec![0.0; padded_len];
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let scale = 1.0 / self.n_fft as f64;

        for (frame_idx, frame) in frames.iter().enumerate() {
            // Rebuild the full Hermitian-symmetric spectrum
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k < frame.len() {
                    frame[k]
                } else {
                    frame[self.n_fft - k].conj()
                };
            }
            self.inverse.process(&mut buffer);

            let start = frame_idx * self.hop;
            for (i, value) in buffer.iter().enumerate() {
                let w = self.window[i];
                output[start + i] += value.re * scale * w;
                envelope[start + i] += w * w;
            }
        }

        output
            .iter()
            .zip(envelope.iter())
            .skip(pad)
            .take(len)
            .map(|(&y, &env)| if env > 1e-10 { y / env } else { y })
            .collect()
    }
}

/// Magnitude spectrogram (|X|)
pub fn magnitude(stft: &ComplexSpectrogram) -> Spectrogram {
    stft.iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect()
}

/// Power spectrogram (|X|^2)
pub fn power(stft: &ComplexSpectrogram) -> Spectrogram {
    stft.iter()
        .map(|frame| frame.iter().map(|c| c.norm_sqr()).collect())
        .collect()
}

/// Center frequency of every STFT bin in Hz
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    let n_bins = n_fft / 2 + 1;
    (0..n_bins)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect()
}
