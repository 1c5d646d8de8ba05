//! Stationary noise reduction by spectral gating
//!
//! The noise profile is estimated from the clip itself: for every frequency
//! bin, the mean and standard deviation of its dB magnitude across all frames.
//! Cells louder than `mean + 1.5 * std` are kept, the rest are gated out. The
//! binary mask is smoothed with a triangular kernel (500 Hz by 50 ms) before
//! it is applied, and the result is resynthesized by overlap-add.

use crate::analysis::features::fft::{ComplexSpectrogram, Stft};

const N_FFT: usize = 1024;
const HOP: usize = N_FFT / 4;
const N_STD_THRESH: f64 = 1.5;
const FREQ_SMOOTH_HZ: f64 = 500.0;
const TIME_SMOOTH_MS: f64 = 50.0;
const AMIN: f64 = 1e-10;
const TOP_DB: f64 = 80.0;

pub struct StationaryDenoiser {
    stft: Stft,
    /// Normalized smoothing kernel, `[time][freq]`
    kernel: Vec<Vec<f64>>,
}

/// Symmetric triangle of length `2n + 1` peaking at 1
fn triangle(n: usize) -> Vec<f64> {
    (0..2 * n + 1)
        .map(|i| 1.0 - (i as f64 - n as f64).abs() / (n as f64 + 1.0))
        .collect()
}

impl StationaryDenoiser {
    pub fn new(sample_rate: u32) -> Self {
        let n_grad_freq = (FREQ_SMOOTH_HZ / (sample_rate as f64 / (N_FFT / 2) as f64)) as usize;
        let n_grad_time = (TIME_SMOOTH_MS / (HOP as f64 / sample_rate as f64 * 1000.0)) as usize;

        let freq = triangle(n_grad_freq);
        let time = triangle(n_grad_time);
        let mut kernel: Vec<Vec<f64>> = time
            .iter()
            .map(|&t| freq.iter().map(|&f| t * f).collect())
            .collect();
        let total: f64 = kernel.iter().flatten().sum();
        for row in kernel.iter_mut() {
            for w in row.iter_mut() {
                *w /= total;
            }
        }

        Self {
            stft: Stft::new(N_FFT, HOP),
            kernel,
        }
    }

    /// Return a denoised copy of `samples` with the same length
    pub fn reduce(&self, samples: &[f32]) -> Vec<f32> {
        if samples.is_empty() {
            return Vec::new();
        }

        let signal: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
        let spectrum = self.stft.forward(&signal);
        let db = amplitude_to_db(&spectrum);

        let n_frames = db.len() as f64;
        let n_bins = self.stft.n_bins();
        let thresholds: Vec<f64> = (0..n_bins)
            .map(|bin| {
                let mean = db.iter().map(|f| f[bin]).sum::<f64>() / n_frames;
                let var = db.iter().map(|f| (f[bin] - mean).powi(2)).sum::<f64>() / n_frames;
                mean + N_STD_THRESH * var.sqrt()
            })
            .collect();

        let mask: Vec<Vec<f64>> = db
            .iter()
            .map(|frame| {
                frame
                    .iter()
                    .zip(thresholds.iter())
                    .map(|(&v, &t)| if v > t { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect();
        let mask = self.smooth(&mask);

        let gated: ComplexSpectrogram = spectrum
            .iter()
            .zip(mask.iter())
            .map(|(frame, m)| frame.iter().zip(m.iter()).map(|(&c, &g)| c * g).collect())
            .collect();

        self.stft
            .inverse(&gated, samples.len())
            .into_iter()
            .map(|s| s as f32)
            .collect()
    }

    /// Same-size 2-D convolution of the mask with the smoothing kernel
    fn smooth(&self, mask: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let n_frames = mask.len() as isize;
        let n_bins = mask.first().map(Vec::len).unwrap_or(0) as isize;
        let half_t = (self.kernel.len() / 2) as isize;
        let half_f = (self.kernel.first().map(Vec::len).unwrap_or(1) / 2) as isize;

        (0..n_frames)
            .map(|t| {
                (0..n_bins)
                    .map(|f| {
                        let mut acc = 0.0;
                        for (kt, row) in self.kernel.iter().enumerate() {
                            let tt = t + kt as isize - half_t;
                            if tt < 0 || tt >= n_frames {
                                continue;
                            }
                            let frame = &mask[tt as usize];
                            for (kf, &w) in row.iter().enumerate() {
                                let ff = f + kf as isize - half_f;
                                if ff >= 0 && ff < n_bins {
                                    acc += w * frame[ff as usize];
                                }
                            }
                        }
                        acc
                    })
                    .collect()
            })
            .collect()
    }
}

/// dB magnitude, clipped to `TOP_DB` below the loudest cell
fn amplitude_to_db(spectrum: &ComplexSpectrogram) -> Vec<Vec<f64>> {
    let mut db: Vec<Vec<f64>> = spectrum
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|c| 20.0 * c.norm().max(AMIN).log10())
                .collect()
        })
        .collect();
    let max_db = db.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
    for value in db.iter_mut().flatten() {
        *value = value.max(max_db - TOP_DB);
    }
    db
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn rms(signal: &[f32]) -> f32 {
        (signal.iter().map(|s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
    }

    #[test]
    fn test_kernel_is_normalized() {
        let denoiser = StationaryDenoiser::new(22_050);
        let total: f64 = denoiser.kernel.iter().flatten().sum();
        assert!((total - 1.0).abs() < 1e-12);
        // 11 bins and 4 frames each side at 22.05 kHz
        assert_eq!(denoiser.kernel.len(), 9);
        assert_eq!(denoiser.kernel[0].len(), 23);
    }

    #[test]
    fn test_output_length_matches_input() {
        let denoiser = StationaryDenoiser::new(22_050);
        let signal: Vec<f32> = (0..5000).map(|i| ((i as f32) * 0.05).sin()).collect();
        assert_eq!(denoiser.reduce(&signal).len(), 5000);
        assert!(denoiser.reduce(&[]).is_empty());
    }

    #[test]
    fn test_steady_noise_is_attenuated_around_a_burst() {
        let sample_rate = 22_050;
        let denoiser = StationaryDenoiser::new(sample_rate);
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);

        // Quiet noise everywhere, a short loud tone after the first second
        let signal: Vec<f32> = (0..sample_rate as usize * 3)
            .map(|i| {
                let noise = rng.gen_range(-0.05..0.05);
                let in_burst = (22_050..28_665).contains(&i);
                let tone = if in_burst {
                    0.8 * (2.0 * std::f32::consts::PI * 600.0 * i as f32 / sample_rate as f32).sin()
                } else {
                    0.0
                };
                noise + tone
            })
            .collect();

        let cleaned = denoiser.reduce(&signal);
        let noise_before = rms(&signal[..15_000]);
        let noise_after = rms(&cleaned[..15_000]);
        let tone_after = rms(&cleaned[23_000..27_500]);

        println!("noise rms {} -> {}, tone rms {}", noise_before, noise_after, tone_after);
        assert!(noise_after < noise_before * 0.5);
        assert!(tone_after > 0.15);
    }
}
