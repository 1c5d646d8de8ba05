// Mel module - mel filterbank and cepstral coefficients
//
// The filterbank uses the Slaney mel scale (linear below 1 kHz, logarithmic
// above) with area-normalized triangles. Cepstral coefficients are the
// orthonormal DCT-II of the log-power mel spectrogram.

use super::fft::{fft_frequencies, Spectrogram};

/// Smallest power admitted before taking the logarithm
const AMIN: f64 = 1e-10;

/// Dynamic range kept below the loudest cell, in dB
const TOP_DB: f64 = 80.0;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filterbank, `[n_mels][n_fft / 2 + 1]`, spanning 0 Hz to Nyquist
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f64>> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let min_mel = hz_to_mel(0.0);
    let max_mel = hz_to_mel(sample_rate as f64 / 2.0);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let lower_width = mel_points[m + 1] - mel_points[m];
            let upper_width = mel_points[m + 2] - mel_points[m + 1];
            let enorm = 2.0 / (mel_points[m + 2] - mel_points[m]);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - mel_points[m]) / lower_width;
                    let upper = (mel_points[m + 2] - f) / upper_width;
                    lower.min(upper).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

/// Apply a filterbank (`[filters][bins]`) to every frame of a spectrogram
pub fn apply_filterbank(bank: &[Vec<f64>], spectrogram: &Spectrogram) -> Spectrogram {
    spectrogram
        .iter()
        .map(|frame| {
            bank.iter()
                .map(|filter| filter.iter().zip(frame.iter()).map(|(w, s)| w * s).sum())
                .collect()
        })
        .collect()
}

/// Convert power values to decibels (reference 1.0), clipped to `TOP_DB`
/// below the maximum over the whole spectrogram
pub fn power_to_db(spectrogram: &Spectrogram) -> Spectrogram {
    let mut db: Spectrogram = spectrogram
        .iter()
        .map(|frame| frame.iter().map(|&p| 10.0 * p.max(AMIN).log10()).collect())
        .collect();

    let max_db = db
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .fold(f64::NEG_INFINITY, f64::max);
    let floor = max_db - TOP_DB;
    for frame in db.iter_mut() {
        for value in frame.iter_mut() {
            *value = value.max(floor);
        }
    }
    db
}

/// Orthonormal DCT-II of `input`, keeping the first `n_out` coefficients
pub fn dct_ortho(input: &[f64], n_out: usize) -> Vec<f64> {
    let n = input.len() as f64;
    (0..n_out)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| {
                    x * (std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n))
                        .cos()
                })
                .sum();
            let scale = if k == 0 {
                (1.0 / n).sqrt()
            } else {
                (2.0 / n).sqrt()
            };
            sum * scale
        })
        .collect()
}

/// Cepstral coefficients per frame, `[frame][n_mfcc]`, from a power spectrogram
pub fn mfcc(power_spec: &Spectrogram, mel_bank: &[Vec<f64>], n_mfcc: usize) -> Spectrogram {
    let mel_db = power_to_db(&apply_filterbank(mel_bank, power_spec));
    mel_db
        .iter()
        .map(|frame| dct_ortho(frame, n_mfcc))
        .collect()
}
