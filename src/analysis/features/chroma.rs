// Chroma module - pitch-class energy and tonal centroid projection
//
// The chroma filterbank maps each STFT bin to the 12 pitch classes with
// Gaussian bumps centered on the bin's pitch (A440 tuning, C as class 0),
// weighted by a broad Gaussian over octaves centered on octave 5. Each frame
// of the resulting chromagram is scaled so its loudest class is 1.
//
// The tonal centroid projects the L1-normalized chroma onto three circles:
// fifths, minor thirds and major thirds (radii 1, 1, 0.5).

use super::fft::Spectrogram;

/// Center of the octave weighting, in octaves above C0-ish reference
const CENTER_OCTAVE: f64 = 5.0;

/// Standard deviation of the octave weighting, in octaves
const OCTAVE_WIDTH: f64 = 2.0;

/// Number of tonal centroid axes
pub const TONNETZ_DIMS: usize = 6;

/// Convert a frequency to fractional octaves relative to A440 / 16
fn hz_to_octs(hz: f64) -> f64 {
    (hz / (440.0 / 16.0)).log2()
}

/// Normalize each column (`bank[.][col]`) to unit L2 norm
fn normalize_columns_l2(bank: &mut [Vec<f64>]) {
    let n_cols = bank.first().map(Vec::len).unwrap_or(0);
    for col in 0..n_cols {
        let norm = bank.iter().map(|row| row[col] * row[col]).sum::<f64>().sqrt();
        if norm > f64::MIN_POSITIVE {
            for row in bank.iter_mut() {
                row[col] /= norm;
            }
        }
    }
}

/// Chroma filterbank, `[n_chroma][n_fft / 2 + 1]`
pub fn chroma_filterbank(sample_rate: u32, n_fft: usize, n_chroma: usize) -> Vec<Vec<f64>> {
    let n_chroma_f = n_chroma as f64;

    // Pitch (in chroma bins) of every FFT bin except DC, which gets a
    // placeholder 1.5 octaves below bin 1
    let mut frq_bins: Vec<f64> = (1..n_fft)
        .map(|k| n_chroma_f * hz_to_octs(k as f64 * sample_rate as f64 / n_fft as f64))
        .collect();
    frq_bins.insert(0, frq_bins[0] - 1.5 * n_chroma_f);

    let mut bin_widths: Vec<f64> = frq_bins.windows(2).map(|w| (w[1] - w[0]).max(1.0)).collect();
    bin_widths.push(1.0);

    let half = (n_chroma_f / 2.0).round();
    let mut bank: Vec<Vec<f64>> = (0..n_chroma)
        .map(|c| {
            frq_bins
                .iter()
                .zip(bin_widths.iter())
                .map(|(&frq, &width)| {
                    let d = (frq - c as f64 + half + 10.0 * n_chroma_f).rem_euclid(n_chroma_f)
                        - half;
                    (-0.5 * (2.0 * d / width).powi(2)).exp()
                })
                .collect()
        })
        .collect();

    normalize_columns_l2(&mut bank);

    let octave_weights: Vec<f64> = frq_bins
        .iter()
        .map(|&frq| (-0.5 * ((frq / n_chroma_f - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp())
        .collect();
    for row in bank.iter_mut() {
        for (w, ow) in row.iter_mut().zip(octave_weights.iter()) {
            *w *= ow;
        }
    }

    // Rotate so class 0 is C rather than A
    let shift = 3 * (n_chroma / 12);
    bank.rotate_left(shift % n_chroma.max(1));

    let n_bins = n_fft / 2 + 1;
    for row in bank.iter_mut() {
        row.truncate(n_bins);
    }
    bank
}

/// Chromagram per frame, `[frame][n_chroma]`, each frame scaled to max 1
pub fn chromagram(power_spec: &Spectrogram, bank: &[Vec<f64>]) -> Spectrogram {
    power_spec
        .iter()
        .map(|frame| {
            let mut chroma: Vec<f64> = bank
                .iter()
                .map(|filter| filter.iter().zip(frame.iter()).map(|(w, s)| w * s).sum())
                .collect();
            let peak = chroma.iter().map(|c: &f64| c.abs()).fold(0.0, f64::max);
            if peak > f64::MIN_POSITIVE {
                for c in chroma.iter_mut() {
                    *c /= peak;
                }
            }
            chroma
        })
        .collect()
}

/// Projection matrix from 12 pitch classes onto the 6 tonnetz axes
fn tonnetz_basis(n_chroma: usize) -> Vec<Vec<f64>> {
    let scale = [7.0 / 6.0, 7.0 / 6.0, 3.0 / 2.0, 3.0 / 2.0, 2.0 / 3.0, 2.0 / 3.0];
    let radius = [1.0, 1.0, 1.0, 1.0, 0.5, 0.5];

    (0..TONNETZ_DIMS)
        .map(|axis| {
            (0..n_chroma)
                .map(|pc| {
                    let mut v = scale[axis] * pc as f64;
                    // Even axes are the sine components (phase-shifted cosine)
                    if axis % 2 == 0 {
                        v -= 0.5;
                    }
                    radius[axis] * (std::f64::consts::PI * v).cos()
                })
                .collect()
        })
        .collect()
}

/// Tonal centroid per frame, `[frame][6]`, from a chromagram
pub fn tonnetz(chroma: &Spectrogram) -> Spectrogram {
    let n_chroma = chroma.first().map(Vec::len).unwrap_or(12);
    let basis = tonnetz_basis(n_chroma);

    chroma
        .iter()
        .map(|frame| {
            let total: f64 = frame.iter().map(|c| c.abs()).sum();
            let scale = if total > f64::MIN_POSITIVE {
                1.0 / total
            } else {
                1.0
            };
            basis
                .iter()
                .map(|axis| {
                    axis.iter()
                        .zip(frame.iter())
                        .map(|(b, c)| b * c * scale)
                        .sum()
                })
                .collect()
        })
        .collect()
}
