// Contrast module - octave-band spectral contrast
//
// The spectrum is split into n_bands + 1 octave sub-bands: [0, fmin],
// [fmin, 2 fmin], ... with the last band extended to Nyquist. For each band
// and frame, the peak (mean of the top quantile) and valley (mean of the
// bottom quantile) magnitudes are converted to dB and subtracted.

use super::fft::{fft_frequencies, Spectrogram};
use super::mel::power_to_db;

/// Bin ranges of each contrast sub-band
#[derive(Debug, Clone)]
pub struct ContrastBands {
    /// Inclusive bin range of each band, before dropping the shared edge bin
    ranges: Vec<(usize, usize)>,
    /// Number of bins in the quantile (at least 1)
    quantile_counts: Vec<usize>,
    n_bands: usize,
}

impl ContrastBands {
    pub fn new(sample_rate: u32, n_fft: usize, n_bands: usize, fmin: f64, quantile: f64) -> Self {
        let freqs = fft_frequencies(sample_rate, n_fft);
        let mut edges = vec![0.0];
        edges.extend((0..=n_bands).map(|i| fmin * 2f64.powi(i as i32)));

        let mut ranges = Vec::with_capacity(n_bands + 1);
        let mut quantile_counts = Vec::with_capacity(n_bands + 1);

        for k in 0..=n_bands {
            let (f_low, f_high) = (edges[k], edges[k + 1]);
            let in_band: Vec<usize> = freqs
                .iter()
                .enumerate()
                .filter(|(_, &f)| f >= f_low && f <= f_high)
                .map(|(i, _)| i)
                .collect();

            let (mut start, mut end) = match (in_band.first(), in_band.last()) {
                (Some(&s), Some(&e)) => (s, e),
                // Band entirely above Nyquist collapses onto the last bin
                _ => (freqs.len() - 1, freqs.len() - 1),
            };
            if k > 0 {
                start = start.saturating_sub(1);
            }
            if k == n_bands {
                end = freqs.len() - 1;
            }

            let band_size = end - start + 1;
            let count = ((quantile * band_size as f64).round_ties_even() as usize).max(1);
            ranges.push((start, end));
            quantile_counts.push(count);
        }

        Self {
            ranges,
            quantile_counts,
            n_bands,
        }
    }

    /// Number of output rows (n_bands + 1)
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Spectral contrast per frame, `[frame][n_bands + 1]`, from a magnitude spectrogram
    pub fn contrast(&self, magnitude: &Spectrogram) -> Spectrogram {
        let mut peaks: Spectrogram = Vec::with_capacity(magnitude.len());
        let mut valleys: Spectrogram = Vec::with_capacity(magnitude.len());

        for frame in magnitude {
            let mut frame_peaks = Vec::with_capacity(self.len());
            let mut frame_valleys = Vec::with_capacity(self.len());

            for (k, (&(start, end), &count)) in
                self.ranges.iter().zip(self.quantile_counts.iter()).enumerate()
            {
                // Every band except the last drops its top edge bin, which is
                // shared with the next band
                let stop = if k < self.n_bands { end } else { end + 1 };
                let mut sub_band: Vec<f64> = frame[start..stop.max(start + 1)].to_vec();
                sub_band.sort_by(|a, b| a.total_cmp(b));

                let take = count.min(sub_band.len());
                let valley = sub_band[..take].iter().sum::<f64>() / take as f64;
                let peak = sub_band[sub_band.len() - take..].iter().sum::<f64>() / take as f64;
                frame_peaks.push(peak);
                frame_valleys.push(valley);
            }

            peaks.push(frame_peaks);
            valleys.push(frame_valleys);
        }

        let peaks_db = power_to_db(&peaks);
        let valleys_db = power_to_db(&valleys);

        peaks_db
            .iter()
            .zip(valleys_db.iter())
            .map(|(p, v)| p.iter().zip(v.iter()).map(|(p, v)| p - v).collect())
            .collect()
    }
}
