// Temporal module - time-domain frame features
//
// Both features use centered frames of `frame_length` samples every `hop`
// samples, giving the same frame count as the STFT. RMS pads with zeros;
// zero-crossing rate repeats the edge samples so padding cannot introduce
// spurious crossings.

/// Magnitudes at or below this are treated as exact zeros when counting
/// crossings
const ZERO_THRESHOLD: f64 = 1e-10;

/// Temporal feature computation functions
pub struct TemporalFeatures {
    frame_length: usize,
    hop: usize,
}

impl TemporalFeatures {
    pub fn new(frame_length: usize, hop: usize) -> Self {
        Self { frame_length, hop }
    }

    fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    /// Root-mean-square energy of every centered, zero-padded frame
    pub fn compute_rms(&self, signal: &[f64]) -> Vec<f64> {
        let pad = self.frame_length / 2;
        (0..self.frame_count(signal.len()))
            .map(|frame| {
                let start = frame * self.hop;
                let energy: f64 = (start..start + self.frame_length)
                    .filter_map(|i| i.checked_sub(pad).and_then(|pos| signal.get(pos)))
                    .map(|&x| x * x)
                    .sum();
                (energy / self.frame_length as f64).sqrt()
            })
            .collect()
    }

    /// Zero-crossing rate of every centered, edge-padded frame
    ///
    /// A crossing is a sign change between consecutive samples, with zero
    /// counted as positive. The count is divided by the frame length.
    pub fn compute_zcr(&self, signal: &[f64]) -> Vec<f64> {
        if signal.is_empty() {
            return Vec::new();
        }

        let pad = self.frame_length / 2;
        let last = signal.len() - 1;
        // Sign of the edge-padded signal at padded position `p`
        let negative_at = |p: usize| {
            let pos = p.saturating_sub(pad).min(last);
            let x = signal[pos];
            x < 0.0 && x.abs() > ZERO_THRESHOLD
        };

        (0..self.frame_count(signal.len()))
            .map(|frame| {
                let start = frame * self.hop;
                let mut crossings = 0usize;
                let mut previous = negative_at(start);
                for p in start + 1..start + self.frame_length {
                    let current = negative_at(p);
                    if current != previous {
                        crossings += 1;
                    }
                    previous = current;
                }
                crossings as f64 / self.frame_length as f64
            })
            .collect()
    }
}
