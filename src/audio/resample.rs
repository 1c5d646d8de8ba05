//! Audio resampling using rubato

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::AudioError;

/// Resample a mono signal from `from_sr` to `to_sr`
///
/// The whole clip is processed as one chunk, the filter tail is flushed, and
/// the filter delay is removed so the output lines up with the input and has
/// `ceil(len * to_sr / from_sr)` samples.
pub fn resample(samples: &[f32], from_sr: u32, to_sr: u32) -> Result<Vec<f32>, AudioError> {
    if from_sr == to_sr || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_sr == 0 || to_sr == 0 {
        return Err(AudioError::Resample {
            reason: format!("cannot resample {} Hz -> {} Hz", from_sr, to_sr),
        });
    }

    let ratio = to_sr as f64 / from_sr as f64;
    let expected_len = (samples.len() as f64 * ratio).ceil() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)
        .map_err(|err| AudioError::Resample {
            reason: err.to_string(),
        })?;
    let delay = resampler.output_delay();

    let input = vec![samples.to_vec()];
    let mut output = resampler
        .process(&input, None)
        .map_err(|err| AudioError::Resample {
            reason: err.to_string(),
        })?
        .into_iter()
        .next()
        .unwrap_or_default();

    // Flush until the delayed tail has been emitted
    while output.len() < delay + expected_len {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|err| AudioError::Resample {
                reason: err.to_string(),
            })?
            .into_iter()
            .next()
            .unwrap_or_default();
        if tail.is_empty() {
            break;
        }
        output.extend(tail);
    }

    let mut aligned: Vec<f32> = output.into_iter().skip(delay).take(expected_len).collect();
    aligned.resize(expected_len, 0.0);
    Ok(aligned)
}
