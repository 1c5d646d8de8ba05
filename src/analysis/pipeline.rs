// Pipeline - the one path from audio to feature vector
//
// Training and serving both go through `ClipProcessor`, so a clip yields the
// same feature vector whichever side reads it.

use std::path::Path;

use crate::analysis::classifier::{ClassificationResult, CryClassifier};
use crate::analysis::features::{FeatureExtractor, FeatureVector};
use crate::audio::WaveformLoader;
use crate::error::CryError;

/// Loader and extractor bundled together
#[derive(Default)]
pub struct ClipProcessor {
    loader: WaveformLoader,
    extractor: FeatureExtractor,
}

impl ClipProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feature vector for an audio file
    pub fn process_path<P: AsRef<Path>>(&self, path: P) -> Result<FeatureVector, CryError> {
        let waveform = self.loader.load_path(path)?;
        Ok(self.extractor.extract_waveform(&waveform)?)
    }

    /// Feature vector for uploaded bytes; `hint` is an optional file name
    pub fn process_bytes(
        &self,
        bytes: Vec<u8>,
        hint: Option<&str>,
    ) -> Result<FeatureVector, CryError> {
        let waveform = self.loader.load_bytes(bytes, hint)?;
        Ok(self.extractor.extract_waveform(&waveform)?)
    }

    /// Decode, extract and classify uploaded bytes
    pub fn classify_bytes(
        &self,
        classifier: &CryClassifier,
        bytes: Vec<u8>,
        hint: Option<&str>,
    ) -> Result<ClassificationResult, CryError> {
        let features = self.process_bytes(bytes, hint)?;
        Ok(classifier.predict(features.as_slice())?)
    }

    /// Decode, extract and classify an audio file
    pub fn classify_path<P: AsRef<Path>>(
        &self,
        classifier: &CryClassifier,
        path: P,
    ) -> Result<ClassificationResult, CryError> {
        let features = self.process_path(path)?;
        Ok(classifier.predict(features.as_slice())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AudioError;

    fn write_tone(path: &Path, freq: f32, sample_rate: u32, secs: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let n = (sample_rate as f32 * secs) as usize;
        for i in 0..n {
            let t = i as f32 / sample_rate as f32;
            let s = 0.4 * (2.0 * std::f32::consts::PI * freq * t).sin();
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_path_and_bytes_yield_identical_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cry.wav");
        write_tone(&path, 450.0, 44_100, 1.5);

        let processor = ClipProcessor::new();
        let from_path = processor.process_path(&path).unwrap();
        let from_bytes = processor
            .process_bytes(std::fs::read(&path).unwrap(), Some("cry.wav"))
            .unwrap();

        assert_eq!(from_path.len(), 53);
        assert_eq!(from_path, from_bytes);
    }

    #[test]
    fn test_undecodable_upload_is_audio_error() {
        let processor = ClipProcessor::new();
        let err = processor
            .process_bytes(vec![0u8; 64], Some("upload.bin"))
            .unwrap_err();
        assert!(matches!(
            err,
            CryError::Audio(AudioError::Decode { .. } | AudioError::Io { .. })
        ));
    }
}
