//! Waveform loading
//!
//! Turns a file or an uploaded byte buffer into the canonical waveform every
//! feature vector is computed from: mono, 22,050 Hz, at most 5 s of audio,
//! stationary noise removed, zero-padded to exactly 110,250 samples.
//!
//! Files are read whole and decoded like uploads. RIFF/WAVE content goes
//! through hound; everything else (and WAV variants hound rejects) goes
//! through symphonia's probe.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::{MediaSource, MediaSourceStream},
    meta::MetadataOptions,
    probe::Hint,
};

use super::denoise::StationaryDenoiser;
use super::resample::resample;
use super::Waveform;
use crate::config::FeatureConfig;
use crate::error::AudioError;

/// Mono samples at the rate the source was encoded with
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decodes audio and conditions it to the feature contract
pub struct WaveformLoader {
    config: FeatureConfig,
    denoiser: StationaryDenoiser,
}

impl Default for WaveformLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformLoader {
    pub fn new() -> Self {
        let config = FeatureConfig::CONTRACT;
        Self {
            denoiser: StationaryDenoiser::new(config.sample_rate),
            config,
        }
    }

    /// Load and condition an audio file
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<Waveform, AudioError> {
        let decoded = self.decode_path(path.as_ref())?;
        self.prepare(decoded)
    }

    /// Load and condition an in-memory upload
    ///
    /// `hint` is the original file name or extension, if the client sent one.
    pub fn load_bytes(&self, bytes: Vec<u8>, hint: Option<&str>) -> Result<Waveform, AudioError> {
        let decoded = self.decode_bytes(bytes, hint)?;
        self.prepare(decoded)
    }

    /// Decode a file to mono without conditioning it
    ///
    /// Only a failure to read the file is an I/O error; its contents are
    /// classified exactly like an upload of the same bytes.
    pub fn decode_path(&self, path: &Path) -> Result<DecodedAudio, AudioError> {
        let bytes = fs::read(path)?;
        let hint = path.file_name().and_then(|name| name.to_str());
        self.decode_bytes(bytes, hint)
    }

    /// Decode an in-memory buffer to mono without conditioning it
    pub fn decode_bytes(
        &self,
        bytes: Vec<u8>,
        hint: Option<&str>,
    ) -> Result<DecodedAudio, AudioError> {
        if bytes.is_empty() {
            return Err(AudioError::EmptyAudio);
        }
        let max_secs = self.config.max_duration_secs;

        if is_riff_wave(&bytes) {
            match hound::WavReader::new(Cursor::new(bytes.as_slice())) {
                Ok(reader) => return read_wav(reader, max_secs),
                Err(err) => {
                    tracing::debug!(error = %err, "hound rejected upload, probing");
                }
            }
        }

        let extension = hint.map(|h| {
            Path::new(h)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or(h)
                .to_ascii_lowercase()
        });
        decode_with_symphonia(Box::new(Cursor::new(bytes)), extension.as_deref(), max_secs)
    }

    /// Condition decoded audio: truncate, resample, denoise, pad
    pub fn prepare(&self, decoded: DecodedAudio) -> Result<Waveform, AudioError> {
        let DecodedAudio {
            mut samples,
            sample_rate,
        } = decoded;
        if samples.is_empty() {
            return Err(AudioError::EmptyAudio);
        }
        if sample_rate == 0 {
            return Err(AudioError::Decode {
                reason: "source reports a sample rate of 0".to_string(),
            });
        }

        let target_len = self.config.target_len();
        samples.truncate(sample_rate as usize * self.config.max_duration_secs as usize);

        let mut samples = resample(&samples, sample_rate, self.config.sample_rate)?;
        samples.truncate(target_len);

        if samples.len() > self.config.denoise_threshold {
            samples = self.denoiser.reduce(&samples);
        }
        samples.resize(target_len, 0.0);

        tracing::trace!(source_rate = sample_rate, "waveform prepared");
        Waveform::new(samples, self.config.sample_rate)
    }
}

fn is_riff_wave(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn read_wav<R: std::io::Read>(
    reader: hound::WavReader<R>,
    max_secs: u32,
) -> Result<DecodedAudio, AudioError> {
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let max_values = spec.sample_rate as usize * max_secs as usize * channels;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .take(max_values)
            .collect::<Result<_, _>>()
            .map_err(wav_error)?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .take(max_values)
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(wav_error)?
        }
    };

    Ok(DecodedAudio {
        samples: downmix(&interleaved, channels),
        sample_rate: spec.sample_rate,
    })
}

fn wav_error(err: hound::Error) -> AudioError {
    AudioError::Decode {
        reason: err.to_string(),
    }
}

/// Average interleaved channels into one
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

fn symphonia_error(err: SymphoniaError) -> AudioError {
    match err {
        SymphoniaError::IoError(io) => AudioError::Io {
            details: io.to_string(),
        },
        other => AudioError::Decode {
            reason: other.to_string(),
        },
    }
}

fn decode_with_symphonia(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
    max_secs: u32,
) -> Result<DecodedAudio, AudioError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| AudioError::Decode {
            reason: format!("unrecognized audio container: {}", err),
        })?;
    let mut format = probed.format;

    let (track_id, codec_params) = {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::Decode {
                reason: "no audio track found".to_string(),
            })?;
        (track.id, track.codec_params.clone())
    };

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(symphonia_error)?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut mono = Vec::<f32>::new();

    loop {
        if sample_rate > 0 && mono.len() >= sample_rate as usize * max_secs as usize {
            break;
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(err) => return Err(symphonia_error(err)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                tracing::debug!(reason, "skipping undecodable packet");
                continue;
            }
            Err(err) => return Err(symphonia_error(err)),
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        let channels = spec.channels.count().max(1);

        let needs_alloc = sample_buf
            .as_ref()
            .map(|b| b.capacity() < decoded.capacity() * channels)
            .unwrap_or(true);
        if needs_alloc {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            mono.extend(downmix(buf.samples(), channels));
        }
    }

    if mono.is_empty() {
        return Err(AudioError::EmptyAudio);
    }

    Ok(DecodedAudio {
        samples: mono,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_short_clip_is_padded_to_target_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, &sine(440.0, 22_050, 22_050), 22_050, 1);

        let waveform = WaveformLoader::new().load_path(&path).unwrap();
        assert_eq!(waveform.len(), 110_250);
        assert_eq!(waveform.sample_rate(), 22_050);
        assert!(waveform.samples()[100_000..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_long_clip_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_wav(&path, &sine(440.0, 22_050, 22_050 * 8), 22_050, 1);

        let loader = WaveformLoader::new();
        let decoded = loader.decode_path(&path).unwrap();
        assert_eq!(decoded.samples.len(), 110_250);
        assert_eq!(loader.load_path(&path).unwrap().len(), 110_250);
    }

    #[test]
    fn test_stereo_is_downmixed_and_resampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.WAV");
        let mono = sine(300.0, 44_100, 44_100);
        let interleaved: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();
        write_wav(&path, &interleaved, 44_100, 2);

        let loader = WaveformLoader::new();
        let decoded = loader.decode_path(&path).unwrap();
        assert_eq!(decoded.sample_rate, 44_100);
        assert_eq!(decoded.samples.len(), 44_100);

        let waveform = loader.prepare(decoded).unwrap();
        assert_eq!(waveform.len(), 110_250);
    }

    #[test]
    fn test_bytes_and_path_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_wav(&path, &sine(500.0, 16_000, 16_000), 16_000, 1);

        let loader = WaveformLoader::new();
        let from_path = loader.load_path(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let from_bytes = loader.load_bytes(bytes, Some("clip.wav")).unwrap();
        assert_eq!(from_path.samples(), from_bytes.samples());
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let loader = WaveformLoader::new();
        let err = loader
            .load_bytes(b"definitely not audio".to_vec(), Some("clip.mp3"))
            .unwrap_err();
        assert!(matches!(err, AudioError::Decode { .. } | AudioError::Io { .. }));
        assert!(matches!(
            loader.load_bytes(Vec::new(), None),
            Err(AudioError::EmptyAudio)
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = WaveformLoader::new()
            .load_path("/nonexistent/clip.wav")
            .unwrap_err();
        assert!(matches!(err, AudioError::Io { .. }));
    }

    #[test]
    fn test_unreadable_wav_fails_the_same_way_from_file_and_upload() {
        let dir = tempfile::tempdir().unwrap();
        let loader = WaveformLoader::new();

        let cases: [(&str, &[u8]); 3] = [
            ("empty.wav", b""),
            ("trunc.wav", b"RIFF"),
            ("header_only.wav", b"RIFF\x24\x00\x00\x00WAVEfmt "),
        ];
        for (name, contents) in cases {
            let path = dir.path().join(name);
            std::fs::write(&path, contents).unwrap();

            let from_path = loader.load_path(&path).unwrap_err();
            let from_bytes = loader.load_bytes(contents.to_vec(), Some(name)).unwrap_err();
            assert_eq!(
                std::mem::discriminant(&from_path),
                std::mem::discriminant(&from_bytes),
                "{}: {:?} vs {:?}",
                name,
                from_path,
                from_bytes
            );
            assert!(!matches!(from_path, AudioError::Io { .. }), "{}: {:?}", name, from_path);
        }

        assert_eq!(
            loader.load_path(dir.path().join("empty.wav")).unwrap_err(),
            AudioError::EmptyAudio
        );
    }

    #[test]
    fn test_denoise_applies_only_above_threshold() {
        let loader = WaveformLoader::new();
        let threshold = FeatureConfig::CONTRACT.denoise_threshold;
        assert_eq!(threshold, 2048);

        for (len, expect_untouched) in [(threshold, true), (threshold + 1, false)] {
            let clip: Vec<f32> = sine(700.0, 22_050, len)
                .iter()
                .enumerate()
                .map(|(i, &s)| s + 0.05 * ((i * 7919 % 101) as f32 / 50.0 - 1.0))
                .collect();
            let waveform = loader
                .prepare(DecodedAudio {
                    samples: clip.clone(),
                    sample_rate: 22_050,
                })
                .unwrap();

            assert_eq!(waveform.len(), 110_250);
            assert!(waveform.samples()[len..].iter().all(|&s| s == 0.0));
            let untouched = waveform.samples()[..len] == clip[..];
            assert_eq!(untouched, expect_untouched, "len {}", len);
        }
    }

    #[test]
    fn test_empty_decoded_audio_rejected() {
        let err = WaveformLoader::new()
            .prepare(DecodedAudio {
                samples: Vec::new(),
                sample_rate: 22_050,
            })
            .unwrap_err();
        assert!(matches!(err, AudioError::EmptyAudio));
    }
}
