#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SAMPLE_RATE: u32 = 22_050;

pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        writer
            .write_sample((clamped * i16::MAX as f32) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

/// 1.5 s of faint noise with a 0.2 s voiced burst at `pitch` Hz
pub fn cry_like(pitch: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let len = (SAMPLE_RATE as f32 * 1.5) as usize;
    let onset = rng.gen_range(4_000..8_000);
    let burst = (SAMPLE_RATE as f32 * 0.2) as usize;
    let jitter = rng.gen_range(0.97..1.03);

    (0..len)
        .map(|i| {
            let noise = rng.gen_range(-0.01..0.01);
            if (onset..onset + burst).contains(&i) {
                let t = i as f32 / SAMPLE_RATE as f32;
                let f0 = pitch * jitter;
                let voiced = (2.0 * std::f32::consts::PI * f0 * t).sin()
                    + 0.5 * (4.0 * std::f32::consts::PI * f0 * t).sin()
                    + 0.25 * (6.0 * std::f32::consts::PI * f0 * t).sin();
                0.4 * voiced + noise
            } else {
                noise
            }
        })
        .collect()
}

/// `data/<class>/clip_<n>.wav` for a low-pitched and a high-pitched class
pub fn build_corpus(root: &Path, per_class: usize) -> PathBuf {
    let data = root.join("data");
    for (class, pitch, seed_base) in [("hungry", 320.0, 0u64), ("tired", 1800.0, 1_000u64)] {
        let dir = data.join(class);
        fs::create_dir_all(&dir).expect("class dir");
        for n in 0..per_class {
            write_wav(
                &dir.join(format!("clip_{n}.wav")),
                &cry_like(pitch, seed_base + n as u64),
                SAMPLE_RATE,
            );
        }
    }
    data
}
