// Corpus discovery - class directories and the audio files inside them

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TrainingError;

/// File extensions picked up from class directories, compared case-insensitively
pub const AUDIO_EXTENSIONS: [&str; 3] = ["wav", "mp3", "ogg"];

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| e.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Audio files directly inside `data_dir/<class_name>`, sorted by path
pub fn class_files(data_dir: &Path, class_name: &str) -> Result<Vec<PathBuf>, TrainingError> {
    let class_dir = data_dir.join(class_name);
    if !class_dir.is_dir() {
        return Err(TrainingError::MissingClassDir { path: class_dir });
    }

    let entries = fs::read_dir(&class_dir).map_err(|err| TrainingError::Fit {
        reason: format!("cannot list {:?}: {}", class_dir, err),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_audio_file(path))
        .collect();
    files.sort();
    Ok(files)
}
