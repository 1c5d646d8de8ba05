// Model store - probability-estimator seam, label encoding and artifacts
//
// A trained model is persisted as two JSON files in one directory:
// - model_v1.json: the forest, its input width and the feature-set version
// - label_encoder_v1.json: the ordered class names
//
// Loading cross-checks the pair so a model never serves with the wrong class
// list or against a different feature layout.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::forest::RandomForest;
use crate::config::FEATURE_SET_VERSION;
use crate::error::ModelError;

pub const MODEL_FILE: &str = "model_v1.json";
pub const LABEL_ENCODER_FILE: &str = "label_encoder_v1.json";

/// Anything that maps a feature row to a class distribution
///
/// The distribution is indexed like the model's class list.
pub trait ProbabilisticModel: Send + Sync {
    /// Input width the model was trained on, if it records one
    fn n_features(&self) -> Option<usize>;

    fn n_classes(&self) -> usize;

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// Bidirectional class name <-> index mapping
///
/// Classes are kept sorted so the index assignment depends only on the set
/// of names, never on corpus walk order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoding {
    classes: Vec<String>,
}

impl LabelEncoding {
    /// Build an encoding from every label seen in training
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    /// Adopt an already ordered class list, e.g. one read from disk
    pub fn from_classes(classes: Vec<String>) -> Result<Self, ModelError> {
        if classes.is_empty() {
            return Err(ModelError::ModelLoad {
                reason: "label encoding has no classes".to_string(),
            });
        }
        let unique: BTreeSet<&String> = classes.iter().collect();
        if unique.len() != classes.len() {
            return Err(ModelError::ModelLoad {
                reason: "label encoding has duplicate classes".to_string(),
            });
        }
        Ok(Self { classes })
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct StoredModel {
    feature_set_version: u32,
    n_features: usize,
    forest: RandomForest,
}

/// A fitted forest paired with the encoding it was trained under
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub forest: RandomForest,
    pub encoding: LabelEncoding,
    pub feature_set_version: u32,
}

impl ModelArtifacts {
    pub fn new(forest: RandomForest, encoding: LabelEncoding) -> Self {
        Self {
            forest,
            encoding,
            feature_set_version: FEATURE_SET_VERSION,
        }
    }

    /// Trained input width
    pub fn n_features(&self) -> usize {
        self.forest.n_features().unwrap_or(0)
    }

    /// Write both artifact files into `dir`, creating it if needed
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<(), ModelError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(write_err)?;

        let stored = StoredModel {
            feature_set_version: self.feature_set_version,
            n_features: self.n_features(),
            forest: self.forest.clone(),
        };
        let model_file = File::create(dir.join(MODEL_FILE)).map_err(write_err)?;
        let mut writer = BufWriter::new(model_file);
        serde_json::to_writer(&mut writer, &stored).map_err(write_err)?;
        writer.flush().map_err(write_err)?;

        let encoder_file =
            File::create(dir.join(LABEL_ENCODER_FILE)).map_err(write_err)?;
        let mut writer = BufWriter::new(encoder_file);
        serde_json::to_writer_pretty(&mut writer, &self.encoding).map_err(write_err)?;
        writer.flush().map_err(write_err)?;

        log::info!(
            "[ModelStore] Saved {} trees, {} classes to {:?}",
            self.forest.n_trees(),
            self.encoding.len(),
            dir
        );
        Ok(())
    }

    /// Read both artifact files from `dir` and verify they belong together
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, ModelError> {
        let dir = dir.as_ref();

        let stored: StoredModel = read_json(&dir.join(MODEL_FILE))?;
        let encoding: LabelEncoding = read_json(&dir.join(LABEL_ENCODER_FILE))?;
        let encoding = LabelEncoding::from_classes(encoding.classes)?;

        if stored.feature_set_version != FEATURE_SET_VERSION {
            return Err(ModelError::ModelLoad {
                reason: format!(
                    "model was trained with feature set v{}, extractor is v{}",
                    stored.feature_set_version, FEATURE_SET_VERSION
                ),
            });
        }
        if stored.forest.n_features() != Some(stored.n_features) {
            return Err(ModelError::ModelLoad {
                reason: format!(
                    "recorded width {} does not match forest width {:?}",
                    stored.n_features,
                    stored.forest.n_features()
                ),
            });
        }
        if stored.forest.n_classes() != encoding.len() {
            return Err(ModelError::ModelLoad {
                reason: format!(
                    "model has {} classes but label encoder has {}",
                    stored.forest.n_classes(),
                    encoding.len()
                ),
            });
        }

        Ok(Self {
            forest: stored.forest,
            encoding,
            feature_set_version: stored.feature_set_version,
        })
    }
}

fn write_err<E: std::fmt::Display>(err: E) -> ModelError {
    ModelError::ArtifactWrite {
        reason: err.to_string(),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let file = File::open(path).map_err(|err| ModelError::ModelLoad {
        reason: format!("cannot open {:?}: {}", path, err),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| ModelError::ModelLoad {
        reason: format!("cannot parse {:?}: {}", path, err),
    })
}
