// Training module - corpus to persisted model
//
// Walks one directory per class, runs every clip through the shared
// `ClipProcessor`, encodes labels, holds out a stratified test split, fits the
// forest on the training side and scores it on the held-out side.
//
// Files that fail to load are logged and skipped; a corpus whose vectors do
// not all share one width aborts the run.

pub mod corpus;
pub mod split;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::forest::{arg_max, RandomForest};
use crate::analysis::model::{LabelEncoding, ModelArtifacts, ProbabilisticModel};
use crate::analysis::pipeline::ClipProcessor;
use crate::config::TrainingConfig;
use crate::error::{log_cry_error, log_training_error, ErrorCode, TrainingError};

pub use split::{stratified_split, Split};

/// A file that produced no feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Feature rows with their class names, in corpus walk order
#[derive(Debug, Clone, Default)]
pub struct LabeledCorpus {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

impl LabeledCorpus {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of loaded samples per class
    pub fn class_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// The single width shared by every row
    pub fn feature_width(&self) -> Result<usize, TrainingError> {
        let mut lengths: Vec<usize> = self.features.iter().map(Vec::len).collect();
        lengths.sort_unstable();
        lengths.dedup();
        match lengths.as_slice() {
            [] => Err(TrainingError::EmptyCorpus),
            [width] => Ok(*width),
            _ => Err(TrainingError::InconsistentFeatureLengths { lengths }),
        }
    }
}

/// Summary of a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub samples_loaded: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub class_distribution: BTreeMap<String, usize>,
    pub train_size: usize,
    pub test_size: usize,
    /// Fraction of held-out rows classified correctly; `None` without a test split
    pub accuracy: Option<f64>,
    /// Rows are true classes, columns predicted, both in encoding order
    pub confusion: Vec<Vec<usize>>,
    pub classes: Vec<String>,
    pub feature_width: usize,
    pub n_trees: usize,
}

#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifacts: ModelArtifacts,
    pub report: TrainingReport,
}

pub struct TrainingPipeline {
    config: TrainingConfig,
    processor: ClipProcessor,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            processor: ClipProcessor::new(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Extract features for every audio file of every configured class
    pub fn load_corpus(&self) -> Result<LabeledCorpus, TrainingError> {
        let data_dir: &Path = &self.config.data_dir;
        let mut corpus = LabeledCorpus::default();

        log::info!("[Training] Loading dataset from {:?}", data_dir);
        for class_name in &self.config.classes {
            let files = corpus::class_files(data_dir, class_name)?;
            log::info!("[Training] {}: {} files", class_name, files.len());

            for path in files {
                match self.processor.process_path(&path) {
                    Ok(features) => {
                        corpus.features.push(features.into_inner());
                        corpus.labels.push(class_name.clone());
                    }
                    Err(err) => {
                        log_cry_error(&err, &format!("training file {}", path.display()));
                        corpus.skipped.push(SkippedFile {
                            path,
                            reason: err.message(),
                        });
                    }
                }
            }
        }

        corpus.feature_width()?;
        log::info!(
            "[Training] Loaded {} samples, skipped {}; class distribution: {:?}",
            corpus.len(),
            corpus.skipped.len(),
            corpus.class_distribution()
        );
        Ok(corpus)
    }

    /// Load the corpus and fit on it
    pub fn run(&self) -> Result<TrainingOutcome, TrainingError> {
        self.load_corpus()
            .and_then(|corpus| self.fit(corpus))
            .inspect_err(|err| log_training_error(err, "run"))
    }

    /// Encode, split, fit and evaluate an already extracted corpus
    pub fn fit(&self, corpus: LabeledCorpus) -> Result<TrainingOutcome, TrainingError> {
        let feature_width = corpus.feature_width()?;
        let encoding = LabelEncoding::fit(&corpus.labels);
        let y: Vec<usize> = corpus
            .labels
            .iter()
            .map(|label| {
                encoding.encode(label).ok_or_else(|| TrainingError::Fit {
                    reason: format!("label {:?} missing from encoding", label),
                })
            })
            .collect::<Result<_, _>>()?;

        let split = stratified_split(
            &y,
            encoding.len(),
            self.config.test_fraction,
            self.config.seed,
        )?;
        let x_train: Vec<Vec<f64>> = split
            .train
            .iter()
            .map(|&i| corpus.features[i].clone())
            .collect();
        let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();

        log::info!(
            "[Training] Fitting {} trees on {} rows ({} held out)",
            self.config.forest.n_trees,
            x_train.len(),
            split.test.len()
        );
        let forest = RandomForest::fit(
            &x_train,
            &y_train,
            encoding.len(),
            &self.config.forest,
            self.config.seed,
        )?;

        let mut confusion = vec![vec![0usize; encoding.len()]; encoding.len()];
        for &i in &split.test {
            let proba = forest
                .predict_proba(&corpus.features[i])
                .map_err(|err| TrainingError::Fit {
                    reason: err.message(),
                })?;
            confusion[y[i]][arg_max(&proba)] += 1;
        }
        let correct: usize = (0..encoding.len()).map(|c| confusion[c][c]).sum();
        let accuracy = if split.test.is_empty() {
            None
        } else {
            Some(correct as f64 / split.test.len() as f64)
        };

        let report = TrainingReport {
            samples_loaded: corpus.len(),
            class_distribution: corpus.class_distribution(),
            skipped_files: corpus.skipped,
            train_size: split.train.len(),
            test_size: split.test.len(),
            accuracy,
            confusion,
            classes: encoding.classes().to_vec(),
            feature_width,
            n_trees: forest.n_trees(),
        };
        match report.accuracy {
            Some(acc) => log::info!("[Training] Held-out accuracy: {:.3}", acc),
            None => log::info!("[Training] No held-out rows, accuracy not measured"),
        }

        Ok(TrainingOutcome {
            artifacts: ModelArtifacts::new(forest, encoding),
            report,
        })
    }
}
