// Analysis module - features, model and classification
//
// This module holds everything between a conditioned waveform and a label:
// - features: the 53-slot feature extractor shared by training and serving
// - forest: the random-forest estimator
// - model: the estimator seam, label encoding and artifact store
// - classifier: width-checked prediction and the client envelope
// - pipeline: loader + extractor bundled as the single clip-processing path

pub mod classifier;
pub mod features;
pub mod forest;
pub mod model;
pub mod pipeline;

pub use classifier::{
    ClassificationResult, CryClassifier, ModelHandle, PredictionResponse, PredictionStatus,
};
pub use features::{FeatureExtractor, FeatureVector};
pub use forest::{ForestParams, RandomForest};
pub use model::{LabelEncoding, ModelArtifacts, ProbabilisticModel};
pub use pipeline::ClipProcessor;
