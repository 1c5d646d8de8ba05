//! Prediction service
//!
//! Axum router exposing `/predict`, `/history`, `/health` and `/reload` over a
//! shared, hot-swappable classifier. Audio decoding and feature extraction run
//! on tokio's blocking pool.

mod routes;

pub use routes::{
    build_router, cors_layer, run_http_server, AppState, HealthResponse, HttpServerError,
    X_FILENAME,
};

use anyhow::Context;

use crate::analysis::classifier::{CryClassifier, ModelHandle};
use crate::config::ServerConfig;
use crate::history::PredictionLog;

/// Load the model and prediction log described by `config` and serve until ctrl-c
///
/// A model that fails to load aborts startup.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let classifier = CryClassifier::load(&config.model_dir)
        .with_context(|| format!("loading model from {:?}", config.model_dir))?;

    let history = match &config.prediction_log {
        Some(path) => PredictionLog::open(path, config.history_capacity)
            .with_context(|| format!("opening prediction log {:?}", path))?,
        None => PredictionLog::in_memory(config.history_capacity),
    };

    let state = AppState::new(
        ModelHandle::new(classifier),
        history,
        config.model_dir.clone(),
    );
    run_http_server(state, &config).await
}
