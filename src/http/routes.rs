use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::analysis::classifier::{ModelHandle, PredictionResponse};
use crate::analysis::pipeline::ClipProcessor;
use crate::config::{ServerConfig, FEATURE_SET_VERSION};
use crate::error::{ErrorCode, ModelError};
use crate::history::{PredictionLog, PredictionRecord};

/// Header carrying the uploaded file's original name
pub static X_FILENAME: HeaderName = HeaderName::from_static("x-filename");

/// Uploads larger than this are rejected before decoding
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelHandle>,
    pub processor: Arc<ClipProcessor>,
    pub history: Arc<PredictionLog>,
    pub model_dir: PathBuf,
}

impl AppState {
    pub fn new(model: ModelHandle, history: PredictionLog, model_dir: PathBuf) -> Self {
        Self {
            model: Arc::new(model),
            processor: Arc::new(ClipProcessor::new()),
            history: Arc::new(history),
            model_dir,
        }
    }
}

/// HTTP error variants mapped to `{"detail": ...}` JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    PredictionFailed(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::PredictionFailed(msg) => (
                StatusCode::BAD_REQUEST,
                format!("Prediction failed: {}", msg),
            ),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub classes: Vec<String>,
    pub expected_features: usize,
    pub feature_set_version: u32,
}

/// Reload endpoint response payload.
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub reloaded: bool,
    pub classes: Vec<String>,
    pub expected_features: usize,
}

/// CORS policy for the configured origins; unparsable origins are dropped
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("[Server] Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the Axum router with all handlers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/history", get(history))
        .route("/health", get(health))
        .route("/reload", post(reload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Run the HTTP server loop until ctrl-c.
pub async fn run_http_server(
    state: AppState,
    config: &ServerConfig,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding HTTP listener on {}", config.bind_addr))?;
    log::info!("[Server] Listening on {}", config.bind_addr);

    let router = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(config)),
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                log::error!("[Server] Failed to listen for shutdown signal: {}", err);
            }
            log::info!("[Server] Shutdown signal received");
        })
        .await
        .context("serving HTTP router")?;
    Ok(())
}

pub async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PredictionResponse>, HttpServerError> {
    let filename = headers
        .get(&X_FILENAME)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let classifier = state.model.get();
    let processor = Arc::clone(&state.processor);
    let hint = filename.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        processor.classify_bytes(&classifier, body.to_vec(), hint.as_deref())
    })
    .await
    .map_err(|err| HttpServerError::Internal(format!("prediction worker failed: {}", err)))?;

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            crate::error::log_cry_error(&err, "predict");
            return Err(HttpServerError::PredictionFailed(err.message()));
        }
    };

    let logged = state
        .history
        .record_if_confident(&result, filename)
        .map_err(|err| HttpServerError::Internal(format!("Prediction log error: {}", err)))?;
    log::info!(
        "[Server] Predicted {} ({:.3}){}",
        result.label,
        result.confidence,
        if logged { ", logged" } else { "" }
    );

    Ok(Json(result.into()))
}

pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<PredictionRecord>> {
    Json(state.history.recent(query.limit.unwrap_or(10)))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let classifier = state.model.get();
    Json(HealthResponse {
        status: "ok",
        model_loaded: true,
        classes: classifier.classes().to_vec(),
        expected_features: classifier.expected_width(),
        feature_set_version: FEATURE_SET_VERSION,
    })
}

pub async fn reload(
    State(state): State<AppState>,
) -> Result<Json<ReloadResponse>, HttpServerError> {
    let handle = Arc::clone(&state.model);
    let dir = state.model_dir.clone();
    let reloaded = tokio::task::spawn_blocking(move || handle.reload(dir))
        .await
        .map_err(|err| HttpServerError::Internal(format!("reload worker failed: {}", err)))?;

    match reloaded {
        Ok(classifier) => {
            log::info!("[Server] Model reloaded from {:?}", state.model_dir);
            Ok(Json(ReloadResponse {
                reloaded: true,
                classes: classifier.classes().to_vec(),
                expected_features: classifier.expected_width(),
            }))
        }
        Err(err) => {
            crate::error::log_model_error(&err, "reload");
            Err(reload_error(err))
        }
    }
}

fn reload_error(err: ModelError) -> HttpServerError {
    HttpServerError::ServiceUnavailable(format!(
        "Reload failed, keeping current model: {}",
        err.message()
    ))
}
