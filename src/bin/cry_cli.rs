use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cry_classifier::analysis::model::ModelArtifacts;
use cry_classifier::{
    AppConfig, ClipProcessor, CryClassifier, ErrorCode, PredictionResponse, TrainingPipeline,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "cry_cli", about = "Infant cry feature extraction, training and serving")]
struct Cli {
    /// JSON configuration file (defaults to $CRY_CONFIG or config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the 53-slot feature vector of an audio file as JSON
    Extract {
        #[arg(long)]
        input: PathBuf,
    },
    /// Classify an audio file with a trained model
    Predict {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Train a model from a directory of per-class audio folders
    Train {
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        model_dir: Option<PathBuf>,
        /// Override the number of trees
        #[arg(long)]
        trees: Option<usize>,
    },
    /// Load the model artifacts and report whether they are usable
    Verify {
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Run the HTTP prediction service
    Serve {
        #[arg(long)]
        addr: Option<String>,
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    cry_classifier::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = AppConfig::load_from_file(path);
            config.apply_env_overrides();
            config
        }
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Extract { input } => run_extract(input),
        Commands::Predict { input, model_dir } => {
            run_predict(input, model_dir.unwrap_or(config.server.model_dir))
        }
        Commands::Train {
            data_dir,
            model_dir,
            trees,
        } => {
            if let Some(dir) = data_dir {
                config.training.data_dir = dir;
            }
            if let Some(n_trees) = trees {
                config.training.forest.n_trees = n_trees;
            }
            run_train(config, model_dir)
        }
        Commands::Verify { model_dir } => {
            run_verify(model_dir.unwrap_or(config.server.model_dir))
        }
        Commands::Serve { addr, model_dir } => {
            if let Some(addr) = addr {
                config.server.bind_addr = addr;
            }
            if let Some(dir) = model_dir {
                config.server.model_dir = dir;
            }
            run_serve(config)
        }
    }
}

fn run_extract(input: PathBuf) -> Result<ExitCode> {
    let features = ClipProcessor::new()
        .process_path(&input)
        .with_context(|| format!("extracting features from {}", input.display()))?;
    println!("{}", serde_json::to_string(&features)?);
    Ok(ExitCode::from(0))
}

fn run_predict(input: PathBuf, model_dir: PathBuf) -> Result<ExitCode> {
    let classifier = CryClassifier::load(&model_dir)
        .with_context(|| format!("loading model from {}", model_dir.display()))?;

    let response = match ClipProcessor::new().classify_path(&classifier, &input) {
        Ok(result) => PredictionResponse::from(result),
        Err(err) => PredictionResponse::error(err.message()),
    };
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(if response.is_success() {
        ExitCode::from(0)
    } else {
        ExitCode::from(2)
    })
}

fn run_train(config: AppConfig, model_dir: Option<PathBuf>) -> Result<ExitCode> {
    let model_dir = model_dir.unwrap_or(config.server.model_dir);
    let pipeline = TrainingPipeline::new(config.training);
    let outcome = pipeline
        .run()
        .with_context(|| format!("training from {}", pipeline.config().data_dir.display()))?;

    outcome
        .artifacts
        .save(&model_dir)
        .with_context(|| format!("saving model to {}", model_dir.display()))?;

    println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    eprintln!(
        "Model saved to {} with {} features",
        model_dir.display(),
        outcome.report.feature_width
    );
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct VerifyReport {
    model_dir: PathBuf,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    classes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_features: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn run_verify(model_dir: PathBuf) -> Result<ExitCode> {
    let report = match ModelArtifacts::load(&model_dir).and_then(CryClassifier::from_artifacts) {
        Ok(classifier) => VerifyReport {
            model_dir,
            ok: true,
            classes: Some(classifier.classes().to_vec()),
            n_features: Some(classifier.expected_width()),
            error: None,
        },
        Err(err) => VerifyReport {
            model_dir,
            ok: false,
            classes: None,
            n_features: None,
            error: Some(err.to_string()),
        },
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.ok {
        ExitCode::from(0)
    } else {
        ExitCode::from(2)
    })
}

#[cfg(feature = "http")]
fn run_serve(config: AppConfig) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(cry_classifier::http::serve(config.server))?;
    Ok(ExitCode::from(0))
}

#[cfg(not(feature = "http"))]
fn run_serve(_config: AppConfig) -> Result<ExitCode> {
    anyhow::bail!("cry_cli was built without the `http` feature")
}
