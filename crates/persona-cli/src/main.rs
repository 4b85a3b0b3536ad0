mod config;
mod display;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use persona_ai::{Embedder, NliZeroShot, Predictor, ZeroShotClassifier};
use persona_client::PredictClient;
use persona_core::{PersonaRequest, PersonaResponse, PredictionMode};
use persona_server::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{ModelSettings, Settings};

/// Classify a bio and its posts into one of four personas.
#[derive(Parser, Debug)]
#[command(name = "persona")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file (defaults to persona.toml when present)
    #[arg(short, long, global = true, env = "PERSONA_CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Labelled training data (bio;posts;persona)
    #[arg(long, global = true, env = "PERSONA_DATASET")]
    dataset: Option<PathBuf>,

    /// Directory holding model.json and label_encoder.json
    #[arg(long, global = true, env = "PERSONA_ARTIFACT_DIR")]
    artifact_dir: Option<PathBuf>,

    /// Sentence embedding model directory (model.onnx, tokenizer.json)
    #[arg(long, global = true, env = "PERSONA_EMBEDDER_DIR")]
    embedder_dir: Option<PathBuf>,

    /// NLI model directory for zero-shot mode
    #[arg(long, global = true, env = "PERSONA_ZERO_SHOT_DIR")]
    zero_shot_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve POST /predict and GET /health
    Serve {
        /// Listen address
        #[arg(long, env = "PERSONA_ADDR")]
        addr: Option<SocketAddr>,
    },

    /// Retrain the classifier from the dataset and overwrite the artifact
    Train,

    /// Classify locally without a server
    Predict {
        #[command(flatten)]
        input: PredictArgs,
    },

    /// Classify through a running server
    Query {
        /// Server base URL
        #[arg(long, env = "PERSONA_URL")]
        url: Option<String>,

        #[command(flatten)]
        input: PredictArgs,
    },

    /// Show a running server's health
    Health {
        /// Server base URL
        #[arg(long, env = "PERSONA_URL")]
        url: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct PredictArgs {
    /// Short biography
    #[arg(long)]
    bio: String,

    /// A post; repeat for several
    #[arg(long = "post")]
    posts: Vec<String>,

    #[arg(long, value_enum, default_value_t = ModeArg::TrainedModel)]
    mode: ModeArg,

    /// Print the raw JSON response instead of a card
    #[arg(long)]
    json: bool,
}

impl PredictArgs {
    fn request(&self) -> PersonaRequest {
        PersonaRequest {
            bio: self.bio.clone(),
            posts: self.posts.clone(),
            mode: self.mode.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    #[value(name = "trained_model")]
    TrainedModel,
    #[value(name = "zero_shot")]
    ZeroShot,
}

impl From<ModeArg> for PredictionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::TrainedModel => PredictionMode::TrainedModel,
            ModeArg::ZeroShot => PredictionMode::ZeroShot,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    apply_overrides(&mut settings, &cli);
    init_tracing(&settings.logging.level, cli.verbose);
    info!("persona v{}", env!("CARGO_PKG_VERSION"));
    settings.log_source();

    match cli.command {
        Commands::Serve { addr } => {
            let addr = match addr {
                Some(addr) => addr,
                None => settings
                    .server
                    .addr
                    .parse()
                    .with_context(|| format!("invalid listen address {:?}", settings.server.addr))?,
            };
            let predictor = build_predictor(&settings)?;
            persona_server::run(AppState::new(predictor), addr).await?;
        }
        Commands::Train => {
            let embedder = load_embedder(&settings.models.embedder_dir)?;
            let predictor =
                Predictor::retrained(Box::new(embedder), None, settings.training_options())?;
            display::print_training_summary(predictor.artifact());
        }
        Commands::Predict { input } => {
            let mut predictor = build_predictor(&settings)?;
            let request = input.request();
            let prediction = predictor.predict(&request.bio, &request.posts, request.mode)?;
            print_response(&prediction.into(), request.mode, input.json)?;
        }
        Commands::Query { url, input } => {
            let client = PredictClient::new(url.unwrap_or(settings.server.url));
            let request = input.request();
            let response = client.predict(&request).await?;
            print_response(&response, request.mode, input.json)?;
        }
        Commands::Health { url } => {
            let client = PredictClient::new(url.unwrap_or(settings.server.url));
            let health = client.health().await?;
            display::print_health(client.base_url(), &health);
        }
    }

    Ok(())
}

/// Flags and `PERSONA_*` variables win over the settings file.
fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(dataset) = &cli.dataset {
        settings.training.dataset = dataset.clone();
    }
    if let Some(dir) = &cli.artifact_dir {
        settings.training.artifact_dir = dir.clone();
    }
    if let Some(dir) = &cli.embedder_dir {
        settings.models.embedder_dir = dir.clone();
    }
    if let Some(dir) = &cli.zero_shot_dir {
        settings.models.zero_shot_dir = dir.clone();
    }
}

/// `RUST_LOG` wins; otherwise `-v` flags, then the configured level.
fn init_tracing(default_level: &str, verbose: u8) {
    let level = match verbose {
        0 => default_level,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_embedder(dir: &Path) -> anyhow::Result<Embedder> {
    Embedder::load(dir).with_context(|| format!("loading embedding model from {}", dir.display()))
}

/// `None` when the model directory is absent; a present but broken model is an error.
fn load_zero_shot(models: &ModelSettings) -> anyhow::Result<Option<Box<dyn ZeroShotClassifier>>> {
    let dir = &models.zero_shot_dir;
    if !dir.exists() {
        warn!(dir = %dir.display(), "zero-shot model directory not found");
        return Ok(None);
    }
    let classifier = NliZeroShot::load(dir)
        .with_context(|| format!("loading zero-shot model from {}", dir.display()))?
        .with_template(models.hypothesis_template.clone())?
        .with_multi_label(models.multi_label);
    Ok(Some(Box::new(classifier)))
}

fn build_predictor(settings: &Settings) -> anyhow::Result<Predictor> {
    let embedder = load_embedder(&settings.models.embedder_dir)?;
    let zero_shot = load_zero_shot(&settings.models)?;
    Predictor::initialize(Box::new(embedder), zero_shot, settings.training_options())
}

fn print_response(
    response: &PersonaResponse,
    mode: PredictionMode,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
    } else {
        display::print_prediction(response, mode);
    }
    Ok(())
}
