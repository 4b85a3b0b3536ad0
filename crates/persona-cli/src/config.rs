//! Settings file for the `persona` binary.
//!
//! Precedence, highest first: command-line flags and their `PERSONA_*`
//! environment variables, the TOML settings file, built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use persona_ai::{ArtifactPaths, FitParams, TrainingOptions, nli};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "persona.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub models: ModelSettings,
    pub training: TrainingSettings,
    pub logging: LoggingSettings,
    /// File the settings were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address for `persona serve`.
    pub addr: String,
    /// Base URL used by `persona query`.
    pub url: String,
}

/// Where the ONNX models live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub embedder_dir: PathBuf,
    /// Zero-shot mode is disabled when this directory does not exist.
    pub zero_shot_dir: PathBuf,
    pub hypothesis_template: String,
    pub multi_label: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub dataset: PathBuf,
    /// Holds `model.json` and `label_encoder.json`.
    pub artifact_dir: PathBuf,
    pub batch_size: usize,
    pub fit: FitParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_string(),
            url: "http://localhost:8000".to_string(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            embedder_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            zero_shot_dir: PathBuf::from("models/bart-large-mnli"),
            hypothesis_template: nli::DEFAULT_HYPOTHESIS_TEMPLATE.to_string(),
            multi_label: false,
        }
    }
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("data/personas_examples.csv"),
            artifact_dir: PathBuf::from("."),
            batch_size: 64,
            fit: FitParams::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load from `path`, or from `persona.toml` when present, or defaults.
    ///
    /// An explicitly named file must exist. Nothing is logged here since
    /// tracing is configured from the result; see [`Settings::log_source`].
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            }
        };

        let settings = match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading settings file {}", path.display()))?;
                let mut settings = Self::from_toml(&content)
                    .with_context(|| format!("parsing settings file {}", path.display()))?;
                settings.source = Some(path);
                settings
            }
            None => Self::default(),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn log_source(&self) {
        match &self.source {
            Some(path) => info!(path = %path.display(), "settings loaded from file"),
            None => debug!("no settings file, using defaults"),
        }
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            bail!(
                "invalid log level '{}', must be one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            );
        }
        if !self.models.hypothesis_template.contains("{}") {
            bail!(
                "hypothesis template {:?} has no {{}} placeholder",
                self.models.hypothesis_template
            );
        }
        if self.training.batch_size == 0 {
            bail!("training.batch_size must be at least 1");
        }
        if self.training.fit.c <= 0.0 {
            bail!("training.fit.c must be positive");
        }
        if self.training.fit.max_iter == 0 {
            bail!("training.fit.max_iter must be at least 1");
        }
        if !(self.training.fit.tol.is_finite() && self.training.fit.tol > 0.0) {
            bail!("training.fit.tol must be a positive number");
        }
        Ok(())
    }

    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            dataset: self.training.dataset.clone(),
            artifacts: ArtifactPaths::in_dir(&self.training.artifact_dir),
            fit: self.training.fit,
            batch_size: self.training.batch_size,
        }
    }
}
