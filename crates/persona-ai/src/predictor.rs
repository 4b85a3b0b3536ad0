//! Persona prediction: trained-model and zero-shot modes behind one entry point.

use anyhow::anyhow;
use persona_core::{Persona, Prediction, PredictionMode, compose_text, describe, to_percent};
use thiserror::Error;
use tracing::{info, warn};

use crate::artifact::TrainedArtifact;
use crate::logistic::ModelError;
use crate::training::{self, TrainingOptions};

/// Text → fixed-length vector.
pub trait TextEmbedder: Send {
    /// Identifier recorded in the trained artifact's metadata.
    fn model_name(&self) -> &str;

    fn dim(&self) -> usize;

    fn embed_batch(&mut self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&mut self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedder returned no vector"))
    }
}

/// Scores arbitrary candidate labels against a text.
pub trait ZeroShotClassifier: Send {
    /// `(label, score)` pairs sorted by descending score.
    fn classify(
        &mut self,
        text: &str,
        candidate_labels: &[&str],
    ) -> anyhow::Result<Vec<(String, f32)>>;
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("prediction mode {0} is unavailable: no zero-shot model loaded")]
    ModeUnavailable(&'static str),

    #[error("classifier error: {0}")]
    Model(#[from] ModelError),

    #[error("inference failed: {0:#}")]
    Inference(#[from] anyhow::Error),
}

/// Owns the embedder, the trained classifier and the optional zero-shot model.
pub struct Predictor {
    embedder: Box<dyn TextEmbedder>,
    zero_shot: Option<Box<dyn ZeroShotClassifier>>,
    artifact: TrainedArtifact,
    options: TrainingOptions,
}

impl Predictor {
    /// Load the persisted classifier, or train and persist one if either
    /// artifact file is missing.
    ///
    /// A loaded artifact whose metadata or classifier width differs from the
    /// embedder's dimension is retrained rather than used. An unreadable
    /// artifact is an error.
    pub fn initialize(
        mut embedder: Box<dyn TextEmbedder>,
        zero_shot: Option<Box<dyn ZeroShotClassifier>>,
        options: TrainingOptions,
    ) -> anyhow::Result<Self> {
        info!(embedder = embedder.model_name(), "initializing predictor");

        let artifact = if options.artifacts.exists() {
            info!("loading existing model and encoder");
            let artifact = TrainedArtifact::load(&options.artifacts)?;
            let dim = embedder.dim();
            if artifact.meta.dim == dim && artifact.classifier.dim() == dim {
                artifact
            } else {
                warn!(
                    artifact_dim = artifact.meta.dim,
                    classifier_dim = artifact.classifier.dim(),
                    embedder_dim = dim,
                    "artifact dimension does not match embedder, retraining"
                );
                train_and_save(embedder.as_mut(), &options)?
            }
        } else {
            info!("model or encoder not found, training a new one");
            train_and_save(embedder.as_mut(), &options)?
        };

        if zero_shot.is_none() {
            warn!("no zero-shot classifier loaded, zero_shot mode disabled");
        }

        Ok(Self {
            embedder,
            zero_shot,
            artifact,
            options,
        })
    }

    /// Train from the dataset and persist, ignoring any artifact already on
    /// disk, including an unreadable one.
    pub fn retrained(
        mut embedder: Box<dyn TextEmbedder>,
        zero_shot: Option<Box<dyn ZeroShotClassifier>>,
        options: TrainingOptions,
    ) -> anyhow::Result<Self> {
        let artifact = train_and_save(embedder.as_mut(), &options)?;
        Ok(Self {
            embedder,
            zero_shot,
            artifact,
            options,
        })
    }

    /// Build from an already-trained artifact without touching disk.
    pub fn from_parts(
        embedder: Box<dyn TextEmbedder>,
        zero_shot: Option<Box<dyn ZeroShotClassifier>>,
        artifact: TrainedArtifact,
        options: TrainingOptions,
    ) -> Self {
        Self {
            embedder,
            zero_shot,
            artifact,
            options,
        }
    }

    /// Retrain from the dataset, overwrite the persisted artifact and swap it in.
    pub fn retrain(&mut self) -> anyhow::Result<&TrainedArtifact> {
        self.artifact = train_and_save(self.embedder.as_mut(), &self.options)?;
        Ok(&self.artifact)
    }

    /// Classify a bio and its posts into a persona.
    pub fn predict(
        &mut self,
        bio: &str,
        posts: &[String],
        mode: PredictionMode,
    ) -> Result<Prediction, PredictError> {
        let text = compose_text(bio, posts);

        let (label, probability) = match mode {
            PredictionMode::TrainedModel => {
                info!("using trained model for prediction");
                let embedding = self.embedder.embed(&text)?;
                let (index, p) = self.artifact.classifier.predict(&embedding)?;
                (self.artifact.encoder.inverse_transform(index)?.to_string(), p)
            }
            PredictionMode::ZeroShot => {
                info!("using zero-shot classification");
                let classifier = self
                    .zero_shot
                    .as_mut()
                    .ok_or(PredictError::ModeUnavailable(mode.as_str()))?;
                classifier
                    .classify(&text, &Persona::labels())?
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("zero-shot classifier returned no scores"))?
            }
        };

        Ok(Prediction {
            description: describe(&label),
            confidence: to_percent(probability),
            label,
        })
    }

    pub fn artifact(&self) -> &TrainedArtifact {
        &self.artifact
    }

    /// Labels the trained classifier can produce.
    pub fn classes(&self) -> &[String] {
        self.artifact.encoder.classes()
    }

    pub fn has_zero_shot(&self) -> bool {
        self.zero_shot.is_some()
    }
}

fn train_and_save(
    embedder: &mut dyn TextEmbedder,
    options: &TrainingOptions,
) -> anyhow::Result<TrainedArtifact> {
    let artifact = training::train(embedder, options)?;
    artifact.save(&options.artifacts)?;
    info!("model trained and saved");
    Ok(artifact)
}
