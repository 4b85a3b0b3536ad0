//! Training pipeline: read dataset → embed example texts → fit classifier.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use persona_core::{Persona, TrainingExample};
use tracing::{info, warn};

use crate::artifact::{ArtifactPaths, ModelMeta, TrainedArtifact};
use crate::dataset;
use crate::logistic::{FitParams, LabelEncoder, LogisticRegression};
use crate::predictor::TextEmbedder;

const EMBED_BATCH_SIZE: usize = 64;

/// Where training reads from and writes to, plus classifier hyperparameters.
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub dataset: PathBuf,
    pub artifacts: ArtifactPaths,
    pub fit: FitParams,
    pub batch_size: usize,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("personas_examples.csv"),
            artifacts: ArtifactPaths::default(),
            fit: FitParams::default(),
            batch_size: EMBED_BATCH_SIZE,
        }
    }
}

/// Train a fresh artifact from the dataset. Does not write it to disk.
pub fn train(
    embedder: &mut dyn TextEmbedder,
    options: &TrainingOptions,
) -> anyhow::Result<TrainedArtifact> {
    let start = Instant::now();
    info!(path = %options.dataset.display(), "loading training data");
    let examples = dataset::load_examples(&options.dataset)?;

    for label in unknown_labels(&examples) {
        warn!(label, "dataset label is not a known persona, it will have no description");
    }

    let texts: Vec<String> = examples.iter().map(TrainingExample::text).collect();
    let mut features = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(options.batch_size.max(1)) {
        let batch: Vec<&str> = chunk.iter().map(String::as_str).collect();
        features.extend(
            embedder
                .embed_batch(&batch)
                .context("embedding training examples")?,
        );
    }
    anyhow::ensure!(
        features.len() == examples.len(),
        "embedder returned {} vectors for {} examples",
        features.len(),
        examples.len()
    );

    let encoder = LabelEncoder::fit(examples.iter().map(|e| e.persona.as_str()));
    let labels = examples
        .iter()
        .map(|e| encoder.transform(&e.persona))
        .collect::<Result<Vec<_>, _>>()?;
    let classifier = LogisticRegression::fit(&features, &labels, encoder.len(), &options.fit)?;

    info!(
        examples = examples.len(),
        classes = encoder.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "training complete"
    );

    Ok(TrainedArtifact {
        meta: ModelMeta {
            embedding_model: embedder.model_name().to_string(),
            dim: embedder.dim(),
            examples: examples.len(),
            trained_at: Utc::now(),
        },
        classifier,
        encoder,
    })
}

fn unknown_labels(examples: &[TrainingExample]) -> Vec<&str> {
    let mut unknown: Vec<&str> = examples
        .iter()
        .map(|e| e.persona.as_str())
        .filter(|label| label.parse::<Persona>().is_err())
        .collect();
    unknown.sort_unstable();
    unknown.dedup();
    unknown
}
