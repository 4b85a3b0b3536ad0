//! On-disk persistence for the trained classifier and its label encoder.
//!
//! The artifact is two JSON files: the model (classifier parameters plus
//! training metadata) and the label encoder. Both must exist for the artifact
//! to be considered present; if either is missing the predictor retrains.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::logistic::{LabelEncoder, LogisticRegression};

pub const DEFAULT_MODEL_FILE: &str = "model.json";
pub const DEFAULT_ENCODER_FILE: &str = "label_encoder.json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact file not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed artifact {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model has {model} classes but label encoder has {encoder}")]
    ClassMismatch { model: usize, encoder: usize },
}

/// Locations of the two artifact files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub encoder: PathBuf,
}

impl ArtifactPaths {
    /// Default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model: dir.join(DEFAULT_MODEL_FILE),
            encoder: dir.join(DEFAULT_ENCODER_FILE),
        }
    }

    /// True only when both files exist.
    pub fn exists(&self) -> bool {
        self.model.exists() && self.encoder.exists()
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir(Path::new("."))
    }
}

/// How and when the classifier was trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub embedding_model: String,
    pub dim: usize,
    pub examples: usize,
    pub trained_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct ModelFile {
    meta: ModelMeta,
    classifier: LogisticRegression,
}

/// Classifier parameters paired with the label encoder that decodes them.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedArtifact {
    pub meta: ModelMeta,
    pub classifier: LogisticRegression,
    pub encoder: LabelEncoder,
}

impl TrainedArtifact {
    /// Load both files and check they agree on the class count.
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ArtifactError> {
        let model: ModelFile = read_json(&paths.model)?;
        let encoder: LabelEncoder = read_json(&paths.encoder)?;

        if model.classifier.n_classes() != encoder.len() {
            return Err(ArtifactError::ClassMismatch {
                model: model.classifier.n_classes(),
                encoder: encoder.len(),
            });
        }

        info!(
            model = %paths.model.display(),
            classes = encoder.len(),
            dim = model.meta.dim,
            trained_at = %model.meta.trained_at,
            "loaded trained artifact"
        );
        Ok(Self {
            meta: model.meta,
            classifier: model.classifier,
            encoder,
        })
    }

    /// Write both files, each atomically.
    pub fn save(&self, paths: &ArtifactPaths) -> Result<(), ArtifactError> {
        let model = ModelFile {
            meta: self.meta.clone(),
            classifier: self.classifier.clone(),
        };
        write_json_atomic(&paths.model, &model)?;
        write_json_atomic(&paths.encoder, &self.encoder)?;
        info!(
            model = %paths.model.display(),
            encoder = %paths.encoder.display(),
            "saved trained artifact"
        );
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::NotFound(path.to_path_buf())
        } else {
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialise into a temp file next to `path`, then rename over it.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let json = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&json).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
