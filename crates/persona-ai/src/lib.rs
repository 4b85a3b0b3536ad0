//! AI inference layer: ONNX Runtime for embeddings and zero-shot NLI, logistic
//! regression for the trained persona classifier.

pub mod artifact;
pub mod dataset;
pub mod logistic;
pub mod nli;
pub mod predictor;
pub mod training;

mod tokens;

#[cfg(feature = "onnx")]
mod embedder;
#[cfg(feature = "onnx")]
mod zero_shot;

pub use artifact::{ArtifactError, ArtifactPaths, ModelMeta, TrainedArtifact};
pub use logistic::{FitParams, LabelEncoder, LogisticRegression, ModelError};
pub use predictor::{PredictError, Predictor, TextEmbedder, ZeroShotClassifier};
pub use training::{TrainingOptions, train};

#[cfg(feature = "onnx")]
pub use embedder::Embedder;
#[cfg(feature = "onnx")]
pub use zero_shot::NliZeroShot;
