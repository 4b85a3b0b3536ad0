//! Sentence embeddings for the trained classifier.
//!
//! Runs a sentence-transformers encoder (all-MiniLM-L6-v2 by default) under
//! ONNX Runtime and mean-pools its token states. The model directory must
//! contain `model.onnx` and `tokenizer.json`; its name is recorded in the
//! trained artifact.

use std::path::Path;

use anyhow::{Context, anyhow, ensure};
use ort::session::Session;
use ort::value::ValueType;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::predictor::TextEmbedder;
use crate::tokens::{self, TokenBatch, TokenRow};

/// MiniLM was trained on sequences of at most this many word pieces.
const MAX_TOKENS: usize = 256;

/// Width of all-MiniLM-L6-v2, used when the graph leaves it symbolic.
const FALLBACK_DIM: usize = 384;

pub struct Embedder {
    session: Session,
    tokenizer: Tokenizer,
    dim: usize,
    name: String,
}

impl Embedder {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        let session = Session::builder()?
            .commit_from_file(&model_path)
            .with_context(|| format!("creating session for {}", model_path.display()))?;
        let dim = session
            .outputs()
            .first()
            .and_then(|output| hidden_width(output.dtype()))
            .unwrap_or(FALLBACK_DIM);

        let mut tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| anyhow!("load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("set truncation: {e}"))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        let name = model_dir
            .file_name()
            .map_or_else(|| "embedder".to_string(), |n| n.to_string_lossy().into_owned());

        info!(dim, name = %name, model = %model_path.display(), "loaded embedding model");
        Ok(Self {
            session,
            tokenizer,
            dim,
            name,
        })
    }
}

impl TextEmbedder for Embedder {
    /// Name of the model directory, e.g. `all-MiniLM-L6-v2`.
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        self.dim
    }

    /// One unit-length vector per input, in input order.
    fn embed_batch(&mut self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("tokenize: {e}"))?;
        let rows: Vec<TokenRow<'_>> = encodings.iter().map(TokenRow::from).collect();
        let batch = TokenBatch::pack(&rows);

        debug!(rows = batch.rows, seq_len = batch.seq_len, "running embedding model");
        let outputs = self.session.run(ort::inputs![
            "input_ids" => batch.ids_tensor()?,
            "attention_mask" => batch.mask_tensor()?,
            "token_type_ids" => batch.type_tensor()?,
        ])?;

        // Token states: [rows, seq_len, dim].
        let (shape, hidden) = outputs[0].try_extract_tensor::<f32>()?;
        let shape: &[i64] = shape;
        ensure!(
            shape.len() == 3 && shape[0] as usize == batch.rows && shape[2] as usize == self.dim,
            "unexpected output shape {shape:?}, expected [{}, _, {}]",
            batch.rows,
            self.dim
        );

        Ok(tokens::mean_pool(hidden, shape[1] as usize, self.dim, &batch))
    }
}

/// Last axis of a tensor output, when the graph fixes it.
fn hidden_width(output: &ValueType) -> Option<usize> {
    match output {
        ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| usize::try_from(d).ok())
            .filter(|&d| d > 0),
        _ => None,
    }
}
