//! Zero-shot persona classification with an NLI cross-encoder (bart-large-mnli).
//!
//! The model directory must contain `model.onnx` and `tokenizer.json`.
//! `config.json` is optional; without it MNLI label ordering is assumed.

use std::path::Path;

use ort::session::Session;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::nli::{self, NliLabels};
use crate::predictor::ZeroShotClassifier;
use crate::tokens::{TokenBatch, TokenRow};

const MAX_PAIR_TOKENS: usize = 1024;

/// NLI-backed zero-shot classifier.
///
/// Each candidate label is scored by pairing the text (premise) with the
/// hypothesis built from the template. All pairs run as one batch.
pub struct NliZeroShot {
    session: Session,
    tokenizer: Tokenizer,
    labels: NliLabels,
    template: String,
    multi_label: bool,
    with_token_types: bool,
}

impl NliZeroShot {
    /// Load an NLI model from a directory.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let config_path = model_dir.join("config.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        let labels = if config_path.exists() {
            let json = std::fs::read_to_string(&config_path)?;
            NliLabels::from_config_json(&json)?
        } else {
            NliLabels::mnli()
        };

        let session = Session::builder()?.commit_from_file(&model_path)?;
        let with_token_types = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;

        // Only the premise is cut; the hypothesis must survive intact.
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_PAIR_TOKENS,
                strategy: tokenizers::TruncationStrategy::OnlyFirst,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams::default()));

        info!(
            model = %model_path.display(),
            entailment = labels.entailment,
            num_labels = labels.num_labels,
            "loaded zero-shot model"
        );
        Ok(Self {
            session,
            tokenizer,
            labels,
            template: nli::DEFAULT_HYPOTHESIS_TEMPLATE.to_string(),
            multi_label: false,
            with_token_types,
        })
    }

    /// Replace the hypothesis template. Must contain `{}`.
    pub fn with_template(mut self, template: impl Into<String>) -> anyhow::Result<Self> {
        let template = template.into();
        anyhow::ensure!(
            template.contains("{}"),
            "hypothesis template {template:?} has no {{}} placeholder"
        );
        self.template = template;
        Ok(self)
    }

    /// Score labels independently instead of as one distribution.
    pub fn with_multi_label(mut self, multi_label: bool) -> Self {
        self.multi_label = multi_label;
        self
    }

    /// Raw logits, one row per `(text, hypothesis)` pair.
    fn logits(&mut self, text: &str, candidate_labels: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let pairs: Vec<(&str, String)> = candidate_labels
            .iter()
            .map(|label| (text, nli::hypothesis(&self.template, label)))
            .collect();

        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        let rows: Vec<TokenRow<'_>> = encodings.iter().map(TokenRow::from).collect();
        let batch = TokenBatch::pack(&rows);
        let batch_size = batch.rows;

        debug!(batch_size, seq_len = batch.seq_len, "running NLI model");
        let outputs = if self.with_token_types {
            self.session.run(ort::inputs![
                "input_ids" => batch.ids_tensor()?,
                "attention_mask" => batch.mask_tensor()?,
                "token_type_ids" => batch.type_tensor()?,
            ])?
        } else {
            self.session.run(ort::inputs![
                "input_ids" => batch.ids_tensor()?,
                "attention_mask" => batch.mask_tensor()?,
            ])?
        };

        // Logits: [batch_size, num_labels].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 2
                && dims[0] as usize == batch_size
                && dims[1] as usize == self.labels.num_labels,
            "unexpected output shape: {dims:?}, expected [{batch_size}, {}]",
            self.labels.num_labels
        );

        Ok(output_data
            .chunks(self.labels.num_labels)
            .map(<[f32]>::to_vec)
            .collect())
    }
}

impl ZeroShotClassifier for NliZeroShot {
    fn classify(
        &mut self,
        text: &str,
        candidate_labels: &[&str],
    ) -> anyhow::Result<Vec<(String, f32)>> {
        if candidate_labels.is_empty() {
            return Ok(vec![]);
        }
        let logits = self.logits(text, candidate_labels)?;
        let scores = if self.multi_label {
            nli::multi_label_scores(&logits, &self.labels)
        } else {
            nli::single_label_scores(&logits, &self.labels)
        };
        Ok(nli::rank(candidate_labels, &scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_core::Persona;
    use std::path::PathBuf;

    fn model_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("bart-large-mnli")
    }

    fn require_model() -> PathBuf {
        let dir = model_dir();
        if !dir.join("model.onnx").exists() {
            panic!(
                "Model not found. Export facebook/bart-large-mnli to ONNX into \
                 models/bart-large-mnli/ (model.onnx, tokenizer.json, config.json)"
            );
        }
        dir
    }

    #[test]
    fn load_missing_dir_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = NliZeroShot::load(tmp.path()).err().unwrap();
        assert!(err.to_string().contains("model.onnx not found"));
    }

    #[test]
    #[ignore = "requires models/bart-large-mnli"]
    fn classifies_fitness_text() {
        let mut zs = NliZeroShot::load(&require_model()).unwrap();
        let ranked = zs
            .classify(
                "Personal trainer. Leg day at the gym. New deadlift PR this morning",
                &Persona::labels(),
            )
            .unwrap();
        assert_eq!(ranked.len(), 4);
        assert_eq!(ranked[0].0, "Fitness Guru");

        let sum: f32 = ranked.iter().map(|(_, s)| s).sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    #[ignore = "requires models/bart-large-mnli"]
    fn multi_label_scores_are_independent() {
        let mut zs = NliZeroShot::load(&require_model())
            .unwrap()
            .with_multi_label(true);
        let ranked = zs
            .classify(
                "Street food tour in Bangkok after landing from a long flight",
                &Persona::labels(),
            )
            .unwrap();
        assert!(ranked.iter().all(|(_, s)| (0.0..=1.0).contains(s)));
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    #[ignore = "requires models/bart-large-mnli"]
    fn template_without_placeholder_rejected() {
        let zs = NliZeroShot::load(&require_model()).unwrap();
        assert!(zs.with_template("This is a persona.").is_err());
    }

    #[test]
    #[ignore = "requires models/bart-large-mnli"]
    fn empty_candidates_give_empty_ranking() {
        let mut zs = NliZeroShot::load(&require_model()).unwrap();
        assert!(zs.classify("anything", &[]).unwrap().is_empty());
    }
}
