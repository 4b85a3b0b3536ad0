//! Zero-shot scoring on top of an NLI (entailment) model.
//!
//! Each candidate label becomes a hypothesis ("This example is {label}.") paired
//! with the input text as premise. The model returns one logit row per pair;
//! these helpers turn those rows into per-label scores.

use std::collections::HashMap;

use serde::Deserialize;

pub const DEFAULT_HYPOTHESIS_TEMPLATE: &str = "This example is {}.";

/// Fill the `{}` placeholder of a hypothesis template with a label.
pub fn hypothesis(template: &str, label: &str) -> String {
    template.replacen("{}", label, 1)
}

/// Positions of the entailment and contradiction logits in a model output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NliLabels {
    pub entailment: usize,
    pub contradiction: usize,
    pub num_labels: usize,
}

#[derive(Deserialize)]
struct ModelConfig {
    #[serde(default)]
    id2label: HashMap<String, String>,
}

impl NliLabels {
    /// The MNLI ordering: contradiction, neutral, entailment.
    pub fn mnli() -> Self {
        Self {
            entailment: 2,
            contradiction: 0,
            num_labels: 3,
        }
    }

    /// Read label positions from a HuggingFace `config.json`.
    ///
    /// Entailment is the label whose name starts with "entail"
    /// (case-insensitive), otherwise the last index. Contradiction is index 0,
    /// or the last index when entailment is index 0.
    pub fn from_config_json(json: &str) -> anyhow::Result<Self> {
        let config: ModelConfig = serde_json::from_str(json)?;
        if config.id2label.is_empty() {
            return Ok(Self::mnli());
        }

        let mut labels = Vec::with_capacity(config.id2label.len());
        for (id, name) in &config.id2label {
            let id: usize = id
                .parse()
                .map_err(|_| anyhow::anyhow!("non-numeric id2label key: {id:?}"))?;
            labels.push((id, name.to_lowercase()));
        }
        let num_labels = labels.iter().map(|(id, _)| id + 1).max().unwrap_or(0);
        anyhow::ensure!(num_labels >= 2, "NLI model needs at least two labels");

        let entailment = labels
            .iter()
            .find(|(_, name)| name.starts_with("entail"))
            .map(|(id, _)| *id)
            .unwrap_or(num_labels - 1);

        let contradiction = if entailment == 0 { num_labels - 1 } else { 0 };

        Ok(Self {
            entailment,
            contradiction,
            num_labels,
        })
    }
}

/// One score per candidate: softmax of the entailment logits across candidates.
///
/// Scores sum to 1, so exactly one label is favoured.
pub fn single_label_scores(logits: &[Vec<f32>], labels: &NliLabels) -> Vec<f32> {
    let entail: Vec<f32> = logits.iter().map(|row| row[labels.entailment]).collect();
    softmax(&entail)
}

/// One independent score per candidate: softmax over (contradiction, entailment).
pub fn multi_label_scores(logits: &[Vec<f32>], labels: &NliLabels) -> Vec<f32> {
    logits
        .iter()
        .map(|row| softmax(&[row[labels.contradiction], row[labels.entailment]])[1])
        .collect()
}

/// Pair labels with scores, highest first. Equal scores keep input order.
pub fn rank(candidates: &[&str], scores: &[f32]) -> Vec<(String, f32)> {
    let mut ranked: Vec<(String, f32)> = candidates
        .iter()
        .zip(scores)
        .map(|(label, &score)| (label.to_string(), score))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hypothesis_fills_template() {
        assert_eq!(
            hypothesis(DEFAULT_HYPOTHESIS_TEMPLATE, "Fitness Guru"),
            "This example is Fitness Guru."
        );
        assert_eq!(hypothesis("About {}: {}", "food"), "About food: {}");
    }

    #[test]
    fn labels_from_mnli_config() {
        let json = r#"{
            "model_type": "bart",
            "id2label": {"0": "contradiction", "1": "neutral", "2": "entailment"}
        }"#;
        assert_eq!(NliLabels::from_config_json(json).unwrap(), NliLabels::mnli());
    }

    #[test]
    fn labels_entailment_first() {
        let json = r#"{"id2label": {"0": "ENTAILMENT", "1": "NEUTRAL", "2": "CONTRADICTION"}}"#;
        let labels = NliLabels::from_config_json(json).unwrap();
        assert_eq!(labels.entailment, 0);
        assert_eq!(labels.contradiction, 2);
        assert_eq!(labels.num_labels, 3);
    }

    #[test]
    fn multi_label_entailment_first_uses_last_column_as_contradiction() {
        let json = r#"{"id2label": {"0": "ENTAILMENT", "1": "NEUTRAL", "2": "CONTRADICTION"}}"#;
        let labels = NliLabels::from_config_json(json).unwrap();
        let logits = vec![vec![5.0, 0.0, -5.0], vec![-5.0, 0.0, 5.0]];
        let scores = multi_label_scores(&logits, &labels);
        assert!(scores[0] > 0.99, "{scores:?}");
        assert!(scores[1] < 0.01, "{scores:?}");
    }

    #[test]
    fn labels_without_entail_name_use_last() {
        let json = r#"{"id2label": {"0": "LABEL_0", "1": "LABEL_1"}}"#;
        let labels = NliLabels::from_config_json(json).unwrap();
        assert_eq!(labels.entailment, 1);
        assert_eq!(labels.num_labels, 2);
    }

    #[test]
    fn labels_default_when_config_has_none() {
        assert_eq!(
            NliLabels::from_config_json(r#"{"model_type": "bart"}"#).unwrap(),
            NliLabels::mnli()
        );
    }

    #[test]
    fn labels_reject_bad_keys() {
        assert!(NliLabels::from_config_json(r#"{"id2label": {"x": "entailment"}}"#).is_err());
        assert!(NliLabels::from_config_json("not json").is_err());
    }

    #[test]
    fn single_label_scores_sum_to_one() {
        let logits = vec![
            vec![-1.0, 0.0, 3.0],
            vec![2.0, 0.0, -2.0],
            vec![0.0, 0.0, 1.0],
        ];
        let scores = single_label_scores(&logits, &NliLabels::mnli());
        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(scores[0] > scores[2] && scores[2] > scores[1]);
    }

    #[test]
    fn single_label_ignores_contradiction_logits() {
        let a = vec![vec![9.0, 0.0, 1.0], vec![0.0, 0.0, 1.0]];
        let scores = single_label_scores(&a, &NliLabels::mnli());
        assert!((scores[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn multi_label_scores_independent() {
        let logits = vec![vec![-2.0, 0.0, 2.0], vec![-2.0, 0.0, 2.0]];
        let scores = multi_label_scores(&logits, &NliLabels::mnli());
        // Both hypotheses strongly entailed: each near 1, not split.
        assert!(scores.iter().all(|&s| s > 0.95));
    }

    #[test]
    fn rank_sorts_descending() {
        let ranked = rank(&["a", "b", "c"], &[0.2, 0.5, 0.3]);
        let order: Vec<&str> = ranked.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(order, ["b", "c", "a"]);
        assert_eq!(ranked[0].1, 0.5);
    }

    #[test]
    fn rank_stable_on_ties() {
        let ranked = rank(&["x", "y"], &[0.5, 0.5]);
        assert_eq!(ranked[0].0, "x");
    }
}
