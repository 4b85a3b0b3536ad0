//! Multinomial logistic regression over embedding vectors.
//!
//! Fitting is delegated to `linfa-logistic` (L-BFGS on the L2-penalised
//! softmax cross-entropy). The penalty follows the usual `C` convention: the
//! objective is `Σ loss + ½‖W‖² / C`, so smaller `C` means stronger
//! regularisation. Intercepts are not penalised. The fitted parameters are
//! copied out so they can be persisted with serde and scored without linfa.

use linfa::prelude::*;
use linfa_logistic::MultiLogisticRegression;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("no training samples")]
    Empty,

    #[error("need at least two classes to train, found {0}")]
    TooFewClasses(usize),

    #[error("{rows} feature rows but {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("row {row} has {found} features, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("label index {index} out of range for {classes} classes")]
    LabelOutOfRange { index: usize, classes: usize },

    #[error("input has {found} features, model expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("unknown label: {0:?}")]
    UnknownLabel(String),

    #[error("class {0} has no training samples")]
    MissingClass(usize),

    #[error("solver failed: {0}")]
    Solver(String),
}

/// Hyperparameters for [`LogisticRegression::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitParams {
    /// Inverse regularisation strength.
    pub c: f64,
    pub max_iter: usize,
    /// Stop once the gradient norm drops below this.
    pub tol: f64,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

/// Maps label strings to contiguous class indices (sorted, distinct).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut classes: Vec<String> = labels.into_iter().map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn transform(&self, label: &str) -> Result<usize, ModelError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| ModelError::UnknownLabel(label.to_string()))
    }

    pub fn inverse_transform(&self, index: usize) -> Result<&str, ModelError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(ModelError::LabelOutOfRange {
                index,
                classes: self.classes.len(),
            })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Fitted softmax classifier: one weight row and one intercept per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<Vec<f32>>,
    intercepts: Vec<f32>,
    dim: usize,
}

impl LogisticRegression {
    /// Fit on feature rows `x` with class indices `y` in `0..n_classes`.
    pub fn fit(
        x: &[Vec<f32>],
        y: &[usize],
        n_classes: usize,
        params: &FitParams,
    ) -> Result<Self, ModelError> {
        if x.is_empty() {
            return Err(ModelError::Empty);
        }
        if x.len() != y.len() {
            return Err(ModelError::LengthMismatch {
                rows: x.len(),
                labels: y.len(),
            });
        }
        if n_classes < 2 {
            return Err(ModelError::TooFewClasses(n_classes));
        }
        let dim = x[0].len();
        for (row, features) in x.iter().enumerate() {
            if features.len() != dim {
                return Err(ModelError::RaggedRow {
                    row,
                    expected: dim,
                    found: features.len(),
                });
            }
        }
        if let Some(&index) = y.iter().find(|&&c| c >= n_classes) {
            return Err(ModelError::LabelOutOfRange {
                index,
                classes: n_classes,
            });
        }

        if let Some(missing) = (0..n_classes).find(|k| !y.contains(k)) {
            return Err(ModelError::MissingClass(missing));
        }

        let flat: Vec<f64> = x.iter().flatten().map(|&v| f64::from(v)).collect();
        let records = Array2::from_shape_vec((x.len(), dim), flat)
            .map_err(|e| ModelError::Solver(e.to_string()))?;
        let dataset = Dataset::new(records, Array1::from(y.to_vec()));

        let solver: MultiLogisticRegression<f64> = MultiLogisticRegression::default()
            .alpha(1.0 / params.c)
            .max_iterations(params.max_iter as u64)
            .gradient_tolerance(params.tol);
        let fitted = solver
            .fit(&dataset)
            .map_err(|e| ModelError::Solver(e.to_string()))?;

        // linfa orders columns by ascending class value, i.e. by class index.
        let coefficients = fitted.params();
        let intercepts = fitted.intercept();
        if coefficients.ncols() != n_classes || intercepts.len() != n_classes {
            return Err(ModelError::Solver(format!(
                "solver returned {} classes, expected {n_classes}",
                coefficients.ncols()
            )));
        }

        info!(
            samples = x.len(),
            classes = n_classes,
            dim,
            c = params.c,
            max_iter = params.max_iter,
            "fitted logistic regression"
        );

        Ok(Self {
            weights: coefficients
                .columns()
                .into_iter()
                .map(|col| col.iter().map(|&v| v as f32).collect())
                .collect(),
            intercepts: intercepts.iter().map(|&v| v as f32).collect(),
            dim,
        })
    }

    /// Class probabilities for one feature vector; sums to 1.
    pub fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
        if features.len() != self.dim {
            return Err(ModelError::DimensionMismatch {
                expected: self.dim,
                found: features.len(),
            });
        }

        let mut scores: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.intercepts)
            .map(|(row, &b)| f64::from(b) + dot_f32(row, features))
            .collect();
        softmax_in_place(&mut scores);
        Ok(scores.into_iter().map(|p| p as f32).collect())
    }

    /// Most probable class index and its probability. Ties go to the lower index.
    pub fn predict(&self, features: &[f32]) -> Result<(usize, f32), ModelError> {
        let probs = self.predict_proba(features)?;
        Ok(argmax(&probs))
    }

    pub fn n_classes(&self) -> usize {
        self.intercepts.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

/// Index and value of the largest element; first wins on ties.
pub fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 { (i, v) } else { best }
        })
}

fn dot_f32(w: &[f32], x: &[f32]) -> f64 {
    w.iter()
        .zip(x)
        .map(|(&a, &b)| f64::from(a) * f64::from(b))
        .sum()
}

/// Numerically stable softmax.
fn softmax_in_place(v: &mut [f64]) {
    let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for x in v.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    for x in v.iter_mut() {
        *x /= sum;
    }
}
