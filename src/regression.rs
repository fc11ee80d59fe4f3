// src/regression.rs

//! Principal component regression: ordinary least squares of an outcome on
//! the leading score columns, with K-fold cross-validation over the number
//! of components.

use log::{debug, info};
use ndarray::{s, Array1, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PcaError, Result};
use crate::pca::{PcaOptions, PrincipalComponents};

/// Score columns with squared norm at or below this are given a zero coefficient.
const DEGENERATE_SCORE_NORM: f64 = 1e-12;

/// Least-squares fit of an outcome on the first `k` principal component scores.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PcRegression {
    n_components: usize,
    intercept: f64,
    /// gamma, one coefficient per retained score column. Shape: (k)
    score_coefficients: Array1<f64>,
    /// The same fit expressed on the raw (unstandardized) features. Shape: (n_features)
    feature_coefficients: Array1<f64>,
    /// Shape: (n_features)
    feature_mean: Array1<f64>,
}

impl PcRegression {
    /// Regresses `y` on the first `k` score columns of `pcs`.
    ///
    /// Scores are centered and mutually orthogonal, so the normal equations
    /// decouple: the intercept is the mean of `y` and each coefficient is
    /// `<s_k, y> / <s_k, s_k>`.
    ///
    /// # Errors
    /// `PcaError::InvalidInput` if `y` does not have one finite entry per
    /// fitted sample or `k` is out of range.
    pub fn fit(pcs: &PrincipalComponents, y: ArrayView1<f64>, k: usize) -> Result<Self> {
        let scores = pcs.project(k)?;
        if y.len() != pcs.n_samples() {
            return Err(PcaError::invalid(format!(
                "outcome has {} entries, decomposition has {} samples",
                y.len(),
                pcs.n_samples()
            )));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(PcaError::invalid("outcome contains non-finite values"));
        }

        let y_mean = y.mean().ok_or_else(|| PcaError::invalid("outcome is empty"))?;
        let y_centered = y.mapv(|v| v - y_mean);
        let score_coefficients: Array1<f64> = scores
            .axis_iter(Axis(1))
            .map(|col| {
                let norm_sq = col.dot(&col);
                if norm_sq > DEGENERATE_SCORE_NORM {
                    col.dot(&y_centered) / norm_sq
                } else {
                    0.0
                }
            })
            .collect();

        let mut feature_coefficients = pcs.loadings().slice(s![.., ..k]).dot(&score_coefficients);
        if let Some(scale) = pcs.scale() {
            feature_coefficients /= scale;
        }

        Ok(Self {
            n_components: k,
            intercept: y_mean,
            score_coefficients,
            feature_coefficients,
            feature_mean: pcs.mean().clone(),
        })
    }

    /// Predicts the outcome for raw feature rows.
    pub fn predict(&self, data: ArrayView2<f64>) -> Result<Array1<f64>> {
        if data.ncols() != self.feature_mean.len() {
            return Err(PcaError::invalid(format!(
                "input has {} features, regression was fitted on {}",
                data.ncols(),
                self.feature_mean.len()
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(PcaError::invalid("input contains non-finite values"));
        }
        let centered = &data - &self.feature_mean;
        let mut predictions = centered.dot(&self.feature_coefficients);
        predictions += self.intercept;
        Ok(predictions)
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn score_coefficients(&self) -> &Array1<f64> {
        &self.score_coefficients
    }

    pub fn feature_coefficients(&self) -> &Array1<f64> {
        &self.feature_coefficients
    }
}

/// Settings for [`cross_validate`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationConfig {
    /// Largest number of components to evaluate; `None` evaluates all of them.
    pub max_components: Option<usize>,
    pub folds: usize,
    /// Seed for the shuffle that assigns observations to folds.
    pub seed: u64,
    /// Preprocessing applied when refitting the PCA inside each fold.
    pub options: PcaOptions,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        CrossValidationConfig {
            max_components: None,
            folds: 10,
            seed: 2025,
            options: PcaOptions::default(),
        }
    }
}

/// Root mean squared error of prediction for each number of components.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrossValidation {
    /// `rmsep[k - 1]` is the error using `k` components.
    rmsep: Array1<f64>,
    /// Error of predicting every held-out value by the training mean.
    intercept_only_rmsep: f64,
}

impl CrossValidation {
    pub fn rmsep(&self) -> &Array1<f64> {
        &self.rmsep
    }

    pub fn intercept_only_rmsep(&self) -> f64 {
        self.intercept_only_rmsep
    }

    /// Number of components with the lowest RMSEP (the smallest such `k` on ties).
    pub fn best_k(&self) -> usize {
        let mut best = 0;
        for (i, &err) in self.rmsep.iter().enumerate() {
            if err < self.rmsep[best] {
                best = i;
            }
        }
        best + 1
    }
}

/// K-fold cross-validated principal component regression of `y` on `data`.
///
/// Observations are shuffled with a seeded ChaCha8 generator and dealt into
/// `config.folds` folds. Each fold refits the PCA on its training rows only,
/// regresses on 1..=max_components scores, and predicts the held-out rows.
/// Folds are evaluated in parallel.
///
/// # Errors
/// `PcaError::InvalidInput` if `y` does not match `data`, `folds` is not in
/// `2..=n_samples`, `max_components` is out of range, or a training split
/// has fewer than 2 rows. Errors from the per-fold fits are propagated.
pub fn cross_validate(
    data: ArrayView2<f64>,
    y: ArrayView1<f64>,
    config: &CrossValidationConfig,
) -> Result<CrossValidation> {
    crate::stats::validate_dataset(data, 2)?;
    let (n_samples, n_features) = data.dim();
    if y.len() != n_samples {
        return Err(PcaError::invalid(format!(
            "outcome has {} entries, data has {} samples",
            y.len(),
            n_samples
        )));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(PcaError::invalid("outcome contains non-finite values"));
    }
    let folds = config.folds;
    if folds < 2 || folds > n_samples {
        return Err(PcaError::invalid(format!(
            "number of folds must be in 2..={}, got {}",
            n_samples, folds
        )));
    }
    let max_k = config.max_components.unwrap_or(n_features);
    if max_k < 1 || max_k > n_features {
        return Err(PcaError::invalid(format!(
            "max_components must be in 1..={}, got {}",
            n_features, max_k
        )));
    }
    let largest_fold = (n_samples + folds - 1) / folds;
    if n_samples - largest_fold < 2 {
        return Err(PcaError::invalid(format!(
            "{} folds over {} samples leave fewer than 2 training rows",
            folds, n_samples
        )));
    }

    info!(
        "Cross-validating PC regression: {} samples, {} folds, up to {} components.",
        n_samples, folds, max_k
    );

    let mut order: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    order.shuffle(&mut rng);

    // Each fold yields the squared errors for the intercept-only model followed by k = 1..=max_k.
    let per_fold: Vec<Array1<f64>> = (0..folds)
        .into_par_iter()
        .map(|fold| -> Result<Array1<f64>> {
            let (test_idx, train_idx): (Vec<usize>, Vec<usize>) = order
                .iter()
                .enumerate()
                .map(|(pos, &row)| (pos % folds == fold, row))
                .fold((Vec::new(), Vec::new()), |(mut test, mut train), (is_test, row)| {
                    if is_test {
                        test.push(row);
                    } else {
                        train.push(row);
                    }
                    (test, train)
                });

            let train_x = data.select(Axis(0), &train_idx);
            let train_y = y.select(Axis(0), &train_idx);
            let test_x = data.select(Axis(0), &test_idx);
            let test_y = y.select(Axis(0), &test_idx);

            let pcs = PrincipalComponents::fit(train_x.view(), &config.options)?;
            let train_mean = train_y
                .mean()
                .ok_or_else(|| PcaError::invalid("empty training fold"))?;

            let mut sse = Array1::<f64>::zeros(max_k + 1);
            sse[0] = test_y.iter().map(|v| (v - train_mean).powi(2)).sum();
            for k in 1..=max_k {
                let model = PcRegression::fit(&pcs, train_y.view(), k)?;
                let predicted = model.predict(test_x.view())?;
                sse[k] = (&test_y - &predicted).mapv(|d| d * d).sum();
            }
            debug!("Fold {} done ({} held-out rows).", fold, test_idx.len());
            Ok(sse)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut total_sse = Array1::<f64>::zeros(max_k + 1);
    for sse in &per_fold {
        total_sse += sse;
    }
    let rmse = total_sse.mapv(|v| (v / n_samples as f64).sqrt());

    Ok(CrossValidation {
        rmsep: rmse.slice(s![1..]).to_owned(),
        intercept_only_rmsep: rmse[0],
    })
}
