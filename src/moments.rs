// src/moments.rs

//! Affine transforms that give a sample an exact prescribed empirical mean
//! vector and covariance matrix.

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{PcaError, Result};
use crate::linalg_backends::{BackendCholesky, LinAlgBackendProvider};
use crate::stats::{
    column_means, condition_number, is_symmetric, sample_covariance, validate_dataset,
    validate_vector,
};

/// Numerical guards for [`MomentTransform::fit`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MomentMatchConfig {
    /// Largest accepted spectral condition number of the input's empirical
    /// covariance. Beyond it fitting fails with `NumericalInstability`.
    pub max_condition_number: f64,
    /// Relative tolerance for the symmetry check on the target covariance.
    pub symmetry_tolerance: f64,
}

impl Default for MomentMatchConfig {
    fn default() -> Self {
        MomentMatchConfig {
            max_condition_number: 1e12,
            symmetry_tolerance: 1e-10,
        }
    }
}

/// The affine map `y = A x + b` fitted by [`MomentTransform::fit`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MomentTransform {
    /// A, shape (n_features, n_features)
    matrix: Array2<f64>,
    /// b, shape (n_features)
    offset: Array1<f64>,
}

impl MomentTransform {
    /// Fits the transform that maps `data` onto a sample whose empirical mean
    /// is `target_mean` and whose empirical covariance (N - 1 denominator) is
    /// `target_cov`.
    ///
    /// With upper Cholesky factors `Sigma_x = R_x^T R_x` of the input
    /// covariance and `Sigma = R^T R` of the target, the matrix is
    /// `A = (R_x^{-1} R)^T`, obtained by a triangular solve, and the offset is
    /// `b = mu - A x_bar`.
    ///
    /// # Errors
    /// `PcaError::InvalidInput` if the data is malformed or has `N <= D`, the
    /// target shapes do not match, the target covariance is not symmetric
    /// positive definite, or the empirical covariance is singular.
    /// `PcaError::NumericalInstability` if the empirical covariance's
    /// condition number exceeds `config.max_condition_number`.
    pub fn fit(
        data: ArrayView2<f64>,
        target_mean: ArrayView1<f64>,
        target_cov: ArrayView2<f64>,
        config: &MomentMatchConfig,
    ) -> Result<Self> {
        validate_dataset(data, 2)?;
        let (n_samples, n_features) = data.dim();
        if n_samples <= n_features {
            return Err(PcaError::invalid(format!(
                "need more samples than features for a full-rank covariance, got {} samples x {} features",
                n_samples, n_features
            )));
        }
        validate_vector(target_mean, n_features, "target mean")?;
        if target_cov.dim() != (n_features, n_features) {
            return Err(PcaError::invalid(format!(
                "target covariance has shape {:?}, expected ({}, {})",
                target_cov.dim(),
                n_features,
                n_features
            )));
        }
        if target_cov.iter().any(|v| !v.is_finite()) {
            return Err(PcaError::invalid("target covariance contains non-finite values"));
        }
        let target_cov = target_cov.to_owned();
        if !is_symmetric(&target_cov, config.symmetry_tolerance) {
            return Err(PcaError::invalid("target covariance is not symmetric"));
        }

        info!(
            "Fitting moment-matching transform for {} samples x {} features.",
            n_samples, n_features
        );

        let sample_mean = column_means(data)?;
        let sample_cov = sample_covariance(data)?;

        let cond = condition_number(&sample_cov)?;
        debug!("Empirical covariance condition number: {:e}", cond);
        if cond.is_infinite() {
            return Err(PcaError::invalid(
                "empirical covariance of the input is singular",
            ));
        }
        if cond > config.max_condition_number {
            return Err(PcaError::NumericalInstability {
                condition_number: cond,
                threshold: config.max_condition_number,
            });
        }

        let backend = LinAlgBackendProvider::<f64>::new();
        let r_sample = backend.cholesky_upper(&sample_cov).map_err(|e| {
            PcaError::invalid(format!(
                "empirical covariance is not positive definite: {}",
                e
            ))
        })?;
        let r_target = backend.cholesky_upper(&target_cov).map_err(|e| {
            PcaError::invalid(format!("target covariance is not positive definite: {}", e))
        })?;

        // M = R_x^{-1} R, so that A = M^T.
        let m = backend
            .solve_upper_triangular(&r_sample, &r_target)
            .map_err(|e| PcaError::backend("triangular solve R_x M = R failed", e))?;
        let matrix = m.t().to_owned();
        let offset = &target_mean - &matrix.dot(&sample_mean);

        Ok(Self { matrix, offset })
    }

    /// Applies `y_i = A x_i + b` to every row of `data`.
    pub fn apply(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.n_features() {
            return Err(PcaError::invalid(format!(
                "input has {} features, transform expects {}",
                data.ncols(),
                self.n_features()
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(PcaError::invalid("input contains non-finite values"));
        }
        let mut out = data.dot(&self.matrix.t());
        out += &self.offset;
        Ok(out)
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn offset(&self) -> &Array1<f64> {
        &self.offset
    }

    pub fn n_features(&self) -> usize {
        self.offset.len()
    }
}

/// Returns a copy of `data` whose empirical mean and covariance equal
/// `target_mean` and `target_cov` exactly, up to round-off.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use pca_moments::{impose_moments, MomentMatchConfig};
/// use pca_moments::stats::sample_covariance;
///
/// let x = array![[0.1, 1.2], [2.0, 0.3], [1.1, 2.5], [3.3, 1.9], [0.7, 0.2]];
/// let mu = array![1.0, 1.0];
/// let sigma = array![[2.0, 1.0], [1.0, 3.0]];
/// let y = impose_moments(x.view(), mu.view(), sigma.view(), &MomentMatchConfig::default()).unwrap();
/// let cov = sample_covariance(y.view()).unwrap();
/// assert!((cov[[0, 1]] - 1.0).abs() < 1e-9);
/// ```
pub fn impose_moments(
    data: ArrayView2<f64>,
    target_mean: ArrayView1<f64>,
    target_cov: ArrayView2<f64>,
    config: &MomentMatchConfig,
) -> Result<Array2<f64>> {
    MomentTransform::fit(data, target_mean, target_cov, config)?.apply(data)
}
