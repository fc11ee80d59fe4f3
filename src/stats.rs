// src/stats.rs

//! Column statistics and small matrix diagnostics shared by the
//! decomposition and the moment-matching transform.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{PcaError, Result};
use crate::linalg_backends::{BackendEigh, LinAlgBackendProvider};

/// Checks that `data` has at least `min_rows` rows, at least one column, and only finite entries.
pub fn validate_dataset(data: ArrayView2<f64>, min_rows: usize) -> Result<()> {
    let (n_samples, n_features) = data.dim();
    if n_features == 0 {
        return Err(PcaError::invalid("dataset has zero features"));
    }
    if n_samples < min_rows {
        return Err(PcaError::invalid(format!(
            "dataset must have at least {} samples, got {}",
            min_rows, n_samples
        )));
    }
    if let Some(((row, col), val)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(PcaError::invalid(format!(
            "dataset contains a non-finite value ({}) at row {}, column {}",
            val, row, col
        )));
    }
    Ok(())
}

pub(crate) fn validate_vector(v: ArrayView1<f64>, expected_len: usize, name: &str) -> Result<()> {
    if v.len() != expected_len {
        return Err(PcaError::invalid(format!(
            "{} has length {}, expected {}",
            name,
            v.len(),
            expected_len
        )));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(PcaError::invalid(format!("{} contains non-finite values", name)));
    }
    Ok(())
}

pub fn column_means(data: ArrayView2<f64>) -> Result<Array1<f64>> {
    data.mean_axis(Axis(0))
        .ok_or_else(|| PcaError::invalid("cannot compute column means of an empty dataset"))
}

/// Per-column sample standard deviations (denominator N - 1).
pub fn column_std_devs(data: ArrayView2<f64>) -> Result<Array1<f64>> {
    if data.nrows() < 2 {
        return Err(PcaError::invalid(
            "sample standard deviation needs at least 2 samples",
        ));
    }
    Ok(data.std_axis(Axis(0), 1.0))
}

/// Sample covariance matrix (denominator N - 1), symmetrized against round-off.
pub fn sample_covariance(data: ArrayView2<f64>) -> Result<Array2<f64>> {
    let n_samples = data.nrows();
    if n_samples < 2 {
        return Err(PcaError::invalid("sample covariance needs at least 2 samples"));
    }
    let mean = column_means(data)?;
    let centered = &data - &mean;
    let mut cov = centered.t().dot(&centered);
    cov /= (n_samples - 1) as f64;
    let symmetric = (&cov + &cov.t()) * 0.5;
    Ok(symmetric)
}

/// Spectral condition number `lambda_max / lambda_min` of a symmetric matrix.
///
/// Returns `f64::INFINITY` when the matrix is numerically singular, i.e.
/// `lambda_min <= n * eps * lambda_max`.
pub fn condition_number(symmetric: &Array2<f64>) -> Result<f64> {
    if symmetric.is_empty() {
        return Err(PcaError::invalid("condition number of an empty matrix"));
    }
    let backend = LinAlgBackendProvider::<f64>::new();
    let eig = backend
        .eigh_upper(symmetric)
        .map_err(|e| PcaError::backend("eigendecomposition for condition number failed", e))?;
    let lambda_min = eig.eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min);
    let lambda_max = eig.eigenvalues.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let singular_floor = symmetric.nrows() as f64 * f64::EPSILON * lambda_max.max(0.0);
    if lambda_min <= singular_floor {
        Ok(f64::INFINITY)
    } else {
        Ok(lambda_max / lambda_min)
    }
}

/// `max |M^T M - I|`, the orthonormality defect of the columns of `m`.
pub fn max_abs_deviation_from_identity(m: ArrayView2<f64>) -> f64 {
    let gram = m.t().dot(&m);
    gram.indexed_iter()
        .map(|((i, j), &v)| if i == j { (v - 1.0).abs() } else { v.abs() })
        .fold(0.0, f64::max)
}

/// Symmetry up to `tolerance` relative to the largest absolute entry.
pub(crate) fn is_symmetric(m: &Array2<f64>, tolerance: f64) -> bool {
    if m.nrows() != m.ncols() {
        return false;
    }
    let scale = m.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    m.indexed_iter()
        .all(|((i, j), &v)| (v - m[[j, i]]).abs() <= tolerance * scale)
}
