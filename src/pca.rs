// Principal component analysis (PCA)

use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{PcaError, Result};
use crate::linalg_backends::{BackendSVD, LinAlgBackendProvider};
use crate::stats::{column_means, max_abs_deviation_from_identity, validate_dataset};

/// A column is treated as constant when standardisation is requested if its
/// sample standard deviation is at most this fraction of its largest
/// absolute entry.
pub const ZERO_VARIANCE_RELATIVE_TOLERANCE: f64 = 1e-12;

/// Orthonormality defect above which a warning is logged after fitting.
const ORTHONORMALITY_TOLERANCE: f64 = 1e-8;

/// Options controlling how the data is preprocessed before decomposition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PcaOptions {
    /// Divide each centered column by its sample standard deviation
    /// (correlation-matrix PCA). Fails on zero-variance columns.
    pub standardize: bool,
}

impl PcaOptions {
    pub fn standardized() -> Self {
        Self { standardize: true }
    }
}

/// Result of a principal component decomposition.
///
/// Holds the column means, the optional standardisation scale, the D×D
/// loading matrix (one unit-length loading vector per column, ordered by
/// descending variance), the D component variances and the N×D score matrix.
/// The decomposition is immutable once fitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrincipalComponents {
    /// Shape: (n_features)
    pub(crate) mean: Array1<f64>,
    /// Sample standard deviations used for standardisation, if requested.
    /// Shape: (n_features)
    pub(crate) scale: Option<Array1<f64>>,
    /// Shape: (n_features, n_features)
    pub(crate) loadings: Array2<f64>,
    /// lambda_k = sigma_k^2 / (n_samples - 1), non-increasing.
    /// Shape: (n_features)
    pub(crate) variances: Array1<f64>,
    /// Centered (and scaled) data expressed in the loading basis.
    /// Shape: (n_samples, n_features)
    pub(crate) scores: Array2<f64>,
}

impl PrincipalComponents {
    /// Computes the principal components of `data` (rows are observations).
    ///
    /// The data is centered on its column means and, when
    /// `options.standardize` is set, scaled to unit sample variance. The
    /// decomposition is taken from the singular value decomposition of that
    /// matrix, never from an explicitly formed covariance matrix:
    /// the right singular vectors are the loadings, `sigma_k^2 / (N - 1)` the
    /// variances, and `centered · loadings` the scores.
    ///
    /// Components are ordered by a stable sort on descending singular value,
    /// so exactly equal singular values keep the order the backend returned
    /// them in; loadings, variances and score columns are permuted together.
    /// When `N - 1 < D` the trailing variances are zero and their loadings
    /// complete an orthonormal basis of feature space.
    ///
    /// Loading signs are arbitrary.
    ///
    /// # Errors
    /// `PcaError::InvalidInput` if the data has fewer than 2 rows, no columns,
    /// non-finite entries, or (when standardising) a zero-variance column.
    /// `PcaError::Backend` if the SVD fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use pca_moments::{PcaOptions, PrincipalComponents};
    ///
    /// let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 7.0]];
    /// let pcs = PrincipalComponents::fit(data.view(), &PcaOptions::default()).unwrap();
    /// assert_eq!(pcs.loadings().dim(), (2, 2));
    /// ```
    pub fn fit(data: ArrayView2<f64>, options: &PcaOptions) -> Result<Self> {
        validate_dataset(data, 2)?;
        let (n_samples, n_features) = data.dim();
        info!(
            "Fitting PCA on {} samples x {} features (standardize = {}).",
            n_samples, n_features, options.standardize
        );

        let mean = column_means(data)?;
        let mut centered = &data - &mean;

        let scale = if options.standardize {
            let std_devs = centered.std_axis(Axis(0), 1.0);
            let magnitudes = data.fold_axis(Axis(0), 0.0_f64, |acc, v| acc.max(v.abs()));
            if let Some((col, sd)) = std_devs
                .iter()
                .zip(magnitudes.iter())
                .enumerate()
                .find(|(_, (sd, mag))| **sd <= ZERO_VARIANCE_RELATIVE_TOLERANCE * **mag)
                .map(|(col, (sd, _))| (col, sd))
            {
                return Err(PcaError::invalid(format!(
                    "column {} has zero variance (sd = {:e}) and cannot be standardized",
                    col, sd
                )));
            }
            centered /= &std_devs;
            Some(std_devs)
        } else {
            None
        };

        let backend = LinAlgBackendProvider::<f64>::new();
        let svd = backend
            .svd_into(centered.clone(), false, true)
            .map_err(|e| PcaError::backend("SVD of centered data failed", e))?;
        let vt = svd
            .vt
            .ok_or_else(|| PcaError::Backend("SVD did not return right singular vectors".into()))?;
        if vt.dim() != (n_features, n_features) {
            return Err(PcaError::Backend(format!(
                "SVD returned V^T of shape {:?}, expected ({}, {})",
                vt.dim(),
                n_features,
                n_features
            )));
        }

        // Singular values beyond min(N, D) are exactly zero.
        let singular_values: Vec<f64> = (0..n_features)
            .map(|k| svd.s.get(k).copied().unwrap_or(0.0).max(0.0))
            .collect();
        let order = descending_order(&singular_values);

        let loadings = vt.t().select(Axis(1), &order);
        let denom = (n_samples - 1) as f64;
        let variances: Array1<f64> = order
            .iter()
            .map(|&k| singular_values[k].powi(2) / denom)
            .collect();
        let scores = centered.dot(&loadings);

        if n_samples - 1 < n_features {
            debug!(
                "Only {} samples for {} features: trailing {} components carry zero variance.",
                n_samples,
                n_features,
                n_features - (n_samples - 1)
            );
        }
        let defect = max_abs_deviation_from_identity(loadings.view());
        if defect > ORTHONORMALITY_TOLERANCE {
            warn!(
                "Loadings deviate from orthonormality by {:e} (tolerance {:e}).",
                defect, ORTHONORMALITY_TOLERANCE
            );
        }
        debug!("Component variances: {:?}", variances);
        info!("PCA fit complete; total variance {:.6e}.", variances.sum());

        Ok(Self {
            mean,
            scale,
            loadings,
            variances,
            scores,
        })
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Standardisation scale (column sample standard deviations), `None` for covariance PCA.
    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }

    /// Loading vectors as columns, shape (n_features, n_features).
    pub fn loadings(&self) -> &Array2<f64> {
        &self.loadings
    }

    /// Component variances in descending order, shape (n_features).
    pub fn variances(&self) -> &Array1<f64> {
        &self.variances
    }

    /// Score matrix, shape (n_samples, n_features).
    pub fn scores(&self) -> &Array2<f64> {
        &self.scores
    }

    pub fn n_samples(&self) -> usize {
        self.scores.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn check_components(&self, k: usize) -> Result<()> {
        if k < 1 || k > self.n_features() {
            return Err(PcaError::invalid(format!(
                "number of components must be in 1..={}, got {}",
                self.n_features(),
                k
            )));
        }
        Ok(())
    }

    /// First `k` score columns, shape (n_samples, k).
    ///
    /// # Errors
    /// `PcaError::InvalidInput` unless `1 <= k <= n_features`.
    pub fn project(&self, k: usize) -> Result<Array2<f64>> {
        self.check_components(k)?;
        Ok(self.scores.slice(s![.., ..k]).to_owned())
    }

    /// Approximates the fitted data from its first `k` components:
    /// `mean + (scores[:, :k] · loadings[:, :k]^T) * scale`, where the scale
    /// factor only applies to standardized fits. With `k == n_features` the
    /// original data is recovered up to round-off.
    pub fn reconstruct(&self, k: usize) -> Result<Array2<f64>> {
        self.check_components(k)?;
        let mut approx = self
            .scores
            .slice(s![.., ..k])
            .dot(&self.loadings.slice(s![.., ..k]).t());
        if let Some(scale) = &self.scale {
            approx *= scale;
        }
        approx += &self.mean;
        Ok(approx)
    }

    /// Sum of squared differences between `original` and `reconstruct(k)`.
    ///
    /// Non-increasing in `k` and zero (up to round-off) at `k == n_features`
    /// when `original` is the fitted data.
    pub fn reconstruction_error(&self, original: ArrayView2<f64>, k: usize) -> Result<f64> {
        if original.dim() != self.scores.dim() {
            return Err(PcaError::invalid(format!(
                "original data has shape {:?}, decomposition was fitted on {:?}",
                original.dim(),
                self.scores.dim()
            )));
        }
        let approx = self.reconstruct(k)?;
        Ok((&original - &approx).mapv(|d| d * d).sum())
    }

    /// Fraction of total variance carried by each component.
    ///
    /// All zeros when the data has no variance at all.
    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        let total = self.variances.sum();
        if total <= 0.0 {
            return Array1::zeros(self.variances.len());
        }
        self.variances.mapv(|v| v / total)
    }

    /// Fraction of total variance carried by the first `k` components.
    ///
    /// Lies in [0, 1], is non-decreasing in `k` and equals 1 at `k == n_features`.
    /// A dataset with zero total variance is reconstructed exactly by any
    /// number of components, so it reports 1 for every `k`.
    pub fn cumulative_explained_variance(&self, k: usize) -> Result<f64> {
        self.check_components(k)?;
        let total = self.variances.sum();
        if total <= 0.0 || k == self.n_features() {
            return Ok(1.0);
        }
        let partial: f64 = self.variances.iter().take(k).sum();
        Ok((partial / total).clamp(0.0, 1.0))
    }

    /// Projects new observations onto the first `k` loading vectors, using the
    /// mean (and scale) learned during fitting.
    ///
    /// * `new_data` - shape (m_samples, n_features); may hold a single row.
    ///
    /// # Errors
    /// `PcaError::InvalidInput` on a feature-count mismatch, non-finite
    /// values, or `k` out of range.
    pub fn transform(&self, new_data: ArrayView2<f64>, k: usize) -> Result<Array2<f64>> {
        self.check_components(k)?;
        if new_data.ncols() != self.n_features() {
            return Err(PcaError::invalid(format!(
                "input has {} features, model was fitted on {}",
                new_data.ncols(),
                self.n_features()
            )));
        }
        if new_data.iter().any(|v| !v.is_finite()) {
            return Err(PcaError::invalid("input contains non-finite values"));
        }
        if new_data.nrows() == 0 {
            return Ok(Array2::zeros((0, k)));
        }
        let mut x = new_data.to_owned();
        let unit_scale;
        let scale = match &self.scale {
            Some(scale) => scale,
            None => {
                unit_scale = Array1::ones(self.n_features());
                &unit_scale
            }
        };
        for mut row in x.axis_iter_mut(Axis(0)) {
            ndarray::Zip::from(row.view_mut())
                .and(&self.mean)
                .and(scale)
                .for_each(|val, &m, &sd| *val = (*val - m) / sd);
        }
        Ok(x.dot(&self.loadings.slice(s![.., ..k])))
    }

    /// Saves the decomposition to a file using bincode.
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref()).map_err(|e| {
            PcaError::Persistence(format!("failed to create {:?}: {}", path.as_ref(), e))
        })?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .map_err(|e| PcaError::Persistence(format!("failed to serialize model: {}", e)))?;
        info!("Saved PCA model to {:?}.", path.as_ref());
        Ok(())
    }

    /// Loads a decomposition written by [`save_model`](Self::save_model) and
    /// checks that it is internally consistent.
    pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            PcaError::Persistence(format!("failed to open {:?}: {}", path.as_ref(), e))
        })?;
        let mut reader = BufReader::new(file);
        let model: PrincipalComponents =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
                .map_err(|e| PcaError::Persistence(format!("failed to deserialize model: {}", e)))?;
        model.validate_loaded()?;
        Ok(model)
    }

    fn validate_loaded(&self) -> Result<()> {
        let d = self.mean.len();
        if d == 0 {
            return Err(PcaError::invalid("loaded model has zero features"));
        }
        if self.loadings.dim() != (d, d) || self.variances.len() != d || self.scores.ncols() != d {
            return Err(PcaError::invalid(format!(
                "loaded model has inconsistent shapes: mean {}, loadings {:?}, variances {}, scores {:?}",
                d,
                self.loadings.dim(),
                self.variances.len(),
                self.scores.dim()
            )));
        }
        if let Some(scale) = &self.scale {
            if scale.len() != d || scale.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(PcaError::invalid(
                    "loaded model's scale vector must hold positive finite values, one per feature",
                ));
            }
        }
        if self.variances.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(PcaError::invalid(
                "loaded model's variances must be finite and non-negative",
            ));
        }
        let all_finite = self
            .mean
            .iter()
            .chain(self.loadings.iter())
            .chain(self.scores.iter())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(PcaError::invalid("loaded model contains non-finite values"));
        }
        Ok(())
    }
}

/// Indices sorted by descending value; the sort is stable, so equal values
/// keep their original relative order.
fn descending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order
}
