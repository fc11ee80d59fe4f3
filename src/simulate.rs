// src/simulate.rs

use log::debug;
use ndarray::{Array2, ArrayView1, ArrayView2};
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::error::{PcaError, Result};
use crate::moments::{impose_moments, MomentMatchConfig};

/// Draws `n_samples` multivariate normal observations whose *empirical* mean
/// and covariance equal `mean` and `cov` exactly.
///
/// Standard normal draws from a ChaCha8 generator seeded with `seed` are
/// passed through [`impose_moments`], so the same seed always yields the same
/// sample.
///
/// # Errors
/// `PcaError::InvalidInput` if `mean` is empty, `n_samples <= mean.len()`,
/// or `cov` is not a matching symmetric positive definite matrix.
pub fn exact_normal_sample(
    n_samples: usize,
    mean: ArrayView1<f64>,
    cov: ArrayView2<f64>,
    seed: u64,
    config: &MomentMatchConfig,
) -> Result<Array2<f64>> {
    let n_features = mean.len();
    if n_features == 0 {
        return Err(PcaError::invalid("target mean must have at least one entry"));
    }
    if n_samples <= n_features {
        return Err(PcaError::invalid(format!(
            "need more samples ({}) than features ({})",
            n_samples, n_features
        )));
    }
    debug!(
        "Simulating {} x {} exact-moment normal sample (seed {}).",
        n_samples, n_features, seed
    );
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let raw = Array2::random_using((n_samples, n_features), StandardNormal, &mut rng);
    impose_moments(raw.view(), mean, cov, config)
}
