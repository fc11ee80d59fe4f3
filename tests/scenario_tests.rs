// End-to-end checks: simulate exact-moment data, then decompose it.

use ndarray::{array, Array2, ArrayView1, Axis};
use pca_moments::stats::{column_means, sample_covariance};
use pca_moments::{exact_normal_sample, MomentMatchConfig, PcaError, PcaOptions, PrincipalComponents};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::error::Error;

const TOLERANCE: f64 = 1e-9;

fn assert_parallel(actual: ArrayView1<f64>, expected: ArrayView1<f64>, context: &str) {
    let dot: f64 = actual.dot(&expected);
    assert!(
        (dot.abs() - 1.0).abs() < 1e-8,
        "{}: loading {:?} is not parallel to {:?} (|dot| = {})",
        context,
        actual,
        expected,
        dot.abs()
    );
}

#[test]
fn test_simulated_sample_has_exact_moments_and_known_components() -> Result<(), Box<dyn Error>> {
    println!("--- Test: exact normal sample followed by PCA ---");
    let mean = array![1.0, 1.0];
    let cov = array![[5.0, 2.0], [2.0, 2.0]];
    let sample = exact_normal_sample(100, mean.view(), cov.view(), 7, &MomentMatchConfig::default())?;
    assert_eq!(sample.dim(), (100, 2));

    let sample_mean = column_means(sample.view())?;
    let sample_cov = sample_covariance(sample.view())?;
    for j in 0..2 {
        assert!((sample_mean[j] - mean[j]).abs() < TOLERANCE, "mean[{}] = {}", j, sample_mean[j]);
    }
    for ((i, j), v) in sample_cov.indexed_iter() {
        assert!((v - cov[[i, j]]).abs() < TOLERANCE, "cov[{},{}] = {}", i, j, v);
    }

    let pcs = PrincipalComponents::fit(sample.view(), &PcaOptions::default())?;
    println!("variances: {:?}", pcs.variances());
    assert!((pcs.variances()[0] - 6.0).abs() < 1e-8);
    assert!((pcs.variances()[1] - 1.0).abs() < 1e-8);

    let root5 = 5.0_f64.sqrt();
    assert_parallel(pcs.loadings().column(0), array![2.0 / root5, 1.0 / root5].view(), "PC1");
    assert_parallel(pcs.loadings().column(1), array![-1.0 / root5, 2.0 / root5].view(), "PC2");

    let share = pcs.cumulative_explained_variance(1)?;
    assert!((share - 6.0 / 7.0).abs() < 1e-9);
    assert_eq!(pcs.cumulative_explained_variance(2)?, 1.0);
    Ok(())
}

#[test]
fn test_exact_linear_feature_needs_one_component() -> Result<(), Box<dyn Error>> {
    let mut rng = ChaCha8Rng::seed_from_u64(12);
    let n = 100;
    let mut data = Array2::<f64>::zeros((n, 2));
    for mut row in data.axis_iter_mut(Axis(0)) {
        let x: f64 = rng.gen_range(-10.0..10.0);
        row[0] = x;
        row[1] = -2.5 * x + 4.0;
    }
    let pcs = PrincipalComponents::fit(data.view(), &PcaOptions::default())?;
    let share = pcs.cumulative_explained_variance(1)?;
    println!("first component explains {:.15}", share);
    assert!(share >= 0.999);
    assert!((share - 1.0).abs() < 1e-12);
    assert!(pcs.variances()[1] < 1e-12 * pcs.variances()[0]);

    // The leading loading follows the line's direction (1, -2.5).
    let norm = (1.0_f64 + 6.25).sqrt();
    assert_parallel(pcs.loadings().column(0), array![1.0 / norm, -2.5 / norm].view(), "PC1");
    Ok(())
}

#[test]
fn test_nearly_collinear_features_need_one_component() -> Result<(), Box<dyn Error>> {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let n = 200;
    let mut data = Array2::<f64>::zeros((n, 2));
    for mut row in data.axis_iter_mut(Axis(0)) {
        let x: f64 = rng.gen_range(-10.0..10.0);
        row[0] = x;
        row[1] = 3.0 * x + 1.0 + rng.gen_range(-0.01..0.01);
    }
    let pcs = PrincipalComponents::fit(data.view(), &PcaOptions::default())?;
    let share = pcs.cumulative_explained_variance(1)?;
    println!("first component explains {:.6}", share);
    assert!(share >= 0.999);

    let rank_one = pcs.reconstruct(1)?;
    let max_err = (&data - &rank_one).iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    assert!(max_err < 0.02, "rank-1 reconstruction off by {}", max_err);
    Ok(())
}

#[test]
fn test_simulation_is_deterministic_per_seed() -> Result<(), Box<dyn Error>> {
    let mean = array![0.0, 2.0, -1.0];
    let cov = array![[1.0, 0.3, 0.0], [0.3, 2.0, 0.5], [0.0, 0.5, 1.5]];
    let config = MomentMatchConfig::default();
    let a = exact_normal_sample(50, mean.view(), cov.view(), 42, &config)?;
    let b = exact_normal_sample(50, mean.view(), cov.view(), 42, &config)?;
    let c = exact_normal_sample(50, mean.view(), cov.view(), 43, &config)?;
    assert_eq!(a, b);
    assert_ne!(a, c);
    Ok(())
}

#[test]
fn test_simulation_rejects_bad_requests() {
    let config = MomentMatchConfig::default();
    let mean = array![0.0, 0.0];
    let cov = array![[1.0, 0.0], [0.0, 1.0]];
    assert!(matches!(
        exact_normal_sample(2, mean.view(), cov.view(), 1, &config),
        Err(PcaError::InvalidInput(_))
    ));
    let not_pd = array![[1.0, 2.0], [2.0, 1.0]];
    assert!(matches!(
        exact_normal_sample(20, mean.view(), not_pd.view(), 1, &config),
        Err(PcaError::InvalidInput(_))
    ));
    let empty = ndarray::Array1::<f64>::zeros(0);
    let empty_cov = Array2::<f64>::zeros((0, 0));
    assert!(matches!(
        exact_normal_sample(20, empty.view(), empty_cov.view(), 1, &config),
        Err(PcaError::InvalidInput(_))
    ));
}

#[test]
fn test_standardized_and_covariance_fits_agree_on_unit_variance_data() -> Result<(), Box<dyn Error>> {
    // Data already at unit sample variance: both preprocessing modes see the same matrix.
    let mean = array![3.0, -2.0, 0.5];
    let cov = array![[1.0, 0.6, 0.2], [0.6, 1.0, 0.1], [0.2, 0.1, 1.0]];
    let sample = exact_normal_sample(80, mean.view(), cov.view(), 5, &MomentMatchConfig::default())?;
    let plain = PrincipalComponents::fit(sample.view(), &PcaOptions::default())?;
    let standardized = PrincipalComponents::fit(sample.view(), &PcaOptions::standardized())?;
    for k in 0..3 {
        assert!((plain.variances()[k] - standardized.variances()[k]).abs() < 1e-8);
        assert_parallel(
            plain.loadings().column(k),
            standardized.loadings().column(k),
            &format!("PC{}", k + 1),
        );
    }
    Ok(())
}
