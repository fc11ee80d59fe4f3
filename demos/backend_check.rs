use ndarray::{array, Array2};
use pca_moments::{impose_moments, MomentMatchConfig, PcaOptions, PrincipalComponents};

fn main() {
    // Create a simple test matrix
    let data = Array2::from_shape_vec((4, 2), vec![1.0, 2.0, 3.0, 4.5, 5.0, 6.0, 2.0, 1.0])
        .expect("static shape");

    let pcs = PrincipalComponents::fit(data.view(), &PcaOptions::default()).expect("PCA fit failed");

    let backend = if cfg!(feature = "backend_faer") { "faer" } else { "ndarray-linalg" };
    println!("PCA backend test works ({}).", backend);
    println!("Loadings shape: {:?}", pcs.loadings().dim());
    println!("Component variances: {:?}", pcs.variances());
    println!("Explained variance ratio: {:?}", pcs.explained_variance_ratio());

    let mean = array![0.0, 0.0];
    let cov = array![[1.0, 0.5], [0.5, 2.0]];
    let matched = impose_moments(data.view(), mean.view(), cov.view(), &MomentMatchConfig::default())
        .expect("moment matching failed");
    println!("Moment-matched sample:\n{:?}", matched);
}
