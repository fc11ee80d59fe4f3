// Principal component analysis and exact moment matching

#![doc = include_str!("../README.md")]

pub mod error;
pub mod linalg_backends;
pub mod moments;
pub mod pca;
pub mod regression;
pub mod simulate;
pub mod stats;

pub use error::{PcaError, Result};
pub use moments::{impose_moments, MomentMatchConfig, MomentTransform};
pub use pca::{PcaOptions, PrincipalComponents};
pub use regression::{cross_validate, CrossValidation, CrossValidationConfig, PcRegression};
pub use simulate::exact_normal_sample;
