// src/error.rs

use std::error::Error;
use thiserror::Error;

/// Boxed error produced at the linear algebra backend seam.
pub type ThreadSafeStdError = Box<dyn Error + Send + Sync + 'static>;

/// Errors reported by the decomposition, transform and regression routines.
///
/// Every error is raised synchronously by the failing call; nothing is
/// retried or recovered internally.
#[derive(Debug, Error)]
pub enum PcaError {
    /// Malformed shapes, non-finite values, out-of-range component counts,
    /// zero-variance columns under standardisation, a target covariance that
    /// is not positive definite, or a singular empirical covariance.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The empirical covariance is too ill-conditioned to build a well-scaled transform.
    #[error("numerical instability: condition number {condition_number:e} exceeds threshold {threshold:e}")]
    NumericalInstability {
        condition_number: f64,
        threshold: f64,
    },

    /// A decomposition routine in the linear algebra backend failed.
    #[error("linear algebra backend failure: {0}")]
    Backend(String),

    /// Model file I/O or (de)serialization failed.
    #[error("model persistence failure: {0}")]
    Persistence(String),
}

impl PcaError {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        PcaError::InvalidInput(msg.into())
    }

    pub(crate) fn backend(context: &str, e: ThreadSafeStdError) -> Self {
        PcaError::Backend(format!("{}: {}", context, e))
    }
}

pub type Result<T> = std::result::Result<T, PcaError>;
