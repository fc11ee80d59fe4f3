// src/linalg_backends.rs

use ndarray::{Array1, Array2};
use std::marker::PhantomData;

use crate::error::ThreadSafeStdError;

/// Dispatches decompositions to the backend selected by compile-time features.
///
/// The SVD goes through faer when `backend_faer` is enabled and through
/// ndarray-linalg (LAPACK) otherwise. Symmetric eigendecompositions, Cholesky
/// factorizations and triangular solves always use ndarray-linalg.
#[derive(Debug, Default, Copy, Clone)]
pub struct LinAlgBackendProvider<F: 'static + Copy + Send + Sync> {
    _phantom: PhantomData<F>,
}

impl<F: 'static + Copy + Send + Sync> LinAlgBackendProvider<F> {
    pub fn new() -> Self {
        Self { _phantom: PhantomData }
    }
}

/// Output of a symmetric eigendecomposition.
#[derive(Debug)]
pub struct EighOutput<F: 'static> {
    /// Eigenvalues in ascending order.
    pub eigenvalues: Array1<F>,
    /// eigenvectors.column(i) corresponds to eigenvalues[i].
    pub eigenvectors: Array2<F>,
}

/// Symmetric eigendecomposition reading the upper triangle (LAPACK DSYEVD).
pub trait BackendEigh<F: 'static + Copy + Send + Sync> {
    fn eigh_upper(&self, matrix: &Array2<F>) -> Result<EighOutput<F>, ThreadSafeStdError>;
}

/// Output of a singular value decomposition `A = U diag(s) V^T`.
///
/// `u` is m×m and `vt` is n×n when requested (full, not thin); `s` holds
/// min(m, n) singular values in descending order.
#[derive(Debug)]
pub struct SVDOutput<F: 'static> {
    pub u: Option<Array2<F>>,
    pub s: Array1<F>,
    pub vt: Option<Array2<F>>,
}

pub trait BackendSVD<F: 'static + Copy + Send + Sync> {
    fn svd_into(
        &self,
        matrix: Array2<F>,
        compute_u: bool,
        compute_v: bool,
    ) -> Result<SVDOutput<F>, ThreadSafeStdError>;
}

/// Cholesky factorization and the triangular solves that go with it.
pub trait BackendCholesky<F: 'static + Copy + Send + Sync> {
    /// Upper factor `R` with `matrix = R^T R`; the strict lower triangle is zero.
    fn cholesky_upper(&self, matrix: &Array2<F>) -> Result<Array2<F>, ThreadSafeStdError>;

    /// Solves `R X = B` for upper-triangular `R`.
    fn solve_upper_triangular(
        &self,
        r: &Array2<F>,
        b: &Array2<F>,
    ) -> Result<Array2<F>, ThreadSafeStdError>;
}

// --- ndarray-linalg (LAPACK) backend ---

use ndarray_linalg::{
    Cholesky as NdLinalgCholesky, Diag, Eigh as NdLinalgEigh, SVDInto as NdLinalgSVDInto,
    SolveTriangular as NdLinalgSolveTriangular, UPLO,
};

#[derive(Debug, Default, Copy, Clone)]
pub struct NdarrayLinAlgBackend;

fn to_dyn_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> ThreadSafeStdError {
    Box::new(e)
}

impl BackendEigh<f64> for NdarrayLinAlgBackend {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput<f64>, ThreadSafeStdError> {
        let (eigenvalues, eigenvectors) = matrix.eigh(UPLO::Upper).map_err(to_dyn_error)?;
        Ok(EighOutput { eigenvalues, eigenvectors })
    }
}

impl BackendSVD<f64> for NdarrayLinAlgBackend {
    fn svd_into(
        &self,
        matrix: Array2<f64>,
        compute_u: bool,
        compute_v: bool,
    ) -> Result<SVDOutput<f64>, ThreadSafeStdError> {
        let (u, s, vt) = matrix.svd_into(compute_u, compute_v).map_err(to_dyn_error)?;
        Ok(SVDOutput { u, s, vt })
    }
}

impl BackendCholesky<f64> for NdarrayLinAlgBackend {
    fn cholesky_upper(&self, matrix: &Array2<f64>) -> Result<Array2<f64>, ThreadSafeStdError> {
        let mut factor = matrix.cholesky(UPLO::Upper).map_err(to_dyn_error)?;
        for ((i, j), val) in factor.indexed_iter_mut() {
            if i > j {
                *val = 0.0;
            }
        }
        Ok(factor)
    }

    fn solve_upper_triangular(
        &self,
        r: &Array2<f64>,
        b: &Array2<f64>,
    ) -> Result<Array2<f64>, ThreadSafeStdError> {
        r.solve_triangular(UPLO::Upper, Diag::NonUnit, b)
            .map_err(to_dyn_error)
    }
}

// --- faer backend (SVD only) ---
#[cfg(feature = "backend_faer")]
mod faer_specific_code {
    use super::{BackendSVD, SVDOutput};
    use crate::error::ThreadSafeStdError;
    use faer::linalg::solvers::Svd as FaerSolverSvd;
    use faer::MatRef;
    use ndarray::{Array1, Array2, ShapeBuilder};

    fn to_dyn_error_faer(msg: String) -> ThreadSafeStdError {
        Box::new(std::io::Error::new(std::io::ErrorKind::Other, msg))
    }

    #[derive(Debug, Default, Copy, Clone)]
    pub struct FaerLinAlgBackend;

    fn faer_mat_to_ndarray(faer_mat: MatRef<'_, f64>) -> Array2<f64> {
        let nrows = faer_mat.nrows();
        let ncols = faer_mat.ncols();
        if nrows == 0 || ncols == 0 {
            return Array2::zeros((nrows, ncols).f());
        }
        Array2::from_shape_fn((nrows, ncols).f(), |(i, j)| faer_mat[(i, j)])
    }

    fn faer_col_to_ndarray_vec(faer_col: faer::ColRef<'_, f64>) -> Array1<f64> {
        Array1::from_shape_fn(faer_col.nrows(), |i| faer_col[i])
    }

    impl BackendSVD<f64> for FaerLinAlgBackend {
        fn svd_into(
            &self,
            matrix: Array2<f64>,
            compute_u: bool,
            compute_v: bool,
        ) -> Result<SVDOutput<f64>, ThreadSafeStdError> {
            let (nrows, ncols) = matrix.dim();
            if matrix.is_empty() {
                return Ok(SVDOutput {
                    u: if compute_u { Some(Array2::zeros((nrows, nrows))) } else { None },
                    s: Array1::zeros(nrows.min(ncols)),
                    vt: if compute_v { Some(Array2::zeros((ncols, ncols))) } else { None },
                });
            }
            // faer views need contiguous storage in either order.
            let contiguous = matrix.as_standard_layout();
            let slice = contiguous.as_slice().ok_or_else(|| {
                to_dyn_error_faer(format!(
                    "Failed to get slice from row-major ndarray matrix ({}x{})",
                    nrows, ncols
                ))
            })?;
            let faer_mat_ref = MatRef::from_row_major_slice(slice, nrows, ncols);

            let svd = FaerSolverSvd::new(faer_mat_ref)
                .map_err(|e| to_dyn_error_faer(format!("Faer SVD computation failed: {:?}", e)))?;

            let full_s = faer_col_to_ndarray_vec(svd.S().column_vector());
            let s = full_s.slice(ndarray::s![..nrows.min(ncols)]).to_owned();
            let u = if compute_u { Some(faer_mat_to_ndarray(svd.U())) } else { None };
            let vt = if compute_v {
                Some(faer_mat_to_ndarray(svd.V()).t().to_owned())
            } else {
                None
            };
            Ok(SVDOutput { u, s, vt })
        }
    }
}

impl BackendEigh<f64> for LinAlgBackendProvider<f64> {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput<f64>, ThreadSafeStdError> {
        NdarrayLinAlgBackend.eigh_upper(matrix)
    }
}

impl BackendCholesky<f64> for LinAlgBackendProvider<f64> {
    fn cholesky_upper(&self, matrix: &Array2<f64>) -> Result<Array2<f64>, ThreadSafeStdError> {
        NdarrayLinAlgBackend.cholesky_upper(matrix)
    }

    fn solve_upper_triangular(
        &self,
        r: &Array2<f64>,
        b: &Array2<f64>,
    ) -> Result<Array2<f64>, ThreadSafeStdError> {
        NdarrayLinAlgBackend.solve_upper_triangular(r, b)
    }
}

impl BackendSVD<f64> for LinAlgBackendProvider<f64> {
    fn svd_into(
        &self,
        matrix: Array2<f64>,
        compute_u: bool,
        compute_v: bool,
    ) -> Result<SVDOutput<f64>, ThreadSafeStdError> {
        #[cfg(feature = "backend_faer")]
        {
            faer_specific_code::FaerLinAlgBackend.svd_into(matrix, compute_u, compute_v)
        }
        #[cfg(not(feature = "backend_faer"))]
        {
            NdarrayLinAlgBackend.svd_into(matrix, compute_u, compute_v)
        }
    }
}
