use crate::errors::{FitcError, Result};
use linfa::Float;
use linfa_linalg::{cholesky::*, triangular::*, LinalgError};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};

/// Computes differences between x and each element of y
/// resulting in a 2d array of shape (nrows(y), ncols(x));
/// *Panics* if x and y have not the same number of components
pub fn differences<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    assert!(x.len() == y.ncols());
    x.to_owned() - y
}

/// Upper triangular Cholesky factor `U` of a symmetric matrix `a` such that `a = U^T U`.
///
/// `what` names the factorized matrix in the error raised when `a` is not positive definite.
pub(crate) fn cholesky_upper<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix2>,
    what: &str,
) -> Result<Array2<F>> {
    let lower = match a.cholesky() {
        Ok(l) => l,
        Err(LinalgError::NotPositiveDefinite) => {
            return Err(FitcError::NotPositiveDefinite(what.to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    // a zero or nan pivot would turn subsequent solves into inf/nan
    if lower.diag().iter().any(|v| !(*v > F::zero())) {
        return Err(FitcError::NotPositiveDefinite(what.to_string()));
    }
    Ok(lower.reversed_axes())
}

/// Solves `U X = B` given `U` upper triangular
pub(crate) fn solve_upper<F: Float>(
    u: &ArrayBase<impl Data<Elem = F>, Ix2>,
    b: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array2<F>> {
    Ok(u.solve_triangular(b, UPLO::Upper)?)
}

/// Solves `U^T X = B` given `U` upper triangular
pub(crate) fn solve_upper_t<F: Float>(
    u: &ArrayBase<impl Data<Elem = F>, Ix2>,
    b: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Array2<F>> {
    Ok(u.t().solve_triangular(b, UPLO::Lower)?)
}

/// Solves `U x = b` given `U` upper triangular
pub(crate) fn solve_upper_vec<F: Float>(
    u: &ArrayBase<impl Data<Elem = F>, Ix2>,
    b: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<Array1<F>> {
    let x = solve_upper(u, &b.view().insert_axis(Axis(1)))?;
    Ok(x.remove_axis(Axis(1)))
}

/// Solves `U^T x = b` given `U` upper triangular
pub(crate) fn solve_upper_t_vec<F: Float>(
    u: &ArrayBase<impl Data<Elem = F>, Ix2>,
    b: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<Array1<F>> {
    let x = solve_upper_t(u, &b.view().insert_axis(Axis(1)))?;
    Ok(x.remove_axis(Axis(1)))
}

/// Inverse of `U^T U` computed with two triangular solves
pub(crate) fn cholesky_inverse<F: Float>(u: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
    let eye = Array2::<F>::eye(u.nrows());
    let half = solve_upper_t(u, &eye)?;
    solve_upper(u, &half)
}

/// Sum of each column of the elementwise square of `a`, i.e. `diag(a^T a)`
pub(crate) fn colsum_sq<F: Float>(a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
    a.mapv(|v| v * v).sum_axis(Axis(0))
}
