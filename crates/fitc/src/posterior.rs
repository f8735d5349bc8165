use crate::errors::Result;
use crate::factorization::FactorizationState;
use crate::utils::{colsum_sq, solve_upper, solve_upper_vec};
use linfa::Float;
use ndarray::{Array1, Array2};

/// Posterior weights `alpha = Luu^-1 (Lu^-1 be)` such that `Lu (Luu alpha) = be`
pub(crate) fn posterior_weights<F: Float>(fact: &FactorizationState<F>) -> Result<Array1<F>> {
    let tmp = solve_upper_vec(fact.lu(), fact.be())?;
    solve_upper_vec(fact.luu(), &tmp)
}

/// `scale Ktru^T alpha`
pub(crate) fn posterior_mean<F: Float>(fact: &FactorizationState<F>, alpha: &Array1<F>) -> Array1<F> {
    fact.blocks.ktru.t().dot(alpha) * fact.scale
}

/// `P P^T + diag(diag(Ktrtr) scale - colsum(V o V))` with `P = V^T Lu^-1`
pub(crate) fn posterior_covariance<F: Float>(fact: &FactorizationState<F>) -> Result<Array2<F>> {
    let m = fact.lu().nrows();
    let lu_inv = solve_upper(fact.lu(), &Array2::<F>::eye(m))?;
    let p = fact.v().t().dot(&lu_inv);
    let mut cov = p.dot(&p.t());
    let diag = fact.blocks.ktrtr_diag.mapv(|v| v * fact.scale) - colsum_sq(fact.v());
    cov.diag_mut().zip_mut_with(&diag, |c, d| *c += *d);
    Ok(cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factorization::{factorize, CovarianceBlocks};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_alpha_round_trip() {
        let blocks = CovarianceBlocks {
            kuu: array![[1., 0.4, 0.1], [0.4, 1., 0.3], [0.1, 0.3, 1.]],
            ktru: array![[0.9, 0.5, 0.1, 0.3], [0.2, 0.6, 0.8, 0.1], [0.1, 0.2, 0.5, 0.9]],
            ktrtr_diag: array![1., 1., 1., 1.],
        };
        let fact = factorize(blocks, array![0.5, -1.2, 2., 0.1], 2., 1e-8, 0.2).unwrap();
        let alpha = posterior_weights(&fact).unwrap();
        assert_abs_diff_eq!(fact.lu().dot(&fact.luu().dot(&alpha)), fact.be().to_owned(), epsilon = 1e-10);

        let cov = posterior_covariance(&fact).unwrap();
        assert_abs_diff_eq!(cov, cov.t(), epsilon = 1e-12);
    }
}
