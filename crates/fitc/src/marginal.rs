//! Negative log marginal likelihood of the FITC approximation and its derivatives
//! wrt noise, kernel, inference and mean parameters.

use crate::errors::Result;
use crate::factorization::FactorizationState;
use crate::utils::{colsum_sq, solve_upper_t, solve_upper_vec};
use linfa::Float;
use ndarray::{Array1, Array2, Axis};

/// Quantities shared by all derivative computations, rebuilt once per gradient cycle
#[derive(Clone, Debug)]
pub(crate) struct GradientState<F: Float> {
    /// `(Ktrtr_fitc + sigma^2 I)^-1 (y - m)`
    al: Array1<F>,
    /// `(Kuu.scale + noise.I)^-1 Ktru.scale`
    b: Array2<F>,
    /// `B al`
    w: Array1<F>,
    /// `Lu^-T (V diag(t))`
    w_mat: Array2<F>,
}

impl<F: Float> GradientState<F> {
    pub(crate) fn new(fact: &FactorizationState<F>) -> Result<Self> {
        let lu_be = solve_upper_vec(fact.lu(), fact.be())?;
        let al = (&fact.residual - &fact.v().t().dot(&lu_be)) * fact.t();
        let b = fact.ikuu().dot(&fact.blocks.ktru) * fact.scale;
        let w = b.dot(&al);
        let vt = fact.v() * &fact.t().view().insert_axis(Axis(0));
        let w_mat = solve_upper_t(fact.lu(), &vt)?;
        Ok(GradientState { al, b, w, w_mat })
    }
}

/// `sum(log(diag(Lu))) + (-sum(log(t)) + r.r - be.be + n.log(2pi)) / 2`
pub(crate) fn negative_log_marginal_likelihood<F: Float>(fact: &FactorizationState<F>) -> F {
    let n = F::cast(fact.t().len());
    let log_det_lu = fact.lu().diag().mapv(|v| v.ln()).sum();
    let log_t = fact.t().mapv(|v| v.ln()).sum();
    let r2 = fact.r().dot(fact.r());
    let be2 = fact.be().dot(fact.be());
    let two_pi = F::cast(2. * std::f64::consts::PI);
    log_det_lu + (-log_t + r2 - be2 + n * two_pi.ln()) / F::cast(2.)
}

/// Derivative wrt `log_sigma` of the gaussian likelihood:
/// `sigma^2 (sum(t) - sum(W o W) - al.al)`
pub(crate) fn noise_derivative<F: Float>(
    fact: &FactorizationState<F>,
    grad: &GradientState<F>,
) -> F {
    let sum_w2 = grad.w_mat.mapv(|v| v * v).sum();
    fact.sigma2 * (fact.t().sum() - sum_w2 - grad.al.dot(&grad.al))
}

/// Derivative given the derivatives of the covariance blocks
/// `ddiag` (n,), `dkuu` (m, m) and `dktru` (m, n)
pub(crate) fn covariance_derivative<F: Float>(
    fact: &FactorizationState<F>,
    grad: &GradientState<F>,
    ddiag: &Array1<F>,
    dkuu: &Array2<F>,
    dktru: &Array2<F>,
) -> F {
    let two = F::cast(2.);
    let r = dktru * two - dkuu.dot(&grad.b);
    let v = ddiag - &(&r * &grad.b).sum_axis(Axis(0));

    let term_diag = ddiag.dot(fact.t());
    let term_w = grad
        .w
        .dot(&(dkuu.dot(&grad.w) - dktru.dot(&grad.al) * two));
    let term_v = grad.al.dot(&(&v * &grad.al));
    let term_ww = colsum_sq(&grad.w_mat).dot(&v);
    let term_rb = (r.dot(&grad.w_mat.t()) * grad.b.dot(&grad.w_mat.t())).sum();

    (term_diag + term_w - term_v - term_ww - term_rb) / two
}

/// Derivative wrt a mean function parameter given the mean derivative `dm` (n,)
pub(crate) fn mean_derivative<F: Float>(grad: &GradientState<F>, dm: &Array1<F>) -> F {
    -dm.dot(&grad.al)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factorization::{factorize, CovarianceBlocks};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn scenario(sigma: f64) -> FactorizationState<f64> {
        let blocks = CovarianceBlocks {
            kuu: Array2::eye(2),
            ktru: array![[1., 0., 0.], [0., 1., 0.]],
            ktrtr_diag: array![1., 1., 1.],
        };
        factorize(blocks, array![1., 2., 3.], 1., 1e-10, sigma).unwrap()
    }

    #[test]
    fn test_nlml_scenario() {
        let fact = scenario(1.);
        let expected = 3.5 + 1.5 * (4. * std::f64::consts::PI).ln();
        assert_abs_diff_eq!(negative_log_marginal_likelihood(&fact), expected, epsilon = 1e-8);
        assert_abs_diff_eq!(
            negative_log_marginal_likelihood(&fact),
            7.296536370453936,
            epsilon = 1e-8
        );
    }

    #[test]
    fn test_gradient_scenario() {
        let fact = scenario(1.);
        let grad = GradientState::new(&fact).unwrap();
        assert_abs_diff_eq!(grad.al, array![0.5, 1., 1.5], epsilon = 1e-8);
        assert_abs_diff_eq!(noise_derivative(&fact, &grad), -2., epsilon = 1e-8);

        // log_scale
        let ddiag = fact.blocks.ktrtr_diag.mapv(|v| 2. * v);
        let dkuu = fact.blocks.kuu.mapv(|v| 2. * v);
        let dktru = fact.blocks.ktru.mapv(|v| 2. * v);
        assert_abs_diff_eq!(
            covariance_derivative(&fact, &grad, &ddiag, &dkuu, &dktru),
            -2.,
            epsilon = 1e-8
        );

        // a noise-like covariance derivative gives back the noise derivative
        let ddiag = Array1::from_elem(3, 2.);
        let zeros_uu = Array2::zeros((2, 2));
        let zeros_tru = Array2::zeros((2, 3));
        assert_abs_diff_eq!(
            covariance_derivative(&fact, &grad, &ddiag, &zeros_uu, &zeros_tru),
            noise_derivative(&fact, &grad),
            epsilon = 1e-10
        );

        assert_abs_diff_eq!(mean_derivative(&grad, &Array1::ones(3)), -3., epsilon = 1e-8);
    }
}
