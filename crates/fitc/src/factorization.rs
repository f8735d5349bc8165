//! FITC factorization of the low-rank plus diagonal training covariance
//!
//! With `Q = Ktru^T (Kuu + noise.I)^-1 Ktru` the Nystrom approximation of the training
//! covariance, FITC approximates the prior covariance of the noisy outputs by
//! `Q + diag(Ktrtr - Q) + sigma^2.I`. Everything here works on `m x n` quantities
//! where `m` is the number of inducing points, `n` the number of training points.

use crate::errors::{FitcError, Result};
use crate::utils::{cholesky_inverse, cholesky_upper, colsum_sq, solve_upper_t, solve_upper_t_vec};
use linfa::Float;
use ndarray::{Array1, Array2, Axis};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Covariance blocks fetched from the covariance provider at each update
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct CovarianceBlocks<F: Float> {
    /// Inducing covariance (m, m)
    pub kuu: Array2<F>,
    /// Inducing vs training covariance (m, n)
    pub ktru: Array2<F>,
    /// Diagonal of the training covariance (n,)
    pub ktrtr_diag: Array1<F>,
}

impl<F: Float> CovarianceBlocks<F> {
    /// Number of inducing points
    pub fn n_inducing(&self) -> usize {
        self.kuu.nrows()
    }

    /// Number of training points
    pub fn n_training(&self) -> usize {
        self.ktrtr_diag.len()
    }

    fn check_shapes(&self) -> Result<()> {
        let (m, n) = (self.n_inducing(), self.n_training());
        if self.kuu.ncols() != m || self.ktru.dim() != (m, n) {
            return Err(FitcError::DimensionMismatch(format!(
                "covariance blocks: Kuu {:?}, Ktru {:?}, diag(Ktrtr) ({},)",
                self.kuu.dim(),
                self.ktru.dim(),
                n
            )));
        }
        Ok(())
    }
}

/// Factorization results of the last successful update
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct FactorizationState<F: Float> {
    pub(crate) blocks: CovarianceBlocks<F>,
    /// y - m(x)
    pub(crate) residual: Array1<F>,
    pub(crate) scale: F,
    pub(crate) inducing_noise: F,
    pub(crate) sigma2: F,
    luu: Array2<F>,
    v: Array2<F>,
    t: Array1<F>,
    lu: Array2<F>,
    be: Array1<F>,
    r: Array1<F>,
    l: Array2<F>,
    /// (Kuu.scale + noise.I)^-1
    ikuu: Array2<F>,
}

impl<F: Float> FactorizationState<F> {
    /// Upper Cholesky factor of `Kuu.scale + noise.I`
    pub fn luu(&self) -> &Array2<F> {
        &self.luu
    }

    /// `Luu^-T Ktru.scale`, a (m, n) matrix
    pub fn v(&self) -> &Array2<F> {
        &self.v
    }

    /// Inverse of the corrected training variances
    pub fn t(&self) -> &Array1<F> {
        &self.t
    }

    /// Upper Cholesky factor of `V diag(t) V^T + I`
    pub fn lu(&self) -> &Array2<F> {
        &self.lu
    }

    /// `Lu^-T V (r o sqrt(t))`
    pub fn be(&self) -> &Array1<F> {
        &self.be
    }

    /// `(y - m) o sqrt(t)`
    pub fn r(&self) -> &Array1<F> {
        &self.r
    }

    /// `(Lu Luu)^-1 (Lu Luu)^-T - (Kuu.scale + noise.I)^-1`
    pub fn l(&self) -> &Array2<F> {
        &self.l
    }

    /// Covariance blocks used by the factorization
    pub fn blocks(&self) -> &CovarianceBlocks<F> {
        &self.blocks
    }

    pub(crate) fn ikuu(&self) -> &Array2<F> {
        &self.ikuu
    }
}

/// Factorizes the FITC approximated covariance given the covariance `blocks`,
/// the centered labels `residual = y - m(x)`, the kernel `scale`, the inducing
/// `inducing_noise` and the gaussian noise standard deviation `sigma`.
pub(crate) fn factorize<F: Float>(
    blocks: CovarianceBlocks<F>,
    residual: Array1<F>,
    scale: F,
    inducing_noise: F,
    sigma: F,
) -> Result<FactorizationState<F>> {
    blocks.check_shapes()?;
    let (m, n) = (blocks.n_inducing(), blocks.n_training());
    if residual.len() != n {
        return Err(FitcError::DimensionMismatch(format!(
            "{} labels for {} training points",
            residual.len(),
            n
        )));
    }
    let sigma2 = sigma * sigma;

    let kuu = blocks.kuu.mapv(|v| v * scale) + Array2::<F>::eye(m) * inducing_noise;
    let luu = cholesky_upper(&kuu, "inducing covariance")?;

    let v = solve_upper_t(&luu, &blocks.ktru.mapv(|v| v * scale))?;

    let denom = blocks.ktrtr_diag.mapv(|v| v * scale) + sigma2 - colsum_sq(&v);
    if let Some((index, value)) = denom
        .iter()
        .enumerate()
        .find(|(_, value)| !(**value > F::zero()))
    {
        return Err(FitcError::NonPositiveDiagonal {
            index,
            value: value.to_f64().unwrap_or(f64::NAN),
        });
    }
    let t = denom.mapv(|v| F::one() / v);
    let sqrt_t = t.mapv(|v| v.sqrt());

    let vt = &v * &t.view().insert_axis(Axis(0));
    let a = vt.dot(&v.t()) + Array2::<F>::eye(m);
    let lu = cholesky_upper(&a, "low-rank updated covariance")?;

    let r = &residual * &sqrt_t;
    let be = solve_upper_t_vec(&lu, &v.dot(&(&r * &sqrt_t)))?;

    let ikuu = cholesky_inverse(&luu)?;
    let l = cholesky_inverse(&lu.dot(&luu))? - &ikuu;

    Ok(FactorizationState {
        blocks,
        residual,
        scale,
        inducing_noise,
        sigma2,
        luu,
        v,
        t,
        lu,
        be,
        r,
        l,
        ikuu,
    })
}
