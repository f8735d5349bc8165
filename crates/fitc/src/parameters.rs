use crate::errors::{FitcError, Result};
use crate::kernels::CovarianceProvider;
use crate::mean_models::MeanFunction;
use linfa::{Float, ParamGuard};
use ndarray::Array2;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Default inducing noise added to the diagonal of the inducing covariance
pub const DEFAULT_INDUCING_NOISE: f64 = 1e-10;

/// FITC inducing points specification
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum Inducings<F: Float> {
    /// `usize` points are selected randomly in the training dataset
    Randomized(usize),
    /// Points are given as a (npoints, nx) matrix
    Located(Array2<F>),
}

impl<F: Float> Default for Inducings<F> {
    fn default() -> Inducings<F> {
        Self::Randomized(10)
    }
}

/// A set of validated FITC parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, K: Serialize, M: Serialize",
        deserialize = "F: Deserialize<'de>, K: Deserialize<'de>, M: Deserialize<'de>"
    ))
)]
pub struct FitcValidParams<F: Float, K: CovarianceProvider<F>, M: MeanFunction<F>> {
    /// Covariance provider k(x, x')
    pub(crate) kernel: K,
    /// Prior mean function m(x)
    pub(crate) mean: M,
    /// Log of the kernel scale, kernel matrices are multiplied by exp(2 * log_scale)
    pub(crate) log_scale: F,
    /// Log of the noise added to the inducing covariance diagonal
    pub(crate) log_inducing_noise: F,
    /// Gaussian noise standard deviation
    pub(crate) noise_sigma: F,
    /// Inducing points
    pub(crate) z: Inducings<F>,
    /// Random generator seed
    pub(crate) seed: Option<u64>,
}

impl<F: Float, K: CovarianceProvider<F>, M: MeanFunction<F>> FitcValidParams<F, K, M> {
    /// Get covariance provider
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Get mean function
    pub fn mean(&self) -> &M {
        &self.mean
    }

    /// Get log kernel scale
    pub fn log_scale(&self) -> F {
        self.log_scale
    }

    /// Get log inducing noise
    pub fn log_inducing_noise(&self) -> F {
        self.log_inducing_noise
    }

    /// Get gaussian noise standard deviation
    pub fn noise_sigma(&self) -> F {
        self.noise_sigma
    }

    /// Get inducing points
    pub fn inducings(&self) -> &Inducings<F> {
        &self.z
    }

    /// Get seed
    pub fn seed(&self) -> Option<&u64> {
        self.seed.as_ref()
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the execution of
/// the [FITC inference](crate::FitcInference).
pub struct FitcParams<F: Float, K: CovarianceProvider<F>, M: MeanFunction<F>>(
    FitcValidParams<F, K, M>,
);

impl<F: Float, K: CovarianceProvider<F>, M: MeanFunction<F>> FitcParams<F, K, M> {
    /// A constructor for FITC parameters given kernel, mean and inducing points specification
    pub fn new(kernel: K, mean: M, inducings: Inducings<F>) -> FitcParams<F, K, M> {
        Self(FitcValidParams {
            kernel,
            mean,
            log_scale: F::zero(),
            log_inducing_noise: F::cast(DEFAULT_INDUCING_NOISE).ln(),
            noise_sigma: F::one(),
            z: inducings,
            seed: None,
        })
    }

    /// A constructor for FITC parameters from validated parameters
    pub fn new_from_valid(params: &FitcValidParams<F, K, M>) -> Self
    where
        K: Clone,
        M: Clone,
    {
        Self(params.clone())
    }

    /// Set covariance provider
    pub fn kernel(mut self, kernel: K) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set mean function
    pub fn mean(mut self, mean: M) -> Self {
        self.0.mean = mean;
        self
    }

    /// Set log kernel scale
    pub fn log_scale(mut self, log_scale: F) -> Self {
        self.0.log_scale = log_scale;
        self
    }

    /// Set log inducing noise
    pub fn log_inducing_noise(mut self, log_inducing_noise: F) -> Self {
        self.0.log_inducing_noise = log_inducing_noise;
        self
    }

    /// Set gaussian noise standard deviation
    pub fn noise_sigma(mut self, sigma: F) -> Self {
        self.0.noise_sigma = sigma;
        self
    }

    /// Specify nz inducing points as (nz, x_dim) matrix.
    pub fn inducings(mut self, z: Array2<F>) -> Self {
        self.0.z = Inducings::Located(z);
        self
    }

    /// Specify nz number of inducing points which will be picked randomly in the input training dataset.
    pub fn n_inducings(mut self, nz: usize) -> Self {
        self.0.z = Inducings::Randomized(nz);
        self
    }

    /// Set random generator seed used to pick inducing points
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.0.seed = seed;
        self
    }
}

impl<F: Float, K: CovarianceProvider<F>, M: MeanFunction<F>> From<FitcValidParams<F, K, M>>
    for FitcParams<F, K, M>
{
    fn from(valid: FitcValidParams<F, K, M>) -> Self {
        FitcParams(valid)
    }
}

impl<F: Float, K: CovarianceProvider<F>, M: MeanFunction<F>> ParamGuard for FitcParams<F, K, M> {
    type Checked = FitcValidParams<F, K, M>;
    type Error = FitcError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if !self.0.log_scale.is_finite() {
            return Err(FitcError::InvalidValueError(format!(
                "`log_scale` should be finite, got {}",
                self.0.log_scale
            )));
        }
        if !self.0.log_inducing_noise.is_finite() {
            return Err(FitcError::InvalidValueError(format!(
                "`log_inducing_noise` should be finite, got {}",
                self.0.log_inducing_noise
            )));
        }
        if !(self.0.noise_sigma > F::zero()) || !self.0.noise_sigma.is_finite() {
            return Err(FitcError::InvalidValueError(format!(
                "`noise_sigma` should be positive, got {}",
                self.0.noise_sigma
            )));
        }
        match &self.0.z {
            Inducings::Randomized(0) => {
                return Err(FitcError::InvalidValueError(
                    "number of inducing points cannot be 0!".to_string(),
                ))
            }
            Inducings::Located(z) if z.nrows() == 0 => {
                return Err(FitcError::InvalidValueError(
                    "inducing points cannot be empty!".to_string(),
                ))
            }
            _ => (),
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
