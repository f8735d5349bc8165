use crate::errors::{FitcError, Result};
use crate::factorization::{factorize, CovarianceBlocks, FactorizationState};
use crate::kernels::CovarianceProvider;
use crate::labels::{LabelType, Labels};
use crate::likelihood::{GaussianLikelihood, LikelihoodModel, LikelihoodType};
use crate::marginal::{
    covariance_derivative, mean_derivative, negative_log_marginal_likelihood, noise_derivative,
    GradientState,
};
use crate::mean_models::MeanFunction;
use crate::parameters::{FitcValidParams, Inducings, DEFAULT_INDUCING_NOISE};
use crate::posterior::{posterior_covariance, posterior_mean, posterior_weights};

use linfa::prelude::{DatasetBase, Fit, Float};
use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Ix1, Ix2, Zip};
use ndarray_rand::rand::seq::SliceRandom;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use log::{debug, trace, warn};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Name used for errors on inference parameters
const FITC_INFERENCE: &str = "FitcInference";

/// Freshness of the cached computations
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum InferenceState {
    /// Parameters or data changed since the last update
    #[default]
    Dirty,
    /// Factorization and posterior weights are up to date, gradient quantities are not
    GradientDirty,
    /// Everything is up to date
    Clean,
}

/// Kind of inference
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum InferenceType {
    /// FITC approximation with gaussian likelihood
    FitcRegression,
}

/// Results of the last successful update
#[derive(Clone, Debug)]
struct Snapshot<F: Float> {
    factorization: FactorizationState<F>,
    alpha: Array1<F>,
}

/// Sparse gaussian process inference using the Fully Independent Training Conditional
/// approximation.
///
/// Given `n` training points `X` with regression labels `y`, and `m` inducing points `Z`,
/// the prior covariance of the noisy outputs is approximated by
///
/// `Qnn + diag(Knn - Qnn) + sigma^2 I` with `Qnn = Knm (Kmm + noise.I)^-1 Kmn`
///
/// which leads to `O(m^2 n)` training cost instead of `O(n^3)`. Kernel matrices are scaled by
/// `exp(2 * log_scale)`, `noise` is `exp(log_inducing_noise)` and `sigma` comes from the
/// [`GaussianLikelihood`].
///
/// Computations are done lazily: any parameter or data change marks the inference as
/// [`InferenceState::Dirty`], the next query refactorizes, then gradient quantities are
/// rebuilt once and reused by all likelihood and derivative queries until the next change.
///
/// # Example
///
/// ```
/// use fitc_gp::correlation_models::SquaredExponentialCorr;
/// use fitc_gp::kernels::StationaryKernel;
/// use fitc_gp::mean_models::ZeroMean;
/// use fitc_gp::{FitcInference, GaussianLikelihood, Labels};
/// use ndarray::array;
/// use std::sync::Arc;
///
/// let xt = array![[0f64], [0.5], [1.], [1.5], [2.]];
/// let yt = array![0., 0.48, 0.84, 1.0, 0.91];
/// let z = array![[0.], [1.], [2.]];
///
/// let mut fitc = FitcInference::new(
///     StationaryKernel::new(SquaredExponentialCorr(), array![1.]),
///     ZeroMean(),
///     Box::new(GaussianLikelihood::new(0.1).unwrap()),
///     Labels::Regression(yt),
///     Arc::new(xt),
///     Arc::new(z),
/// )
/// .expect("FITC inference");
///
/// let nlml = fitc.negative_log_marginal_likelihood().expect("likelihood");
/// let dsigma = fitc.derivative_wrt_likelihood_parameter("log_sigma").expect("derivative");
/// let pred = fitc.predict(&array![[0.25], [1.25]]).expect("prediction");
/// assert!(nlml.is_finite() && dsigma.is_finite());
/// assert_eq!(pred.len(), 2);
/// ```
pub struct FitcInference<F: Float, K: CovarianceProvider<F>, M: MeanFunction<F>> {
    kernel: K,
    mean: M,
    likelihood: GaussianLikelihood<F>,
    labels: Labels<F>,
    /// Training inputs (n, nx)
    features: Arc<Array2<F>>,
    /// Inducing points (m, nx)
    inducing: Arc<Array2<F>>,
    log_scale: F,
    log_inducing_noise: F,
    state: InferenceState,
    snapshot: Option<Snapshot<F>>,
    gradient: Option<GradientState<F>>,
}

impl<F: Float, K: CovarianceProvider<F>, M: MeanFunction<F>> fmt::Display
    for FitcInference<F, K, M>
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "FITC(kernel={}, mean={}, sigma={}, log_scale={}, n={}, m={})",
            self.kernel.name(),
            self.mean,
            self.likelihood.sigma(),
            self.log_scale,
            self.features.nrows(),
            self.inducing.nrows()
        )
    }
}

impl<F: Float, K: CovarianceProvider<F>, M: MeanFunction<F>> FitcInference<F, K, M> {
    /// Constructor
    ///
    /// Fails when the likelihood is not a gaussian one, labels are not regression labels
    /// or data sizes are inconsistent.
    pub fn new(
        kernel: K,
        mean: M,
        likelihood: Box<dyn LikelihoodModel<F>>,
        labels: Labels<F>,
        features: Arc<Array2<F>>,
        inducing: Arc<Array2<F>>,
    ) -> Result<Self> {
        let likelihood = check_likelihood(&*likelihood)?;
        check_members(&labels, &features, &inducing)?;
        check_models(&kernel, &mean, features.ncols())?;
        Ok(FitcInference {
            kernel,
            mean,
            likelihood,
            labels,
            features,
            inducing,
            log_scale: F::zero(),
            log_inducing_noise: F::cast(DEFAULT_INDUCING_NOISE).ln(),
            state: InferenceState::Dirty,
            snapshot: None,
            gradient: None,
        })
    }

    /// Kind of inference
    pub fn inference_type(&self) -> InferenceType {
        InferenceType::FitcRegression
    }

    /// Current state of cached computations
    pub fn state(&self) -> InferenceState {
        self.state
    }

    /// Covariance provider
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Mutable access to the covariance provider, marks the inference as dirty
    pub fn kernel_mut(&mut self) -> &mut K {
        self.mark_dirty();
        &mut self.kernel
    }

    /// Set covariance provider
    pub fn set_kernel(&mut self, kernel: K) {
        self.kernel = kernel;
        self.mark_dirty();
    }

    /// Prior mean function
    pub fn mean(&self) -> &M {
        &self.mean
    }

    /// Mutable access to the mean function, marks the inference as dirty
    pub fn mean_mut(&mut self) -> &mut M {
        self.mark_dirty();
        &mut self.mean
    }

    /// Set prior mean function
    pub fn set_mean(&mut self, mean: M) {
        self.mean = mean;
        self.mark_dirty();
    }

    /// Gaussian likelihood
    pub fn likelihood(&self) -> &GaussianLikelihood<F> {
        &self.likelihood
    }

    /// Replace the likelihood model, fails if not gaussian
    pub fn set_likelihood(&mut self, likelihood: Box<dyn LikelihoodModel<F>>) -> Result<()> {
        self.likelihood = check_likelihood(&*likelihood)?;
        self.mark_dirty();
        Ok(())
    }

    /// Gaussian noise standard deviation
    pub fn sigma(&self) -> F {
        self.likelihood.sigma()
    }

    /// Set gaussian noise standard deviation
    pub fn set_sigma(&mut self, sigma: F) -> Result<()> {
        self.likelihood.set_sigma(sigma)?;
        self.mark_dirty();
        Ok(())
    }

    /// Set log of the gaussian noise standard deviation
    pub fn set_log_sigma(&mut self, log_sigma: F) -> Result<()> {
        self.likelihood.set_log_sigma(log_sigma)?;
        self.mark_dirty();
        Ok(())
    }

    /// Log of the kernel scale
    pub fn log_scale(&self) -> F {
        self.log_scale
    }

    /// Set log of the kernel scale, kernel matrices are multiplied by `exp(2 * log_scale)`
    pub fn set_log_scale(&mut self, log_scale: F) -> Result<()> {
        check_finite("log_scale", log_scale)?;
        self.log_scale = log_scale;
        self.mark_dirty();
        Ok(())
    }

    /// Log of the noise added to the inducing covariance diagonal
    pub fn log_inducing_noise(&self) -> F {
        self.log_inducing_noise
    }

    /// Set log of the noise added to the inducing covariance diagonal
    pub fn set_log_inducing_noise(&mut self, log_inducing_noise: F) -> Result<()> {
        check_finite("log_inducing_noise", log_inducing_noise)?;
        self.log_inducing_noise = log_inducing_noise;
        self.mark_dirty();
        Ok(())
    }

    /// Training labels
    pub fn labels(&self) -> &Labels<F> {
        &self.labels
    }

    /// Set training labels, should match the number of training points
    pub fn set_labels(&mut self, labels: Labels<F>) -> Result<()> {
        check_members(&labels, &self.features, &self.inducing)?;
        self.labels = labels;
        self.mark_dirty();
        Ok(())
    }

    /// Training inputs
    pub fn features(&self) -> &Arc<Array2<F>> {
        &self.features
    }

    /// Set training inputs and labels
    pub fn set_data(&mut self, features: Arc<Array2<F>>, labels: Labels<F>) -> Result<()> {
        check_members(&labels, &features, &self.inducing)?;
        self.features = features;
        self.labels = labels;
        self.mark_dirty();
        Ok(())
    }

    /// Inducing points
    pub fn inducing(&self) -> &Arc<Array2<F>> {
        &self.inducing
    }

    /// Set inducing points
    pub fn set_inducing(&mut self, inducing: Arc<Array2<F>>) -> Result<()> {
        check_members(&self.labels, &self.features, &inducing)?;
        self.inducing = inducing;
        self.mark_dirty();
        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.state = InferenceState::Dirty;
        self.gradient = None;
    }

    fn scale(&self) -> F {
        (F::cast(2.) * self.log_scale).exp()
    }

    fn covariance_blocks(&self) -> CovarianceBlocks<F> {
        let z = self.inducing.view();
        let x = self.features.view();
        CovarianceBlocks {
            kuu: self.kernel.kernel_matrix(z, z),
            ktru: self.kernel.kernel_matrix(z, x),
            ktrtr_diag: self.kernel.kernel_diagonal(x),
        }
    }

    /// Fetches covariance blocks, factorizes and computes posterior weights.
    ///
    /// On failure the last successful factorization is kept and the inference stays dirty.
    pub fn update(&mut self) -> Result<()> {
        trace!("FITC update: start");
        let now = Instant::now();
        self.mark_dirty();

        check_models(&self.kernel, &self.mean, self.features.ncols())?;
        let blocks = self.covariance_blocks();
        let residual = self.labels.values() - &self.mean.mean_vector(self.features.view());
        let factorization = factorize(
            blocks,
            residual,
            self.scale(),
            self.log_inducing_noise.exp(),
            self.likelihood.sigma(),
        )?;
        let alpha = posterior_weights(&factorization)?;
        self.snapshot = Some(Snapshot {
            factorization,
            alpha,
        });
        self.state = InferenceState::GradientDirty;

        debug!(
            "FITC factorization (n={}, m={}) elapsed time: {:?}",
            self.features.nrows(),
            self.inducing.nrows(),
            now.elapsed()
        );
        trace!("FITC update: end");
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        if self.state == InferenceState::Dirty {
            self.update()?;
        }
        if self.state == InferenceState::GradientDirty {
            let snapshot = self.snapshot.as_ref().ok_or_else(not_computed)?;
            self.gradient = Some(GradientState::new(&snapshot.factorization)?);
            self.state = InferenceState::Clean;
        }
        Ok(())
    }

    fn cached(&self) -> Result<(&Snapshot<F>, &GradientState<F>)> {
        match (&self.snapshot, &self.gradient) {
            (Some(snapshot), Some(gradient)) => Ok((snapshot, gradient)),
            _ => Err(not_computed()),
        }
    }

    /// Negative log marginal likelihood of the training labels under the FITC prior
    pub fn negative_log_marginal_likelihood(&mut self) -> Result<F> {
        self.refresh()?;
        let (snapshot, _) = self.cached()?;
        Ok(negative_log_marginal_likelihood(&snapshot.factorization))
    }

    /// Derivative of the negative log marginal likelihood wrt a likelihood parameter.
    ///
    /// Only `log_sigma` is supported.
    pub fn derivative_wrt_likelihood_parameter(&mut self, param: &str) -> Result<F> {
        if param != GaussianLikelihood::<F>::LOG_SIGMA {
            return Err(FitcError::unsupported_parameter(
                &LikelihoodModel::<F>::name(&self.likelihood),
                param,
            ));
        }
        self.refresh()?;
        let (snapshot, gradient) = self.cached()?;
        Ok(noise_derivative(&snapshot.factorization, gradient))
    }

    /// Derivative of the negative log marginal likelihood wrt an inference parameter,
    /// either `log_scale` or `log_inducing_noise`.
    pub fn derivative_wrt_inference_parameter(&mut self, param: &str) -> Result<F> {
        if param != "log_scale" && param != "log_inducing_noise" {
            return Err(FitcError::unsupported_parameter(FITC_INFERENCE, param));
        }
        self.refresh()?;
        let (snapshot, gradient) = self.cached()?;
        let fact = &snapshot.factorization;
        let blocks = fact.blocks();
        let (ddiag, dkuu, dktru) = if param == "log_scale" {
            let two_scale = F::cast(2.) * fact.scale;
            (
                blocks.ktrtr_diag.mapv(|v| v * two_scale),
                blocks.kuu.mapv(|v| v * two_scale),
                blocks.ktru.mapv(|v| v * two_scale),
            )
        } else {
            let (m, n) = (blocks.n_inducing(), blocks.n_training());
            (
                Array1::zeros(n),
                Array2::eye(m) * fact.inducing_noise,
                Array2::zeros((m, n)),
            )
        };
        Ok(covariance_derivative(fact, gradient, &ddiag, &dkuu, &dktru))
    }

    /// Derivative of the negative log marginal likelihood wrt a parameter of the covariance provider
    pub fn derivative_wrt_kernel_parameter(&mut self, param: &str) -> Result<F> {
        self.refresh()?;
        let (snapshot, gradient) = self.cached()?;
        let fact = &snapshot.factorization;
        let z = self.inducing.view();
        let x = self.features.view();
        let ddiag = self.kernel.kernel_diagonal_derivative(param, x)? * fact.scale;
        let dkuu = self.kernel.kernel_matrix_derivative(param, z, z)? * fact.scale;
        let dktru = self.kernel.kernel_matrix_derivative(param, z, x)? * fact.scale;
        Ok(covariance_derivative(fact, gradient, &ddiag, &dkuu, &dktru))
    }

    /// Derivative of the negative log marginal likelihood wrt a parameter of the mean function
    pub fn derivative_wrt_mean_parameter(&mut self, param: &str) -> Result<F> {
        self.refresh()?;
        let (_, gradient) = self.cached()?;
        let dm = self.mean.parameter_gradient(param, self.features.view())?;
        Ok(mean_derivative(gradient, &dm))
    }

    /// Posterior mean at training points `scale * Ktru^T alpha`, a (n,) vector
    pub fn posterior_mean(&mut self) -> Result<Array1<F>> {
        self.refresh()?;
        let (snapshot, _) = self.cached()?;
        Ok(posterior_mean(&snapshot.factorization, &snapshot.alpha))
    }

    /// Posterior covariance at training points, a dense (n, n) matrix.
    ///
    /// **Warning**: this costs `O(m n^2)` in time and `O(n^2)` in memory.
    pub fn posterior_covariance(&mut self) -> Result<Array2<F>> {
        self.refresh()?;
        let (snapshot, _) = self.cached()?;
        posterior_covariance(&snapshot.factorization)
    }

    /// Diagonal vector `1/sigma` for each training point. Does not trigger any computation.
    pub fn diagonal_vector(&self) -> Array1<F> {
        Array1::from_elem(self.labels.len(), F::one() / self.likelihood.sigma())
    }

    /// Posterior weights `alpha` such that the predicted mean is `scale * K(x, Z) alpha + m(x)`
    pub fn posterior_weights(&mut self) -> Result<Array1<F>> {
        self.refresh()?;
        let (snapshot, _) = self.cached()?;
        Ok(snapshot.alpha.to_owned())
    }

    /// Factorization of the last successful update if any. Does not trigger any computation.
    pub fn factorization(&self) -> Option<&FactorizationState<F>> {
        self.snapshot.as_ref().map(|s| &s.factorization)
    }

    /// Minimizers are not supported, gradients have to be consumed by the caller
    pub fn register_minimizer<T>(&mut self, _minimizer: T) {
        warn!("FITC inference does not support minimizer registration, call ignored");
    }

    fn check_inputs(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
        if x.ncols() != self.inducing.ncols() {
            return Err(FitcError::DimensionMismatch(format!(
                "points of dimension {} expected, got {}",
                self.inducing.ncols(),
                x.ncols()
            )));
        }
        Ok(())
    }

    /// Predict mean values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n predicted values.
    pub fn predict(&mut self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.check_inputs(x)?;
        self.refresh()?;
        let (snapshot, _) = self.cached()?;
        let kx = self.kernel.kernel_matrix(x.view(), self.inducing.view());
        let mu = kx.dot(&snapshot.alpha) * snapshot.factorization.scale;
        Ok(mu + self.mean.mean_vector(x.view()))
    }

    /// Predict variance values of the noisy outputs at n given `x` points of nx components
    /// specified as a (n, nx) matrix. Returns n variance values.
    pub fn predict_var(&mut self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.check_inputs(x)?;
        self.refresh()?;
        let (snapshot, _) = self.cached()?;
        let fact = &snapshot.factorization;
        let ks = self.kernel.kernel_matrix(self.inducing.view(), x.view()) * fact.scale;
        let lks = fact.l().dot(&ks);
        let mut var = self.kernel.kernel_diagonal(x.view()) * fact.scale;
        Zip::from(&mut var)
            .and(&(&ks * &lks).sum_axis(Axis(0)))
            .for_each(|v, q| *v += *q);
        // Check for negative variance due to round off
        let eps = F::cast(1e-15);
        let sigma2 = fact.sigma2;
        Ok(var.mapv(|v| if v < eps { eps + sigma2 } else { v + sigma2 }))
    }
}

fn not_computed() -> FitcError {
    FitcError::InvalidValueError("FITC inference state is not computed".to_string())
}

fn check_finite<F: Float>(name: &str, value: F) -> Result<()> {
    if !value.is_finite() {
        return Err(FitcError::InvalidValueError(format!(
            "`{name}` should be finite, got {value}"
        )));
    }
    Ok(())
}

fn check_likelihood<F: Float>(likelihood: &dyn LikelihoodModel<F>) -> Result<GaussianLikelihood<F>> {
    if likelihood.model_type() != LikelihoodType::Gaussian {
        return Err(FitcError::UnsupportedLikelihood(likelihood.name()));
    }
    likelihood
        .as_gaussian()
        .cloned()
        .ok_or_else(|| FitcError::UnsupportedLikelihood(likelihood.name()))
}

fn check_members<F: Float>(labels: &Labels<F>, features: &Array2<F>, inducing: &Array2<F>) -> Result<()> {
    if labels.label_type() != LabelType::Regression {
        return Err(FitcError::UnsupportedLabels(labels.label_type().to_string()));
    }
    if features.nrows() == 0 || inducing.nrows() == 0 {
        return Err(FitcError::InvalidValueError(format!(
            "training and inducing points cannot be empty, got {} and {}",
            features.nrows(),
            inducing.nrows()
        )));
    }
    if labels.len() != features.nrows() {
        return Err(FitcError::DimensionMismatch(format!(
            "{} labels for {} training points",
            labels.len(),
            features.nrows()
        )));
    }
    if inducing.ncols() != features.ncols() {
        return Err(FitcError::DimensionMismatch(format!(
            "inducing points of dimension {} for training points of dimension {}",
            inducing.ncols(),
            features.ncols()
        )));
    }
    Ok(())
}

fn check_models<F: Float>(
    kernel: &impl CovarianceProvider<F>,
    mean: &impl MeanFunction<F>,
    nx: usize,
) -> Result<()> {
    kernel.check_input_dim(nx)?;
    mean.check_input_dim(nx)
}

impl<F, K, M, D> Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, FitcError> for FitcValidParams<F, K, M>
where
    F: Float,
    K: CovarianceProvider<F> + Clone,
    M: MeanFunction<F>,
    D: Data<Elem = F>,
{
    type Object = FitcInference<F, K, M>;

    /// Build the FITC inference on the given dataset and run a first update
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let x = dataset.records();
        let y = dataset.targets();

        let mut rng = match self.seed() {
            Some(seed) => Xoshiro256Plus::seed_from_u64(*seed),
            None => Xoshiro256Plus::from_entropy(),
        };
        let z = match self.inducings() {
            Inducings::Randomized(n) => make_inducings(*n, &x.view(), &mut rng),
            Inducings::Located(z) => z.to_owned(),
        };

        let mut inference = FitcInference::new(
            self.kernel().clone(),
            self.mean().clone(),
            Box::new(GaussianLikelihood::new(self.noise_sigma())?),
            Labels::Regression(y.to_owned()),
            Arc::new(x.to_owned()),
            Arc::new(z),
        )?;
        inference.set_log_scale(self.log_scale())?;
        inference.set_log_inducing_noise(self.log_inducing_noise())?;
        inference.update()?;
        Ok(inference)
    }
}

/// Picks `n_inducing` distinct training points at random
fn make_inducings<F: Float>(
    n_inducing: usize,
    xt: &ArrayView2<F>,
    rng: &mut Xoshiro256Plus,
) -> Array2<F> {
    let mut indices = (0..xt.nrows()).collect::<Vec<_>>();
    indices.shuffle(rng);
    let n = n_inducing.min(xt.nrows());
    let mut z = Array2::zeros((n, xt.ncols()));
    let idx = indices[..n].to_vec();
    Zip::from(z.rows_mut())
        .and(&Array1::from_vec(idx))
        .for_each(|mut zi, i| zi.assign(&xt.row(*i)));
    z
}
