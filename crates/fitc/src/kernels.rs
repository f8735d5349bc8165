//! Covariance providers feeding the FITC factorization with inducing and training covariances.
//!
//! Kernel evaluation is a collaborator of the inference: any type implementing
//! [`CovarianceProvider`] can be used. [`StationaryKernel`] is the reference
//! implementation built on [correlation models](crate::correlation_models).

use crate::correlation_models::{isotropic_derivative, CorrelationModel};
use crate::errors::{FitcError, Result};
use crate::utils::differences;
use linfa::Float;
use ndarray::{Array1, Array2, ArrayView2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trait for kernels computing covariance matrices between sets of points
/// given as (n, nx) matrices.
pub trait CovarianceProvider<F: Float> {
    /// Name used in error messages
    fn name(&self) -> String {
        "kernel".to_string()
    }

    /// Covariance matrix k(a, b) as a (na, nb) matrix
    fn kernel_matrix(&self, a: ArrayView2<F>, b: ArrayView2<F>) -> Array2<F>;

    /// Diagonal of k(a, a) as a (na,) vector
    fn kernel_diagonal(&self, a: ArrayView2<F>) -> Array1<F>;

    /// Checks the kernel can be evaluated on points of dimension `nx`
    fn check_input_dim(&self, _nx: usize) -> Result<()> {
        Ok(())
    }

    /// Derivative of k(a, b) wrt the kernel parameter named `param`
    fn kernel_matrix_derivative(
        &self,
        param: &str,
        _a: ArrayView2<F>,
        _b: ArrayView2<F>,
    ) -> Result<Array2<F>> {
        Err(FitcError::unsupported_parameter(&self.name(), param))
    }

    /// Derivative of the diagonal of k(a, a) wrt the kernel parameter named `param`
    fn kernel_diagonal_derivative(&self, param: &str, _a: ArrayView2<F>) -> Result<Array1<F>> {
        Err(FitcError::unsupported_parameter(&self.name(), param))
    }
}

/// A stationary kernel `k(x, x') = r(x - x')` with unit diagonal given by a correlation model.
///
/// `theta` either holds one component (isotropic kernel) or one component per input dimension.
/// Derivatives are available wrt parameters named `theta_0`, `theta_1`, ...
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, Corr: Serialize",
        deserialize = "F: Deserialize<'de>, Corr: Deserialize<'de>"
    ))
)]
pub struct StationaryKernel<F: Float, Corr: CorrelationModel<F>> {
    corr: Corr,
    theta: Array1<F>,
}

impl<F: Float, Corr: CorrelationModel<F>> StationaryKernel<F, Corr> {
    /// Constructor given the correlation model and its theta parameters
    pub fn new(corr: Corr, theta: Array1<F>) -> Self {
        StationaryKernel { corr, theta }
    }

    /// Correlation model
    pub fn corr(&self) -> &Corr {
        &self.corr
    }

    /// Theta parameters
    pub fn theta(&self) -> &Array1<F> {
        &self.theta
    }

    /// Set theta parameters
    pub fn set_theta(&mut self, theta: Array1<F>) {
        self.theta = theta;
    }

    /// Panics if theta is neither 1-dim nor of dimension `nx`,
    /// see [`CovarianceProvider::check_input_dim`]
    fn expanded_theta(&self, nx: usize) -> Array1<F> {
        if self.theta.len() == 1 {
            Array1::from_elem(nx, self.theta[0])
        } else {
            assert!(
                self.theta.len() == nx,
                "theta should be either 1-dim or of input dimension {nx}, got {}",
                self.theta.len()
            );
            self.theta.to_owned()
        }
    }

    fn theta_index(&self, param: &str) -> Result<usize> {
        param
            .strip_prefix("theta_")
            .and_then(|idx| idx.parse::<usize>().ok())
            .filter(|idx| *idx < self.theta.len())
            .ok_or_else(|| FitcError::unsupported_parameter(&self.name(), param))
    }
}

impl<F: Float, Corr: CorrelationModel<F>> fmt::Display for StationaryKernel<F, Corr> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(theta={})", self.corr, self.theta)
    }
}

impl<F: Float, Corr: CorrelationModel<F>> CovarianceProvider<F> for StationaryKernel<F, Corr> {
    fn name(&self) -> String {
        format!("{}Kernel", self.corr)
    }

    fn kernel_matrix(&self, a: ArrayView2<F>, b: ArrayView2<F>) -> Array2<F> {
        let theta = self.expanded_theta(a.ncols());
        let mut k = Array2::zeros((a.nrows(), b.nrows()));
        Zip::from(k.rows_mut())
            .and(a.rows())
            .par_for_each(|mut k_i, a_i| {
                let d = differences(&a_i, &b);
                k_i.assign(&self.corr.value(&d, &theta));
            });
        k
    }

    fn kernel_diagonal(&self, a: ArrayView2<F>) -> Array1<F> {
        Array1::ones(a.nrows())
    }

    fn check_input_dim(&self, nx: usize) -> Result<()> {
        if self.theta.len() != 1 && self.theta.len() != nx {
            return Err(FitcError::DimensionMismatch(format!(
                "{}: theta should be either 1-dim or of input dimension {nx}, got {}",
                self.name(),
                self.theta.len()
            )));
        }
        Ok(())
    }

    fn kernel_matrix_derivative(
        &self,
        param: &str,
        a: ArrayView2<F>,
        b: ArrayView2<F>,
    ) -> Result<Array2<F>> {
        let idx = self.theta_index(param)?;
        let theta = self.expanded_theta(a.ncols());
        let isotropic = self.theta.len() == 1;
        let mut dk = Array2::zeros((a.nrows(), b.nrows()));
        Zip::from(dk.rows_mut())
            .and(a.rows())
            .par_for_each(|mut dk_i, a_i| {
                let d = differences(&a_i, &b);
                let dr = self.corr.theta_derivatives(&d, &theta);
                if isotropic {
                    dk_i.assign(&isotropic_derivative(&dr));
                } else {
                    dk_i.assign(&dr.column(idx));
                }
            });
        Ok(dk)
    }

    fn kernel_diagonal_derivative(&self, param: &str, a: ArrayView2<F>) -> Result<Array1<F>> {
        self.theta_index(param)?;
        Ok(Array1::zeros(a.nrows()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation_models::{Matern32Corr, SquaredExponentialCorr};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_kernel_matrix() {
        let kernel = StationaryKernel::new(SquaredExponentialCorr(), array![1.]);
        let a = array![[0.], [1.]];
        let b = array![[0.], [2.], [100.]];
        let k = kernel.kernel_matrix(a.view(), b.view());
        let expected = array![
            [1., (-2f64).exp(), 0.],
            [(-0.5f64).exp(), (-0.5f64).exp(), 0.]
        ];
        assert_abs_diff_eq!(k, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(kernel.kernel_diagonal(b.view()), array![1., 1., 1.]);
    }

    #[test]
    fn test_kernel_matrix_symmetric() {
        let kernel = StationaryKernel::new(Matern32Corr(), array![0.5, 2.]);
        let a = array![[0., 0.1], [1., -0.4], [0.3, 0.8], [-0.5, 0.2]];
        let k = kernel.kernel_matrix(a.view(), a.view());
        assert_abs_diff_eq!(k, k.t(), epsilon = 1e-14);
        assert_abs_diff_eq!(k.diag(), kernel.kernel_diagonal(a.view()), epsilon = 1e-14);
    }

    #[test]
    fn test_kernel_matrix_derivative() {
        let a = array![[0., 0.1], [1., -0.4], [0.3, 0.8]];
        let b = array![[0.2, 0.], [-0.5, 0.2]];
        let e = 1e-6;

        // anisotropic
        let kernel = StationaryKernel::new(Matern32Corr(), array![0.5, 2.]);
        let dk = kernel
            .kernel_matrix_derivative("theta_1", a.view(), b.view())
            .unwrap();
        let kp = StationaryKernel::new(Matern32Corr(), array![0.5, 2. + e]);
        let km = StationaryKernel::new(Matern32Corr(), array![0.5, 2. - e]);
        let fdiff = (kp.kernel_matrix(a.view(), b.view()) - km.kernel_matrix(a.view(), b.view()))
            / (2. * e);
        assert_abs_diff_eq!(dk, fdiff, epsilon = 1e-6);

        // isotropic
        let kernel = StationaryKernel::new(SquaredExponentialCorr(), array![1.5]);
        let dk = kernel
            .kernel_matrix_derivative("theta_0", a.view(), b.view())
            .unwrap();
        let kp = StationaryKernel::new(SquaredExponentialCorr(), array![1.5 + e]);
        let km = StationaryKernel::new(SquaredExponentialCorr(), array![1.5 - e]);
        let fdiff = (kp.kernel_matrix(a.view(), b.view()) - km.kernel_matrix(a.view(), b.view()))
            / (2. * e);
        assert_abs_diff_eq!(dk, fdiff, epsilon = 1e-6);
    }

    #[test]
    fn test_check_input_dim() {
        let kernel = StationaryKernel::new(SquaredExponentialCorr(), array![1.5]);
        assert!(kernel.check_input_dim(1).is_ok());
        assert!(kernel.check_input_dim(3).is_ok());
        let kernel = StationaryKernel::new(Matern32Corr(), array![0.5, 2., 1.]);
        assert!(kernel.check_input_dim(3).is_ok());
        assert!(matches!(
            kernel.check_input_dim(2),
            Err(FitcError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_unknown_kernel_parameter() {
        let kernel = StationaryKernel::new(SquaredExponentialCorr(), array![1.5]);
        let a = array![[0.]];
        for param in ["theta_1", "log_width", "theta_x"] {
            match kernel.kernel_matrix_derivative(param, a.view(), a.view()) {
                Err(FitcError::UnsupportedParameter { model, param: p }) => {
                    assert_eq!(model, "SquaredExponentialKernel");
                    assert_eq!(p, param);
                }
                other => panic!("unexpected result {other:?}"),
            }
        }
    }
}
