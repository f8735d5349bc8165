//! A module for the prior mean function of the sparse GP model.
//!
//! The following models are implemented:
//! * zero,
//! * constant,
//! * linear

use crate::errors::{FitcError, Result};
use linfa::Float;
use ndarray::{Array1, ArrayView2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trait for mean functions m(x) evaluated at training or test points
pub trait MeanFunction<F: Float>: Clone + fmt::Display {
    /// Name used in error messages
    fn name(&self) -> String {
        self.to_string()
    }

    /// Mean vector at the given `x` data points specified as (n, nx) matrix.
    fn mean_vector(&self, x: ArrayView2<F>) -> Array1<F>;

    /// Checks the mean can be evaluated on points of dimension `nx`
    fn check_input_dim(&self, _nx: usize) -> Result<()> {
        Ok(())
    }

    /// Derivative of the mean vector wrt the parameter named `param`,
    /// a (n,) vector
    fn parameter_gradient(&self, param: &str, _x: ArrayView2<F>) -> Result<Array1<F>> {
        Err(FitcError::unsupported_parameter(&self.name(), param))
    }
}

/// A null function as mean of the GP
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ZeroMean();

impl<F: Float> MeanFunction<F> for ZeroMean {
    fn mean_vector(&self, x: ArrayView2<F>) -> Array1<F> {
        Array1::zeros(x.nrows())
    }
}

/// A constant function as mean of the GP, parameter is named `mean`
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ConstantMean<F: Float> {
    /// m(x) = value
    pub value: F,
}

impl<F: Float> ConstantMean<F> {
    /// Constructor
    pub fn new(value: F) -> Self {
        ConstantMean { value }
    }
}

impl<F: Float> MeanFunction<F> for ConstantMean<F> {
    fn mean_vector(&self, x: ArrayView2<F>) -> Array1<F> {
        Array1::from_elem(x.nrows(), self.value)
    }

    fn parameter_gradient(&self, param: &str, x: ArrayView2<F>) -> Result<Array1<F>> {
        match param {
            "mean" => Ok(Array1::ones(x.nrows())),
            _ => Err(FitcError::unsupported_parameter(
                &MeanFunction::<F>::name(self),
                param,
            )),
        }
    }
}

/// An affine function as mean of the GP.
///
/// m(x) = intercept + weights.x, parameters are named `intercept` and `weight_0`, `weight_1`, ...
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct LinearMean<F: Float> {
    /// Constant term
    pub intercept: F,
    /// (nx,) weights
    pub weights: Array1<F>,
}

impl<F: Float> LinearMean<F> {
    /// Constructor
    pub fn new(intercept: F, weights: Array1<F>) -> Self {
        LinearMean { intercept, weights }
    }
}

impl<F: Float> MeanFunction<F> for LinearMean<F> {
    fn mean_vector(&self, x: ArrayView2<F>) -> Array1<F> {
        assert!(
            x.ncols() == self.weights.len(),
            "linear mean expects {} components, got {}",
            self.weights.len(),
            x.ncols()
        );
        x.dot(&self.weights) + self.intercept
    }

    fn check_input_dim(&self, nx: usize) -> Result<()> {
        if self.weights.len() != nx {
            return Err(FitcError::DimensionMismatch(format!(
                "linear mean expects {} components, got {nx}",
                self.weights.len()
            )));
        }
        Ok(())
    }

    fn parameter_gradient(&self, param: &str, x: ArrayView2<F>) -> Result<Array1<F>> {
        if param == "intercept" {
            return Ok(Array1::ones(x.nrows()));
        }
        param
            .strip_prefix("weight_")
            .and_then(|idx| idx.parse::<usize>().ok())
            .filter(|idx| *idx < self.weights.len() && *idx < x.ncols())
            .map(|idx| x.column(idx).to_owned())
            .ok_or_else(|| FitcError::unsupported_parameter(&MeanFunction::<F>::name(self), param))
    }
}

impl fmt::Display for ZeroMean {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ZeroMean")
    }
}

impl<F: Float> fmt::Display for ConstantMean<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConstantMean")
    }
}

impl<F: Float> fmt::Display for LinearMean<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LinearMean")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_zero_and_constant() {
        let x = array![[1., 2.], [3., 4.], [5., 6.]];
        assert_abs_diff_eq!(ZeroMean().mean_vector(x.view()), array![0., 0., 0.]);

        let mean = ConstantMean::new(1.5);
        assert_abs_diff_eq!(mean.mean_vector(x.view()), array![1.5, 1.5, 1.5]);
        assert_abs_diff_eq!(
            mean.parameter_gradient("mean", x.view()).unwrap(),
            array![1., 1., 1.]
        );
        assert!(matches!(
            MeanFunction::<f64>::parameter_gradient(&ZeroMean(), "mean", x.view()),
            Err(FitcError::UnsupportedParameter { .. })
        ));
    }

    #[test]
    fn test_linear() {
        let x = array![[1., 2.], [3., 4.], [5., 6.]];
        let mean = LinearMean::new(1., array![0.5, -1.]);
        assert_abs_diff_eq!(mean.mean_vector(x.view()), array![-0.5, -1.5, -2.5]);
        assert_abs_diff_eq!(
            mean.parameter_gradient("intercept", x.view()).unwrap(),
            array![1., 1., 1.]
        );
        assert_abs_diff_eq!(
            mean.parameter_gradient("weight_1", x.view()).unwrap(),
            array![2., 4., 6.]
        );
        match mean.parameter_gradient("weight_2", x.view()) {
            Err(FitcError::UnsupportedParameter { model, param }) => {
                assert_eq!(model, "LinearMean");
                assert_eq!(param, "weight_2");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(mean.check_input_dim(2).is_ok());
        assert!(matches!(
            mean.check_input_dim(3),
            Err(FitcError::DimensionMismatch(_))
        ));
    }
}
