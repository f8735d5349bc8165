//! Likelihood models attached to the inference.
//!
//! FITC inference is only defined for [`GaussianLikelihood`], other likelihood types
//! are rejected when the inference is built.

use crate::errors::{FitcError, Result};
use linfa::Float;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of likelihood model
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum LikelihoodType {
    /// Gaussian noise, the only one supported by FITC inference
    Gaussian,
    /// Student's t noise
    StudentT,
    /// Logistic classification
    Logit,
    /// Probit classification
    Probit,
}

impl fmt::Display for LikelihoodType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            LikelihoodType::Gaussian => "Gaussian",
            LikelihoodType::StudentT => "StudentT",
            LikelihoodType::Logit => "Logit",
            LikelihoodType::Probit => "Probit",
        };
        write!(f, "{s}")
    }
}

/// A trait for likelihood models given to the inference.
///
/// Access to the Gaussian specific parameters goes through the checked
/// [`as_gaussian`](LikelihoodModel::as_gaussian) accessors.
pub trait LikelihoodModel<F: Float>: fmt::Debug {
    /// Kind of the model
    fn model_type(&self) -> LikelihoodType;

    /// Name of the model
    fn name(&self) -> String;

    /// Gaussian view of the model if any
    fn as_gaussian(&self) -> Option<&GaussianLikelihood<F>> {
        None
    }

    /// Mutable Gaussian view of the model if any
    fn as_gaussian_mut(&mut self) -> Option<&mut GaussianLikelihood<F>> {
        None
    }
}

/// Gaussian noise likelihood `y = f(x) + eps, eps ~ N(0, sigma^2)`
/// parameterized by `log_sigma`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct GaussianLikelihood<F: Float> {
    log_sigma: F,
}

impl<F: Float> Default for GaussianLikelihood<F> {
    fn default() -> Self {
        GaussianLikelihood {
            log_sigma: F::zero(),
        }
    }
}

impl<F: Float> GaussianLikelihood<F> {
    /// Name of the noise parameter
    pub const LOG_SIGMA: &'static str = "log_sigma";

    /// Constructor given the noise standard deviation
    pub fn new(sigma: F) -> Result<Self> {
        let mut lik = Self::default();
        lik.set_sigma(sigma)?;
        Ok(lik)
    }

    /// Noise standard deviation
    pub fn sigma(&self) -> F {
        self.log_sigma.exp()
    }

    /// Log of the noise standard deviation
    pub fn log_sigma(&self) -> F {
        self.log_sigma
    }

    /// Set noise standard deviation, should be strictly positive
    pub fn set_sigma(&mut self, sigma: F) -> Result<()> {
        if !(sigma > F::zero()) || !sigma.is_finite() {
            return Err(FitcError::InvalidValueError(format!(
                "noise standard deviation should be positive, got {sigma}"
            )));
        }
        self.log_sigma = sigma.ln();
        Ok(())
    }

    /// Set log of the noise standard deviation
    pub fn set_log_sigma(&mut self, log_sigma: F) -> Result<()> {
        if !log_sigma.is_finite() {
            return Err(FitcError::InvalidValueError(format!(
                "log noise standard deviation should be finite, got {log_sigma}"
            )));
        }
        self.log_sigma = log_sigma;
        Ok(())
    }
}

impl<F: Float> LikelihoodModel<F> for GaussianLikelihood<F> {
    fn model_type(&self) -> LikelihoodType {
        LikelihoodType::Gaussian
    }

    fn name(&self) -> String {
        "GaussianLikelihood".to_string()
    }

    fn as_gaussian(&self) -> Option<&GaussianLikelihood<F>> {
        Some(self)
    }

    fn as_gaussian_mut(&mut self) -> Option<&mut GaussianLikelihood<F>> {
        Some(self)
    }
}
