use thiserror::Error;

/// A result type for FITC inference
pub type Result<T> = std::result::Result<T, FitcError>;

/// An error when using [`FitcInference`](crate::FitcInference)
#[derive(Error, Debug)]
pub enum FitcError {
    /// When the likelihood model is not a Gaussian likelihood
    #[error("FITC inference method can only use Gaussian likelihood function, got {0}")]
    UnsupportedLikelihood(String),
    /// When labels are not regression labels
    #[error("Labels must be regression labels, got {0}")]
    UnsupportedLabels(String),
    /// When a derivative is requested wrt an unknown parameter
    #[error("Can't compute derivative of the negative log marginal likelihood wrt {model}.{param} parameter")]
    UnsupportedParameter {
        /// Name of the model owning the parameter
        model: String,
        /// Offending parameter name
        param: String,
    },
    /// When features, inducing points or labels sizes do not agree
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// When error due to a bad value
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
    /// When a Cholesky factorization meets a matrix which is not positive definite
    #[error("{0} not positive definite")]
    NotPositiveDefinite(String),
    /// When `diag(Ktrtr)*scale + sigma^2 - diag(Q)` is not positive
    #[error("Noise-corrected training variance is not positive at point {index} (value={value}), check noise and scale parameters")]
    NonPositiveDiagonal {
        /// Index of the training point
        index: usize,
        /// Faulty denominator value
        value: f64,
    },
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
}

impl FitcError {
    /// Numerical failures abort the current update, hyperparameters have to be changed before retrying
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            FitcError::NotPositiveDefinite(_)
                | FitcError::NonPositiveDiagonal { .. }
                | FitcError::LinalgError(_)
        )
    }

    /// Configuration errors are raised at setup or when a derivative is requested wrt an unknown parameter
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FitcError::UnsupportedLikelihood(_)
                | FitcError::UnsupportedLabels(_)
                | FitcError::UnsupportedParameter { .. }
                | FitcError::DimensionMismatch(_)
                | FitcError::InvalidValueError(_)
        )
    }

    pub(crate) fn unsupported_parameter(model: &str, param: &str) -> Self {
        FitcError::UnsupportedParameter {
            model: model.to_string(),
            param: param.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = FitcError::unsupported_parameter("GaussianLikelihood", "log_width");
        assert!(err.is_configuration());
        assert!(!err.is_numerical());
        assert_eq!(
            err.to_string(),
            "Can't compute derivative of the negative log marginal likelihood wrt GaussianLikelihood.log_width parameter"
        );

        let err = FitcError::NotPositiveDefinite("inducing covariance".to_string());
        assert!(err.is_numerical());
        assert_eq!(err.to_string(), "inducing covariance not positive definite");
    }
}
