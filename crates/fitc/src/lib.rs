//! This library implements sparse [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process) regression
//! inference using the Fully Independent Training Conditional (FITC) approximation.
//!
//! The complexity of exact GP inference is in O(N^3) in processing time and O(N^2) in memory
//! where N is the number of training points. Using M so-called inducing points with M < N,
//! FITC approximates the prior covariance by a low-rank plus diagonal matrix and reduces
//! complexity respectively to O(N.M^2) and O(NM).
//!
//! Inference is implemented by [FitcInference], which computes lazily:
//! * the negative log marginal likelihood of the training labels,
//! * its derivatives wrt likelihood, kernel, mean and inference parameters,
//! * the posterior mean and covariance at training points,
//! * predictions at new points.
//!
//! It can be built directly from its collaborators (a [kernels::CovarianceProvider],
//! a [mean_models::MeanFunction], a [LikelihoodModel] and [Labels]) or fitted on a
//! `linfa` dataset using [FitcParams].
//!
//! Logging goes through the `log` facade, binaries may use `env_logger` with the [FITC_LOG]
//! environment variable.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
pub mod correlation_models;
mod errors;
mod factorization;
mod inference;
pub mod kernels;
mod labels;
mod likelihood;
mod marginal;
pub mod mean_models;
mod parameters;
mod posterior;
mod utils;

pub use errors::*;
pub use factorization::{CovarianceBlocks, FactorizationState};
pub use inference::*;
pub use labels::*;
pub use likelihood::*;
pub use parameters::*;

/// Env variable to set the log level, used by examples and benches through `env_logger`
pub const FITC_LOG: &str = "FITC_LOG";
