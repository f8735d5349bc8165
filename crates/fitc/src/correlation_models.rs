//! A module for stationary correlation models used by the reference covariance provider
//! [`StationaryKernel`](crate::kernels::StationaryKernel).
//!
//! Every model is a product over input dimensions of a one-dimensional factor
//! `f(theta_j, |d_j|)` with `f(theta, 0) = 1`, so that the kernel diagonal is one
//! and the process variance is carried by the inference `log_scale` parameter.
//!
//! The following correlation models are implemented:
//! * squared exponential,
//! * absolute exponential,
//! * matern 3/2,
//! * matern 5/2.

use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2, Zip};
use paste::paste;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// A trait for using a correlation model as a covariance kernel
pub trait CorrelationModel<F: Float>: Clone + Copy + Default + fmt::Display + Sync {
    /// Compute correlation values r(x, x') given distances `d` between x and x'
    /// and `theta` parameters, where:
    /// `d`     : distances (n, nx)
    /// `theta` : hyperparameters (nx,)
    /// Returns the (n,) correlation values
    fn value(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array1<F>;

    /// Derivative of `ln f(theta_j, |d_j|)` wrt `theta_j` for the one-dimensional factor `f`
    fn log_factor_derivative(&self, abs_d: F, theta: F) -> F;

    /// Compute derivatives of r(x, x') wrt each `theta` component given distances `d`.
    /// Returns a (n, nx) matrix
    fn theta_derivatives(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array2<F> {
        let r = self.value(d, theta);
        let mut dr = Array2::zeros(d.raw_dim());
        Zip::from(dr.rows_mut())
            .and(d.rows())
            .and(&r)
            .for_each(|mut dr_i, d_i, r_i| {
                Zip::from(&mut dr_i)
                    .and(&d_i)
                    .and(theta)
                    .for_each(|dr_ij, d_ij, theta_j| {
                        *dr_ij = *r_i * self.log_factor_derivative(d_ij.abs(), *theta_j);
                    });
            });
        dr
    }
}

/// Squared exponential correlation models
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub struct SquaredExponentialCorr();

impl<F: Float> CorrelationModel<F> for SquaredExponentialCorr {
    ///   nx
    /// prod exp( - (theta_j * d_j)^2 / 2 )
    ///  j=1
    fn value(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array1<F> {
        let theta2 = theta.mapv(|v| v * v);
        let r = d.mapv(|v| v * v).dot(&theta2);
        r.mapv(|v| F::exp(F::cast(-0.5) * v))
    }

    fn log_factor_derivative(&self, abs_d: F, theta: F) -> F {
        -theta * abs_d * abs_d
    }
}

/// Absolute exponential correlation models
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub struct AbsoluteExponentialCorr();

impl<F: Float> CorrelationModel<F> for AbsoluteExponentialCorr {
    ///   nx
    /// prod exp( - theta_j * |d_j| )
    ///  j=1
    fn value(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array1<F> {
        let r = d.mapv(|v| v.abs()).dot(theta);
        r.mapv(|v| F::exp(-v))
    }

    fn log_factor_derivative(&self, abs_d: F, _theta: F) -> F {
        -abs_d
    }
}

/// Matern 3/2 correlation model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub struct Matern32Corr();

impl<F: Float> CorrelationModel<F> for Matern32Corr {
    ///   nx
    /// prod (1 + sqrt(3) * theta_j * |d_j|) exp( - sqrt(3) * theta_j * |d_j| )
    ///  j=1
    fn value(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array1<F> {
        let sqrt3 = F::cast(3.).sqrt();
        let abs_d = d.mapv(|v| v.abs());

        let mut a = Array1::ones(d.nrows());
        Zip::from(&mut a).and(abs_d.rows()).for_each(|a_i, abs_d_i| {
            Zip::from(&abs_d_i).and(theta).for_each(|abs_d_ij, theta_j| {
                *a_i *= F::one() + sqrt3 * *theta_j * *abs_d_ij;
            });
        });
        let b = abs_d.dot(theta).mapv(|v| F::exp(-sqrt3 * v));
        a * b
    }

    fn log_factor_derivative(&self, abs_d: F, theta: F) -> F {
        let c = F::cast(3.).sqrt() * abs_d;
        -c * c * theta / (F::one() + c * theta)
    }
}

/// Matern 5/2 correlation model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub struct Matern52Corr();

impl<F: Float> CorrelationModel<F> for Matern52Corr {
    ///   nx
    /// prod (1 + sqrt(5) * theta_j * |d_j| + (5./3.) * theta_j^2 * |d_j|^2) exp( - sqrt(5) * theta_j * |d_j| )
    ///  j=1
    fn value(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix2>,
        theta: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array1<F> {
        let sqrt5 = F::cast(5.).sqrt();
        let div5_3 = F::cast(5. / 3.);
        let abs_d = d.mapv(|v| v.abs());

        let mut a = Array1::ones(d.nrows());
        Zip::from(&mut a).and(abs_d.rows()).for_each(|a_i, abs_d_i| {
            Zip::from(&abs_d_i).and(theta).for_each(|abs_d_ij, theta_j| {
                let v = *theta_j * *abs_d_ij;
                *a_i *= F::one() + sqrt5 * v + div5_3 * v * v;
            });
        });
        let b = abs_d.dot(theta).mapv(|v| F::exp(-sqrt5 * v));
        a * b
    }

    fn log_factor_derivative(&self, abs_d: F, theta: F) -> F {
        let c = F::cast(5.).sqrt() * abs_d;
        let poly = F::one() + c * theta + c * c * theta * theta / F::cast(3.);
        (c + F::cast(2. / 3.) * c * c * theta) / poly - c
    }
}

macro_rules! declare_corr_util_impls {
    ($corr:ident) => {
        paste! {
            impl fmt::Display for [<$corr Corr>] {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "{}", stringify!($corr))
                }
            }

            impl From<[<$corr Corr>]> for String {
                fn from(_item: [<$corr Corr>]) -> Self {
                    stringify!($corr).to_string()
                }
            }

            impl TryFrom<String> for [<$corr Corr>] {
                type Error = &'static str;
                fn try_from(s: String) -> Result<Self, Self::Error> {
                    if s == stringify!($corr) {
                        Ok(Self::default())
                    } else {
                        Err(concat!("Bad string value for ", stringify!([<$corr Corr>]), ", should be \'", stringify!($corr), "\'"))
                    }
                }
            }
        }
    };
}

declare_corr_util_impls!(SquaredExponential);
declare_corr_util_impls!(AbsoluteExponential);
declare_corr_util_impls!(Matern32);
declare_corr_util_impls!(Matern52);

/// Sum the (n, nx) theta derivatives over dimensions when a single isotropic theta is used
pub(crate) fn isotropic_derivative<F: Float>(dr: &Array2<F>) -> Array1<F> {
    dr.sum_axis(Axis(1))
}
