//! Correlated non-linear least squares.
//!
//! - A bounded Levenberg–Marquardt minimiser
//! - Model curves for correlators and smeared spectral densities
//! - Bootstrap fits against a Cholesky-whitened covariance

mod correlated;
mod minimize;
mod models;

pub use correlated::{correlated_chi_square, fit_bootstrap, BoundHit, FitOptions, FitResult};
pub use minimize::{levenberg_marquardt, Bound, LmOptions, Minimum};
pub use models::{
    boundary_gaussian, time_slices, Cosh, CoshSimultaneous, CoshSinhSimultaneous, ExpDecay,
    FitModel, GaussianCoupling, GaussianPeak,
};
