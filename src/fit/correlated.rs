//! Correlated bootstrap fits.
//!
//! The covariance of the fit target is estimated once from its replicas.
//! Every replica (and the full-data mean) is then fitted independently
//! against the same whitened metric. Replicas whose minimiser does not
//! converge are recorded as NaN rows and left out of the aggregates.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::constants::CHI2_DECIMALS;
use crate::error::{AnalysisError, Result};
use crate::statistics::{
    estimate_covariance, nan_mean, nan_std, round_to, BootstrapSampleSet, CovarianceEstimate,
};
use crate::thread_pool;
use crate::types::{Correlator, ScalarSamples};

use super::minimize::{levenberg_marquardt, Bound, LmOptions, Minimum};
use super::models::FitModel;

/// Settings shared by every correlated fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Minimiser settings.
    pub minimizer: LmOptions,
    /// Relative distance from a bound below which a parameter counts as on it.
    pub bound_tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            minimizer: LmOptions::default(),
            bound_tolerance: 1e-6,
        }
    }
}

/// A full-data fit parameter that ended on one of its bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundHit {
    /// Parameter name.
    pub parameter: String,
    /// Fitted value.
    pub value: f64,
    /// The bound it sits on.
    pub bound: f64,
}

/// Result of a correlated bootstrap fit.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Parameter names.
    pub names: Vec<String>,
    /// Parameters of the full-data fit.
    pub mean_params: DVector<f64>,
    /// Per-replica parameters; NaN rows for replicas that did not converge.
    pub samples: Vec<DVector<f64>>,
    /// NaN-aware replica average per parameter.
    pub param_mean: Vec<f64>,
    /// NaN-aware replica spread per parameter.
    pub param_std: Vec<f64>,
    /// Chi-square per degree of freedom of the full-data fit, rounded.
    pub chi2_dof: f64,
    /// Replicas excluded from the aggregates.
    pub failed_replicas: usize,
    /// Full-data parameters sitting on a bound.
    pub bound_hits: Vec<BoundHit>,
}

impl FitResult {
    /// Index of a named parameter.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Bootstrap set of one parameter (mean = full-data fit value).
    pub fn parameter(&self, name: &str) -> Option<ScalarSamples> {
        let k = self.index_of(name)?;
        Some(BootstrapSampleSet::new(
            self.mean_params[k],
            self.samples.iter().map(|row| row[k]).collect(),
        ))
    }

    /// `Constraint` error for the first parameter on a bound.
    pub fn check_bounds(&self) -> Result<()> {
        match self.bound_hits.first() {
            Some(hit) => Err(AnalysisError::Constraint {
                parameter: hit.parameter.clone(),
                value: hit.value,
                bound: hit.bound,
            }),
            None => Ok(()),
        }
    }
}

/// Correlated chi-square `rᵀ C⁻¹ r` of `model` at `params` against `data`.
pub fn correlated_chi_square<M: FitModel + ?Sized>(
    model: &M,
    params: &DVector<f64>,
    data: &DVector<f64>,
    covariance: &CovarianceEstimate,
) -> Result<f64> {
    if data.len() != model.data_len() {
        return Err(AnalysisError::shape("chi-square data", model.data_len(), data.len()));
    }
    covariance.chi_square(&(data - model.evaluate(params)))
}

/// Inverse of the Cholesky factor, so that `W r = L⁻¹ r`.
fn whitening_matrix(covariance: &CovarianceEstimate) -> Result<DMatrix<f64>> {
    let m = covariance.dimension();
    covariance
        .cholesky_l
        .solve_lower_triangular(&DMatrix::identity(m, m))
        .ok_or_else(|| AnalysisError::SingularMatrix {
            context: "Cholesky factor".to_string(),
        })
}

fn minimise<M: FitModel + ?Sized>(
    model: &M,
    whitening: &DMatrix<f64>,
    data: &DVector<f64>,
    initial: &DVector<f64>,
    bounds: &[Bound],
    options: &LmOptions,
) -> Minimum {
    let residuals = |p: &DVector<f64>| whitening * (data - model.evaluate(p));
    levenberg_marquardt(residuals, initial, bounds, options)
}

/// Fit `model` to the mean and every replica of `data`.
///
/// # Arguments
///
/// * `model` - Model evaluated at the same points as `data`
/// * `data` - Fit target; its replicas also define the covariance
/// * `initial` - Starting parameters for the full-data fit
/// * `bounds` - Per-parameter bounds (missing entries are unbounded)
/// * `options` - Minimiser and bound-detection settings
///
/// Replica fits start from the full-data optimum.
///
/// # Errors
///
/// `ShapeMismatch` if sizes disagree, `InsufficientData` without positive
/// degrees of freedom, `CovarianceSingular` from the covariance step, and
/// `Convergence` if the full-data fit itself does not converge; no replica
/// is fitted in that case.
pub fn fit_bootstrap<M: FitModel + ?Sized>(
    model: &M,
    data: &Correlator,
    initial: &[f64],
    bounds: &[Bound],
    options: &FitOptions,
) -> Result<FitResult> {
    let n_params = model.parameter_count();
    if initial.len() != n_params {
        return Err(AnalysisError::shape("initial parameters", n_params, initial.len()));
    }
    if data.len() != model.data_len() {
        return Err(AnalysisError::shape("fit target", model.data_len(), data.len()));
    }
    if data.len() <= n_params {
        return Err(AnalysisError::InsufficientData {
            context: "correlated fit degrees of freedom".to_string(),
            available: data.len(),
            required: n_params + 1,
        });
    }

    // Non-finite replicas stay out of the covariance and fail their own fit.
    let finite: Vec<DVector<f64>> = data
        .samples()
        .iter()
        .filter(|replica| replica.iter().all(|v| v.is_finite()))
        .cloned()
        .collect();
    if finite.len() < data.replica_count() {
        warn!(
            "{} of {} replicas have non-finite entries; covariance uses the rest",
            data.replica_count() - finite.len(),
            data.replica_count()
        );
    }
    let covariance = estimate_covariance(&finite)?;
    let whitening = whitening_matrix(&covariance)?;

    let start = DVector::from_column_slice(initial);
    let central = minimise(model, &whitening, data.mean(), &start, bounds, &options.minimizer);
    if !central.converged {
        return Err(AnalysisError::Convergence {
            iterations: central.iterations,
            chi2: central.chi2,
        });
    }

    let fit_replica = |replica: &DVector<f64>| -> DVector<f64> {
        let minimum = minimise(
            model,
            &whitening,
            replica,
            &central.params,
            bounds,
            &options.minimizer,
        );
        if minimum.converged {
            minimum.params
        } else {
            DVector::from_element(n_params, f64::NAN)
        }
    };

    #[cfg(feature = "parallel")]
    let samples: Vec<DVector<f64>> =
        thread_pool::install(|| data.samples().par_iter().map(fit_replica).collect());

    #[cfg(not(feature = "parallel"))]
    let samples: Vec<DVector<f64>> =
        thread_pool::install(|| data.samples().iter().map(fit_replica).collect());

    let names: Vec<String> = model
        .parameter_names()
        .iter()
        .map(|n| (*n).to_string())
        .collect();

    let mut param_mean = Vec::with_capacity(n_params);
    let mut param_std = Vec::with_capacity(n_params);
    for k in 0..n_params {
        let column: Vec<f64> = samples.iter().map(|row| row[k]).collect();
        param_mean.push(nan_mean(&column));
        param_std.push(nan_std(&column));
    }

    let failed_replicas = samples.iter().filter(|row| row[0].is_nan()).count();
    if failed_replicas > 0 {
        warn!(
            "{} of {} bootstrap replicas did not converge",
            failed_replicas,
            samples.len()
        );
    }

    let bound_hits: Vec<BoundHit> = bounds
        .iter()
        .zip(central.params.iter())
        .zip(names.iter())
        .filter_map(|((bound, &value), name)| {
            bound
                .touching(value, options.bound_tolerance)
                .map(|b| BoundHit {
                    parameter: name.clone(),
                    value,
                    bound: b,
                })
        })
        .collect();
    for hit in &bound_hits {
        warn!(
            "fit parameter {} = {} is on its bound {}",
            hit.parameter, hit.value, hit.bound
        );
    }

    let dof = (data.len() - n_params) as f64;
    let chi2_dof = round_to(central.chi2 / dof, CHI2_DECIMALS);
    debug!(
        "correlated fit: {} points, {} parameters, chi2/dof = {}",
        data.len(),
        n_params,
        chi2_dof
    );

    Ok(FitResult {
        names,
        mean_params: central.params,
        samples,
        param_mean,
        param_std,
        chi2_dof,
        failed_replicas,
        bound_hits,
    })
}
