//! Autocorrelation along the Monte Carlo trajectory.
//!
//! Successive configurations of a Markov chain are correlated. The
//! integrated autocorrelation time tells how many configurations must be
//! binned together before the bootstrap treats them as independent.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Window factor for the automatic windowing of the integrated time.
const SOKAL_WINDOW_FACTOR: f64 = 5.0;

/// Compute lag-1 autocorrelation of a series in trajectory order.
///
/// Returns 0.0 for fewer than 2 elements or zero variance.
pub fn lag1_autocorrelation(data: &[f64]) -> f64 {
    lag_autocorrelation(data, 1)
}

/// Compute autocorrelation at a specified lag.
///
/// # Formula
///
/// ```text
/// r_k = sum((x_t - mean) * (x_{t+k} - mean)) / sum((x_t - mean)^2)
/// ```
pub fn lag_autocorrelation(data: &[f64], lag: usize) -> f64 {
    let n = data.len();
    if n <= lag {
        return 0.0;
    }

    let mean: f64 = data.iter().sum::<f64>() / n as f64;
    let variance: f64 = data.iter().map(|&x| (x - mean).powi(2)).sum();
    if variance == 0.0 {
        return 0.0;
    }

    let lagged_cov: f64 = data
        .iter()
        .zip(data.iter().skip(lag))
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum();

    lagged_cov / variance
}

/// Autocorrelation coefficients for lags 1 through `max_lag`.
pub fn autocorrelation_function(data: &[f64], max_lag: usize) -> Vec<f64> {
    (1..=max_lag)
        .map(|lag| lag_autocorrelation(data, lag))
        .collect()
}

/// Integrated autocorrelation time with automatic windowing.
///
/// `τ(W) = 1/2 + Σ_{k=1..W} r_k`, where W is the smallest window with
/// `W >= 5·τ(W)` (Sokal). Uncorrelated data gives τ ≈ 1/2.
pub fn integrated_autocorrelation_time(data: &[f64]) -> f64 {
    let n = data.len();
    let mut tau = 0.5;
    for window in 1..n {
        tau += lag_autocorrelation(data, window);
        if window as f64 >= SOKAL_WINDOW_FACTOR * tau {
            break;
        }
    }
    tau.max(0.5)
}

/// Bin size that makes binned configurations roughly independent.
pub fn suggested_bin_size(tau_int: f64) -> usize {
    if !tau_int.is_finite() {
        return 1;
    }
    ((2.0 * tau_int).ceil() as usize).max(1)
}

/// Trajectory autocorrelation summary for one time slice of a correlator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocorrelationSummary {
    /// Time slice the series was taken from.
    pub slice: usize,
    /// Lag-1 autocorrelation.
    pub lag1: f64,
    /// Integrated autocorrelation time.
    pub tau_int: f64,
    /// Suggested number of configurations per bin.
    pub suggested_bin: usize,
}

/// Summarise the trajectory autocorrelation of a raw (configuration x time)
/// correlator at one time slice.
///
/// Returns `None` if `slice` is out of range.
pub fn correlator_autocorrelation(
    data: &DMatrix<f64>,
    slice: usize,
) -> Option<AutocorrelationSummary> {
    if slice >= data.ncols() {
        return None;
    }
    let series: Vec<f64> = data.column(slice).iter().copied().collect();
    let tau_int = integrated_autocorrelation_time(&series);
    Some(AutocorrelationSummary {
        slice,
        lag1: lag1_autocorrelation(&series),
        tau_int,
        suggested_bin: suggested_bin_size(tau_int),
    })
}
