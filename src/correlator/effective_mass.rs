//! Effective mass curves.

use nalgebra::DVector;

use crate::statistics::nan_mean;
use crate::types::Correlator;

/// `ln(C(t) / C(t+1))` for one series; NaN where the ratio is not positive.
pub fn effective_mass_series(series: &DVector<f64>) -> DVector<f64> {
    let len = series.len().saturating_sub(1);
    DVector::from_fn(len, |t, _| {
        let ratio = series[t] / series[t + 1];
        if ratio > 0.0 && ratio.is_finite() {
            ratio.ln()
        } else {
            f64::NAN
        }
    })
}

/// Effective mass of a correlator, per replica. One slice shorter than the
/// input.
pub fn effective_mass(corr: &Correlator) -> Correlator {
    corr.map(effective_mass_series)
}

/// Starting energy for a fit over `[start, end)`: the NaN-aware average of
/// the mean effective mass in the window, or `fallback` if none is finite.
pub fn energy_guess(corr: &Correlator, start: usize, end: usize, fallback: f64) -> f64 {
    let curve = effective_mass_series(corr.mean());
    let end = end.min(curve.len());
    if start >= end {
        return fallback;
    }
    let guess = nan_mean(&curve.as_slice()[start..end]);
    if guess.is_finite() && guess > 0.0 {
        guess
    } else {
        fallback
    }
}
