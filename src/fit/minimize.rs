//! Bounded Levenberg–Marquardt minimisation of a sum of squared residuals.
//!
//! The residual function is treated as a black box; the Jacobian is taken by
//! forward differences (backward next to an upper bound). Bounds are
//! enforced by projecting every trial point into the box.

use nalgebra::{Cholesky, DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Damping above which no further decrease is considered possible.
const MAX_DAMPING: f64 = 1e16;

/// Floor for the diagonal scaling of the damping term.
const MIN_DIAGONAL: f64 = 1e-12;

/// Closed interval constraint on one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    /// Lower limit (may be `-inf`).
    pub lower: f64,
    /// Upper limit (may be `+inf`).
    pub upper: f64,
}

impl Default for Bound {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Bound {
    /// `[lower, upper]`.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// No constraint.
    pub fn unbounded() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    /// `[lower, +inf)`.
    pub fn at_least(lower: f64) -> Self {
        Self {
            lower,
            upper: f64::INFINITY,
        }
    }

    /// Project `value` into the interval.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }

    /// The bound `value` sits on, if it is within `tolerance` (relative) of one.
    pub fn touching(&self, value: f64, tolerance: f64) -> Option<f64> {
        let near = |bound: f64| {
            bound.is_finite() && (value - bound).abs() <= tolerance * (1.0 + bound.abs())
        };
        if near(self.lower) {
            Some(self.lower)
        } else if near(self.upper) {
            Some(self.upper)
        } else {
            None
        }
    }
}

/// Minimiser settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmOptions {
    /// Maximum accepted steps.
    pub max_iterations: usize,
    /// Relative chi-square decrease (and relative step size) that counts as converged.
    pub tolerance: f64,
    /// Starting damping factor.
    pub initial_damping: f64,
    /// Relative step for the finite-difference Jacobian.
    pub jacobian_step: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            initial_damping: 1e-3,
            jacobian_step: 1e-7,
        }
    }
}

/// Outcome of one minimisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Parameters at the minimum.
    pub params: DVector<f64>,
    /// Sum of squared residuals there.
    pub chi2: f64,
    /// Accepted steps taken.
    pub iterations: usize,
    /// Whether a convergence criterion was met.
    pub converged: bool,
}

fn project(params: &DVector<f64>, bounds: &[Bound]) -> DVector<f64> {
    DVector::from_fn(params.len(), |k, _| match bounds.get(k) {
        Some(bound) => bound.clamp(params[k]),
        None => params[k],
    })
}

fn jacobian<F>(
    residuals: &F,
    params: &DVector<f64>,
    base: &DVector<f64>,
    bounds: &[Bound],
    step: f64,
) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut jac = DMatrix::zeros(base.len(), params.len());
    for k in 0..params.len() {
        let mut h = step * params[k].abs().max(1.0);
        let upper = bounds.get(k).map_or(f64::INFINITY, |b| b.upper);
        if params[k] + h > upper {
            h = -h;
        }
        let mut shifted = params.clone();
        shifted[k] += h;
        let column = (residuals(&shifted) - base) / h;
        jac.set_column(k, &column);
    }
    jac
}

/// Minimise `|residuals(p)|²` over the box `bounds`.
///
/// # Arguments
///
/// * `residuals` - Residual vector as a function of the parameters
/// * `initial` - Starting point (projected into the bounds first)
/// * `bounds` - One bound per parameter; missing entries are unbounded
/// * `options` - Iteration limits and tolerances
///
/// # Returns
///
/// The best point found. `converged` is false if the iteration limit was
/// reached or the residuals were not finite at the starting point.
pub fn levenberg_marquardt<F>(
    residuals: F,
    initial: &DVector<f64>,
    bounds: &[Bound],
    options: &LmOptions,
) -> Minimum
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut params = project(initial, bounds);
    let mut r = residuals(&params);
    let mut chi2 = r.norm_squared();

    if !chi2.is_finite() {
        return Minimum {
            params,
            chi2,
            iterations: 0,
            converged: false,
        };
    }

    let mut damping = options.initial_damping;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        if chi2 == 0.0 {
            return Minimum {
                params,
                chi2,
                iterations,
                converged: true,
            };
        }

        let jac = jacobian(&residuals, &params, &r, bounds, options.jacobian_step);
        let jtj = jac.transpose() * &jac;
        let gradient = jac.transpose() * &r;

        let accepted = loop {
            if damping > MAX_DAMPING {
                break None;
            }
            let mut system = jtj.clone();
            for k in 0..system.nrows() {
                system[(k, k)] += damping * jtj[(k, k)].max(MIN_DIAGONAL);
            }
            let Some(cholesky) = Cholesky::new(system) else {
                damping *= 10.0;
                continue;
            };
            let delta = cholesky.solve(&(-&gradient));
            let trial = project(&(&params + &delta), bounds);
            let trial_r = residuals(&trial);
            let trial_chi2 = trial_r.norm_squared();

            if trial_chi2.is_finite() && trial_chi2 < chi2 {
                damping = (damping / 10.0).max(1e-15);
                break Some((trial, trial_r, trial_chi2));
            }
            damping *= 10.0;
        };

        let Some((trial, trial_r, trial_chi2)) = accepted else {
            // No step lowers chi2 any further: stationary point.
            return Minimum {
                params,
                chi2,
                iterations,
                converged: true,
            };
        };

        iterations += 1;
        let decrease = chi2 - trial_chi2;
        let step = (&trial - &params).norm();
        let scale = params.norm();

        params = trial;
        r = trial_r;
        chi2 = trial_chi2;

        if decrease <= options.tolerance * chi2.max(options.tolerance)
            || step <= options.tolerance * (scale + options.tolerance)
        {
            return Minimum {
                params,
                chi2,
                iterations,
                converged: true,
            };
        }
    }

    Minimum {
        params,
        chi2,
        iterations,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_residuals<'a>(times: &'a [f64], data: &'a [f64]) -> impl Fn(&DVector<f64>) -> DVector<f64> + 'a {
        move |p: &DVector<f64>| {
            DVector::from_fn(times.len(), |i, _| data[i] - p[1] * (-p[0] * times[i]).exp())
        }
    }

    #[test]
    fn test_recovers_exponential() {
        let times: Vec<f64> = (0..12).map(|t| t as f64).collect();
        let data: Vec<f64> = times.iter().map(|t| 2.5 * (-0.45 * t).exp()).collect();

        let minimum = levenberg_marquardt(
            exp_residuals(&times, &data),
            &DVector::from_row_slice(&[0.3, 1.0]),
            &[],
            &LmOptions::default(),
        );

        assert!(minimum.converged);
        assert!((minimum.params[0] - 0.45).abs() < 1e-6, "E = {}", minimum.params[0]);
        assert!((minimum.params[1] - 2.5).abs() < 1e-5, "A = {}", minimum.params[1]);
        assert!(minimum.chi2 < 1e-10);
    }

    #[test]
    fn test_respects_bounds() {
        let times: Vec<f64> = (0..12).map(|t| t as f64).collect();
        let data: Vec<f64> = times.iter().map(|t| 2.5 * (-0.45 * t).exp()).collect();
        let bounds = [Bound::new(0.5, 1.0), Bound::unbounded()];

        let minimum = levenberg_marquardt(
            exp_residuals(&times, &data),
            &DVector::from_row_slice(&[0.8, 1.0]),
            &bounds,
            &LmOptions::default(),
        );

        assert!(minimum.params[0] >= 0.5);
        assert!((minimum.params[0] - 0.5).abs() < 1e-6, "E = {}", minimum.params[0]);
        assert_eq!(bounds[0].touching(minimum.params[0], 1e-6), Some(0.5));
    }

    #[test]
    fn test_non_finite_start() {
        let minimum = levenberg_marquardt(
            |_p: &DVector<f64>| DVector::from_element(2, f64::NAN),
            &DVector::from_row_slice(&[1.0]),
            &[],
            &LmOptions::default(),
        );
        assert!(!minimum.converged);
        assert_eq!(minimum.iterations, 0);
    }

    #[test]
    fn test_bound_helpers() {
        let bound = Bound::new(0.97, 1.1);
        assert_eq!(bound.clamp(2.0), 1.1);
        assert_eq!(bound.clamp(0.0), 0.97);
        assert_eq!(bound.touching(1.0, 1e-6), None);
        assert_eq!(Bound::unbounded().touching(1e300, 1e-6), None);
    }
}
