//! Fit models.
//!
//! A model owns the abscissae it is evaluated at (time slices or energies),
//! so evaluating it yields a vector directly comparable with the fit target.
//! Simultaneous models return the concatenation of their components in the
//! same order the targets are concatenated.

use std::f64::consts::{FRAC_PI_2, SQRT_2};

use nalgebra::DVector;
use statrs::function::erf::erf;

/// A model curve with named parameters.
pub trait FitModel: Send + Sync {
    /// Parameter names, in the order of the parameter vector.
    fn parameter_names(&self) -> &[&'static str];

    /// Number of points the model is evaluated at.
    fn data_len(&self) -> usize;

    /// Model values at every point for `params`.
    fn evaluate(&self, params: &DVector<f64>) -> DVector<f64>;

    /// Number of free parameters.
    fn parameter_count(&self) -> usize {
        self.parameter_names().len()
    }
}

/// Time slices `start..end` as floats.
pub fn time_slices(start: usize, end: usize) -> Vec<f64> {
    (start..end).map(|t| t as f64).collect()
}

fn cosh_term(energy: f64, t: f64, nt: f64) -> f64 {
    (-energy * t).exp() + (-energy * (nt - t)).exp()
}

fn sinh_term(energy: f64, t: f64, nt: f64) -> f64 {
    (-energy * t).exp() - (-energy * (nt - t)).exp()
}

/// `A e^{-E t}`. Parameters `[E, A]`.
#[derive(Debug, Clone)]
pub struct ExpDecay {
    times: Vec<f64>,
}

impl ExpDecay {
    /// Evaluate at the given time slices.
    pub fn new(times: Vec<f64>) -> Self {
        Self { times }
    }
}

impl FitModel for ExpDecay {
    fn parameter_names(&self) -> &[&'static str] {
        &["E", "A"]
    }

    fn data_len(&self) -> usize {
        self.times.len()
    }

    fn evaluate(&self, params: &DVector<f64>) -> DVector<f64> {
        let (energy, amplitude) = (params[0], params[1]);
        DVector::from_iterator(
            self.times.len(),
            self.times.iter().map(|&t| amplitude * (-energy * t).exp()),
        )
    }
}

/// `A (e^{-E t} + e^{-E (T - t)})`. Parameters `[E, A]`.
#[derive(Debug, Clone)]
pub struct Cosh {
    times: Vec<f64>,
    nt: f64,
}

impl Cosh {
    /// Evaluate at `times` on a lattice of temporal extent `nt`.
    pub fn new(times: Vec<f64>, nt: usize) -> Self {
        Self {
            times,
            nt: nt as f64,
        }
    }
}

impl FitModel for Cosh {
    fn parameter_names(&self) -> &[&'static str] {
        &["E", "A"]
    }

    fn data_len(&self) -> usize {
        self.times.len()
    }

    fn evaluate(&self, params: &DVector<f64>) -> DVector<f64> {
        let (energy, amplitude) = (params[0], params[1]);
        DVector::from_iterator(
            self.times.len(),
            self.times
                .iter()
                .map(|&t| amplitude * cosh_term(energy, t, self.nt)),
        )
    }
}

/// Smeared-smeared cosh and smeared-point sinh sharing one energy.
///
/// `Css = A² (e^{-Et} + e^{-E(T-t)})`, `Csp = A B (e^{-Et} - e^{-E(T-t)})`.
/// Parameters `[E, A, B]`; B is the matrix element of the point operator.
#[derive(Debug, Clone)]
pub struct CoshSinhSimultaneous {
    times: Vec<f64>,
    nt: f64,
}

impl CoshSinhSimultaneous {
    /// Both components are evaluated at `times`.
    pub fn new(times: Vec<f64>, nt: usize) -> Self {
        Self {
            times,
            nt: nt as f64,
        }
    }
}

impl FitModel for CoshSinhSimultaneous {
    fn parameter_names(&self) -> &[&'static str] {
        &["E", "A", "B"]
    }

    fn data_len(&self) -> usize {
        2 * self.times.len()
    }

    fn evaluate(&self, params: &DVector<f64>) -> DVector<f64> {
        let (energy, a, b) = (params[0], params[1], params[2]);
        let ss = self.times.iter().map(|&t| a * a * cosh_term(energy, t, self.nt));
        let sp = self.times.iter().map(|&t| a * b * sinh_term(energy, t, self.nt));
        DVector::from_iterator(self.data_len(), ss.chain(sp))
    }
}

/// Smeared-smeared and smeared-point cosh sharing one energy.
///
/// `Css = A² (…)`, `Csp = A B (…)` with the cosh time dependence for both.
/// Parameters `[E, A, B]`.
#[derive(Debug, Clone)]
pub struct CoshSimultaneous {
    times: Vec<f64>,
    nt: f64,
}

impl CoshSimultaneous {
    /// Both components are evaluated at `times`.
    pub fn new(times: Vec<f64>, nt: usize) -> Self {
        Self {
            times,
            nt: nt as f64,
        }
    }
}

impl FitModel for CoshSimultaneous {
    fn parameter_names(&self) -> &[&'static str] {
        &["E", "A", "B"]
    }

    fn data_len(&self) -> usize {
        2 * self.times.len()
    }

    fn evaluate(&self, params: &DVector<f64>) -> DVector<f64> {
        let (energy, a, b) = (params[0], params[1], params[2]);
        let ss = self.times.iter().map(|&t| a * a * cosh_term(energy, t, self.nt));
        let sp = self.times.iter().map(|&t| a * b * cosh_term(energy, t, self.nt));
        DVector::from_iterator(self.data_len(), ss.chain(sp))
    }
}

/// Gaussian smearing kernel restricted to positive energies and
/// renormalised to unit area on `[0, ∞)`.
///
/// ```text
/// g(x; μ, σ) = exp(-½((x-μ)/σ)²) / (σ √(π/2) (1 + erf(μ / (√2 σ))))
/// ```
pub fn boundary_gaussian(x: f64, mu: f64, sigma: f64) -> f64 {
    let norm = sigma * FRAC_PI_2.sqrt() * (1.0 + erf(mu / (SQRT_2 * sigma)));
    (-0.5 * ((x - mu) / sigma).powi(2)).exp() / norm
}

/// Single-state smeared spectral density, `a0² / (2 E0) · g(E; E0, σ)`.
/// Parameters `[a0, E0]`.
#[derive(Debug, Clone)]
pub struct GaussianPeak {
    energies: Vec<f64>,
    sigma: f64,
}

impl GaussianPeak {
    /// Evaluate at `energies` with kernel width `sigma`.
    pub fn new(energies: Vec<f64>, sigma: f64) -> Self {
        Self { energies, sigma }
    }
}

impl FitModel for GaussianPeak {
    fn parameter_names(&self) -> &[&'static str] {
        &["a0", "E0"]
    }

    fn data_len(&self) -> usize {
        self.energies.len()
    }

    fn evaluate(&self, params: &DVector<f64>) -> DVector<f64> {
        let (a0, e0) = (params[0], params[1]);
        DVector::from_iterator(
            self.energies.len(),
            self.energies
                .iter()
                .map(|&e| a0 * a0 / (2.0 * e0) * boundary_gaussian(e, e0, self.sigma)),
        )
    }
}

/// Mixed-channel spectral density with amplitude and energy held fixed,
/// `a0 · c0 / (2 E0) · g(E; E0, σ)`. Parameters `[c0]`.
#[derive(Debug, Clone)]
pub struct GaussianCoupling {
    energies: Vec<f64>,
    sigma: f64,
    a0: f64,
    e0: f64,
}

impl GaussianCoupling {
    /// Evaluate at `energies`, with `a0` and `e0` taken from a previous fit.
    pub fn new(energies: Vec<f64>, sigma: f64, a0: f64, e0: f64) -> Self {
        Self {
            energies,
            sigma,
            a0,
            e0,
        }
    }
}

impl FitModel for GaussianCoupling {
    fn parameter_names(&self) -> &[&'static str] {
        &["c0"]
    }

    fn data_len(&self) -> usize {
        self.energies.len()
    }

    fn evaluate(&self, params: &DVector<f64>) -> DVector<f64> {
        let c0 = params[0];
        let prefactor = self.a0 * c0 / (2.0 * self.e0);
        DVector::from_iterator(
            self.energies.len(),
            self.energies
                .iter()
                .map(|&e| prefactor * boundary_gaussian(e, self.e0, self.sigma)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosh_is_symmetric() {
        let nt = 16;
        let model = Cosh::new(time_slices(0, nt + 1), nt);
        let values = model.evaluate(&DVector::from_row_slice(&[0.3, 2.0]));
        for t in 0..=nt {
            assert!((values[t] - values[nt - t]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_simultaneous_layout() {
        let model = CoshSinhSimultaneous::new(time_slices(2, 5), 16);
        assert_eq!(model.data_len(), 6);
        let values = model.evaluate(&DVector::from_row_slice(&[0.4, 2.0, 3.0]));
        let t: f64 = 2.0;
        let expected_ss = 4.0 * ((-0.4 * t).exp() + (-0.4 * (16.0 - t)).exp());
        let expected_sp = 6.0 * ((-0.4 * t).exp() - (-0.4 * (16.0 - t)).exp());
        assert!((values[0] - expected_ss).abs() < 1e-12);
        assert!((values[3] - expected_sp).abs() < 1e-12);
    }

    #[test]
    fn test_boundary_gaussian_normalised() {
        // Integrate over [0, 10] with the trapezoid rule.
        let (mu, sigma) = (0.2, 0.34);
        let n = 20_000;
        let h = 10.0 / n as f64;
        let integral: f64 = (0..=n)
            .map(|i| {
                let w = if i == 0 || i == n { 0.5 } else { 1.0 };
                w * boundary_gaussian(i as f64 * h, mu, sigma)
            })
            .sum::<f64>()
            * h;
        assert!((integral - 1.0).abs() < 1e-6, "integral = {}", integral);
    }

    #[test]
    fn test_coupling_matches_peak_when_equal() {
        // With c0 = a0 the coupling model equals the peak model.
        let energies = vec![0.5, 1.0, 1.5];
        let peak = GaussianPeak::new(energies.clone(), 0.34);
        let coupling = GaussianCoupling::new(energies, 0.34, 1.3, 1.02);
        let a = peak.evaluate(&DVector::from_row_slice(&[1.3, 1.02]));
        let b = coupling.evaluate(&DVector::from_row_slice(&[1.3]));
        for i in 0..3 {
            assert!((a[i] - b[i]).abs() < 1e-14);
        }
    }
}
