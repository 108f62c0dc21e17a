//! Plateau fits: masses, matrix elements and GEVP energy levels.
//!
//! Every fit runs over a half-open window `[start, end)` of time slices
//! chosen where the effective mass has reached its plateau.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::correlator::energy_guess;
use crate::error::{AnalysisError, Result};
use crate::fit::{
    fit_bootstrap, time_slices, Bound, BoundHit, Cosh, CoshSimultaneous, CoshSinhSimultaneous, ExpDecay,
    FitModel, FitOptions, FitResult,
};
use crate::statistics::BootstrapSampleSet;
use crate::types::{Correlator, ScalarSamples};

use super::gevp::GevpSpectrum;

/// Starting energy when the effective mass gives no usable guess.
const FALLBACK_ENERGY: f64 = 0.5;

/// Half-open window `[start, end)` of time slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateauWindow {
    /// First slice included.
    pub start: usize,
    /// First slice excluded.
    pub end: usize,
}

impl PlateauWindow {
    /// Window `[start, end)`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` unless `start < end`.
    pub fn new(start: usize, end: usize) -> Result<Self> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    /// Check `start < end`.
    pub fn validate(&self) -> Result<()> {
        if self.start < self.end {
            Ok(())
        } else {
            Err(AnalysisError::InvalidConfig(format!(
                "plateau window [{}, {}) is empty",
                self.start, self.end
            )))
        }
    }

    /// Number of slices in the window.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True for an empty window.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The slices as floats, for model evaluation.
    pub fn times(&self) -> Vec<f64> {
        time_slices(self.start, self.end)
    }
}

/// Energy and amplitude from a single-correlator plateau fit.
#[derive(Debug, Clone)]
pub struct MassFit {
    /// Fitted energy.
    pub mass: ScalarSamples,
    /// Fitted amplitude.
    pub amplitude: ScalarSamples,
    /// Rounded chi-square per degree of freedom of the full-data fit.
    pub chi2_dof: f64,
    /// The underlying fit.
    pub fit: FitResult,
}

/// Energy and decay matrix element from a simultaneous fit.
#[derive(Debug, Clone)]
pub struct DecayConstantFit {
    /// Fitted energy.
    pub mass: ScalarSamples,
    /// `B · √(2m)` per replica.
    pub matrix_element: ScalarSamples,
    /// Rounded chi-square per degree of freedom of the full-data fit.
    pub chi2_dof: f64,
    /// The underlying fit.
    pub fit: FitResult,
}

/// Time dependence of the smeared-point correlator in a simultaneous fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimultaneousForm {
    /// Point sink with opposite time-reversal parity (pseudoscalar with
    /// temporal axial current).
    CoshSinh,
    /// Point sink with the same time-reversal parity.
    Cosh,
}

fn parameter(fit: &FitResult, name: &str) -> Result<ScalarSamples> {
    fit.parameter(name)
        .ok_or_else(|| AnalysisError::InvalidConfig(format!("fit has no parameter `{name}`")))
}

fn windowed(corr: &Correlator, window: &PlateauWindow) -> Result<Correlator> {
    window.validate()?;
    corr.window(window.start, window.end)
}

fn mass_fit<M: FitModel>(
    model: &M,
    target: &Correlator,
    initial: [f64; 2],
    options: &FitOptions,
) -> Result<MassFit> {
    let fit = fit_bootstrap(
        model,
        target,
        &initial,
        &[Bound::at_least(0.0), Bound::unbounded()],
        options,
    )?;
    Ok(MassFit {
        mass: parameter(&fit, "E")?,
        amplitude: parameter(&fit, "A")?,
        chi2_dof: fit.chi2_dof,
        fit,
    })
}

fn cosh_profile(energy: f64, t: f64, nt: f64) -> f64 {
    (-energy * t).exp() + (-energy * (nt - t)).exp()
}

/// Meson mass from a cosh fit of a folded correlator.
///
/// # Arguments
///
/// * `corr` - Folded correlator
/// * `window` - Fit window
/// * `nt` - Temporal extent of the lattice
/// * `options` - Fit settings
pub fn extract_meson_mass(
    corr: &Correlator,
    window: &PlateauWindow,
    nt: usize,
    options: &FitOptions,
) -> Result<MassFit> {
    let target = windowed(corr, window)?;
    let energy = energy_guess(corr, window.start, window.end, FALLBACK_ENERGY);
    let t = window.start as f64;
    let amplitude = corr.mean()[window.start] / cosh_profile(energy, t, nt as f64);
    mass_fit(
        &Cosh::new(window.times(), nt),
        &target,
        [energy, amplitude],
        options,
    )
}

/// Energy from a single-exponential fit (baryons, GEVP principal correlators).
pub fn extract_exp_mass(
    corr: &Correlator,
    window: &PlateauWindow,
    options: &FitOptions,
) -> Result<MassFit> {
    let target = windowed(corr, window)?;
    let energy = energy_guess(corr, window.start, window.end, FALLBACK_ENERGY);
    let amplitude = corr.mean()[window.start] * (energy * window.start as f64).exp();
    mass_fit(
        &ExpDecay::new(window.times()),
        &target,
        [energy, amplitude],
        options,
    )
}

/// Mass and matrix element from a simultaneous fit of a smeared-smeared
/// correlator `css` and a smeared-point correlator `csp` over one window.
///
/// The matrix element is reported as `B · √(2m)` per replica.
pub fn meson_decay_constant(
    css: &Correlator,
    csp: &Correlator,
    window: &PlateauWindow,
    nt: usize,
    form: SimultaneousForm,
    options: &FitOptions,
) -> Result<DecayConstantFit> {
    let target = windowed(css, window)?.concat(&windowed(csp, window)?)?;

    let t = window.start as f64;
    let nt_f = nt as f64;
    let energy = energy_guess(css, window.start, window.end, FALLBACK_ENERGY);
    let a = (css.mean()[window.start].abs() / cosh_profile(energy, t, nt_f))
        .sqrt()
        .max(f64::MIN_POSITIVE);
    let sp_profile = match form {
        SimultaneousForm::CoshSinh => (-energy * t).exp() - (-energy * (nt_f - t)).exp(),
        SimultaneousForm::Cosh => cosh_profile(energy, t, nt_f),
    };
    let b = if sp_profile != 0.0 {
        csp.mean()[window.start] / (a * sp_profile)
    } else {
        1.0
    };
    let initial = [energy, a, b];
    let bounds = [Bound::at_least(0.0), Bound::unbounded(), Bound::unbounded()];

    let fit = match form {
        SimultaneousForm::CoshSinh => fit_bootstrap(
            &CoshSinhSimultaneous::new(window.times(), nt),
            &target,
            &initial,
            &bounds,
            options,
        )?,
        SimultaneousForm::Cosh => fit_bootstrap(
            &CoshSimultaneous::new(window.times(), nt),
            &target,
            &initial,
            &bounds,
            options,
        )?,
    };

    let mass = parameter(&fit, "E")?;
    let element = parameter(&fit, "B")?;
    let matrix_element = element.zip_with(&mass, |b, m| b * (2.0 * m).sqrt());

    Ok(DecayConstantFit {
        mass,
        matrix_element,
        chi2_dof: fit.chi2_dof,
        fit,
    })
}

/// Energy of one GEVP level, or NaN when no window was configured.
#[derive(Debug, Clone)]
pub struct StateEnergy {
    /// Level rank.
    pub level: usize,
    /// Fitted energy (all NaN without a window).
    pub mass: ScalarSamples,
    /// Chi-square per degree of freedom (NaN without a window).
    pub chi2_dof: f64,
    /// Full-data parameters of the level fit that ended on a bound.
    pub bound_hits: Vec<BoundHit>,
}

/// Fit every principal correlator of `spectrum` over its window.
///
/// Levels without a window (or beyond the end of `windows`) yield NaN
/// energies. A window must start after the GEVP reference slice.
pub fn extract_energy_states(
    spectrum: &GevpSpectrum,
    windows: &[Option<PlateauWindow>],
    options: &FitOptions,
) -> Result<Vec<StateEnergy>> {
    spectrum
        .levels
        .iter()
        .enumerate()
        .map(|(level, corr)| match windows.get(level).copied().flatten() {
            None => {
                warn!("no plateau window for GEVP level {level}; reporting NaN");
                Ok(StateEnergy {
                    level,
                    mass: BootstrapSampleSet::nan(corr.replica_count()),
                    chi2_dof: f64::NAN,
                    bound_hits: Vec::new(),
                })
            }
            Some(window) if window.start <= spectrum.t0 => Err(AnalysisError::InvalidConfig(format!(
                "window for level {level} starts at {} but GEVP t0 = {}",
                window.start, spectrum.t0
            ))),
            Some(window) => {
                let fit = extract_exp_mass(corr, &window, options)?;
                Ok(StateEnergy {
                    level,
                    mass: fit.mass,
                    chi2_dof: fit.chi2_dof,
                    bound_hits: fit.fit.bound_hits,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    #[test]
    fn test_window_validation() {
        assert!(PlateauWindow::new(5, 5).is_err());
        assert!(PlateauWindow::new(6, 5).is_err());
        let window = PlateauWindow::new(3, 7).unwrap();
        assert_eq!(window.len(), 4);
        assert_eq!(window.times(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_missing_windows_give_nan() {
        let corr = BootstrapSampleSet::new(DVector::from_element(6, 1.0), vec![DVector::from_element(6, 1.0); 4]);
        let spectrum = GevpSpectrum {
            t0: 1,
            levels: vec![corr.clone(), corr],
            crossings: Vec::new(),
        };
        let states = extract_energy_states(&spectrum, &[None], &FitOptions::default()).unwrap();
        assert_eq!(states.len(), 2);
        assert!(states.iter().all(|s| s.mass.mean().is_nan() && s.chi2_dof.is_nan()));
        assert_eq!(states[1].mass.replica_count(), 4);
    }

    #[test]
    fn test_window_before_t0_rejected() {
        let corr = BootstrapSampleSet::new(DVector::from_element(6, 1.0), vec![DVector::from_element(6, 1.0); 4]);
        let spectrum = GevpSpectrum {
            t0: 2,
            levels: vec![corr],
            crossings: Vec::new(),
        };
        let windows = [Some(PlateauWindow { start: 2, end: 5 })];
        assert!(matches!(
            extract_energy_states(&spectrum, &windows, &FitOptions::default()),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }
}
