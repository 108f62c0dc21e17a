//! Two-stage fits of smeared spectral densities.
//!
//! The primary density (a diagonal correlator's spectral function) fixes
//! the amplitude and energy of the lowest state; the secondary density (an
//! off-diagonal one) then yields the coupling of a second operator to that
//! state with amplitude and energy held fixed.

use log::info;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PEAK_WIDTH, SPECTRAL_SIGN_INDEX};
use crate::error::{AnalysisError, Result};
use crate::fit::{fit_bootstrap, Bound, BoundHit, FitOptions, FitResult, GaussianCoupling, GaussianPeak};
use crate::statistics::BootstrapSampleSet;
use crate::types::{Correlator, ScalarSamples};

/// Bootstrap replicas of two smeared spectral densities on a common energy grid.
#[derive(Debug, Clone)]
pub struct SpectralDensitySet {
    energies: Vec<f64>,
    primary: Correlator,
    secondary: Correlator,
}

impl SpectralDensitySet {
    /// Build from per-replica densities; the point estimate of each channel
    /// is its replica average.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if any replica does not match the energy grid or the
    /// two channels differ in replica count.
    pub fn new(
        energies: Vec<f64>,
        primary: Vec<DVector<f64>>,
        secondary: Vec<DVector<f64>>,
    ) -> Result<Self> {
        let primary = BootstrapSampleSet::from_replicas(primary)?;
        let secondary = BootstrapSampleSet::from_replicas(secondary)?;
        if primary.len() != energies.len() || secondary.len() != energies.len() {
            return Err(AnalysisError::shape(
                "spectral density grid",
                energies.len(),
                format!("{} and {}", primary.len(), secondary.len()),
            ));
        }
        if primary.replica_count() != secondary.replica_count() {
            return Err(AnalysisError::shape(
                "spectral density replicas",
                primary.replica_count(),
                secondary.replica_count(),
            ));
        }
        Ok(Self {
            energies,
            primary,
            secondary,
        })
    }

    /// Energy grid.
    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    /// Primary (diagonal) density.
    pub fn primary(&self) -> &Correlator {
        &self.primary
    }

    /// Secondary (mixed) density.
    pub fn secondary(&self) -> &Correlator {
        &self.secondary
    }

    /// Flip the sign of every replica of both channels if the averaged
    /// primary density at `index` is negative.
    ///
    /// Returns the (possibly flipped) set and whether a flip happened.
    pub fn with_sign_convention(&self, index: usize) -> Result<(Self, bool)> {
        if index >= self.energies.len() {
            return Err(AnalysisError::InvalidConfig(format!(
                "sign index {index} outside the energy grid of {} points",
                self.energies.len()
            )));
        }
        if self.primary.mean()[index] >= 0.0 {
            return Ok((self.clone(), false));
        }
        info!("primary spectral density negative at index {index}; flipping sign");
        Ok((
            Self {
                energies: self.energies.clone(),
                primary: -&self.primary,
                secondary: -&self.secondary,
            },
            true,
        ))
    }
}

/// Settings of the two-stage spectral fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralFitConfig {
    /// Width of the Gaussian smearing kernel.
    pub sigma: f64,
    /// Energy index checked for the sign convention.
    pub sign_index: usize,
    /// Bound on the peak energy.
    pub energy_bound: Bound,
    /// Starting amplitude.
    pub initial_amplitude: f64,
    /// Starting peak energy (projected into `energy_bound`).
    pub initial_energy: f64,
    /// Starting coupling.
    pub initial_coupling: f64,
    /// Spatial extent used to normalise the coupling.
    pub spatial_extent: usize,
}

impl Default for SpectralFitConfig {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_PEAK_WIDTH,
            sign_index: SPECTRAL_SIGN_INDEX,
            energy_bound: Bound::new(0.97, 1.1),
            initial_amplitude: 1.0,
            initial_energy: 0.75,
            initial_coupling: 0.01,
            spatial_extent: 20,
        }
    }
}

/// Result of the two-stage spectral fit.
#[derive(Debug, Clone)]
pub struct SpectralFit {
    /// Whether the data were sign-flipped before fitting.
    pub sign_flipped: bool,
    /// Stage one: amplitude and energy.
    pub peak: FitResult,
    /// Stage two: coupling.
    pub coupling: FitResult,
    /// Peak amplitude a0.
    pub amplitude: ScalarSamples,
    /// Peak energy E0.
    pub energy: ScalarSamples,
    /// Coupling normalised as `2·c0/√V`.
    pub normalised_coupling: ScalarSamples,
}

impl SpectralFit {
    /// Parameters of either stage that ended on a bound.
    pub fn bound_hits(&self) -> Vec<BoundHit> {
        self.peak
            .bound_hits
            .iter()
            .chain(&self.coupling.bound_hits)
            .cloned()
            .collect()
    }
}

fn named(fit: &FitResult, name: &str) -> Result<ScalarSamples> {
    fit.parameter(name)
        .ok_or_else(|| AnalysisError::InvalidConfig(format!("fit has no parameter `{name}`")))
}

/// Run the sign convention and both fit stages.
pub fn fit_spectral_density(
    data: &SpectralDensitySet,
    config: &SpectralFitConfig,
    options: &FitOptions,
) -> Result<SpectralFit> {
    let (data, sign_flipped) = data.with_sign_convention(config.sign_index)?;

    let peak_model = GaussianPeak::new(data.energies().to_vec(), config.sigma);
    let peak = fit_bootstrap(
        &peak_model,
        data.primary(),
        &[config.initial_amplitude, config.initial_energy],
        &[Bound::unbounded(), config.energy_bound],
        options,
    )?;

    let a0 = peak.param_mean[0];
    let e0 = peak.param_mean[1];
    if !(a0.is_finite() && e0.is_finite()) {
        return Err(AnalysisError::Convergence {
            iterations: options.minimizer.max_iterations,
            chi2: f64::NAN,
        });
    }

    let coupling_model = GaussianCoupling::new(data.energies().to_vec(), config.sigma, a0, e0);
    let coupling = fit_bootstrap(
        &coupling_model,
        data.secondary(),
        &[config.initial_coupling],
        &[],
        options,
    )?;

    let volume = (config.spatial_extent as f64).powi(3);
    let normalised_coupling = named(&coupling, "c0")? * (2.0 / volume.sqrt());

    Ok(SpectralFit {
        sign_flipped,
        amplitude: named(&peak, "a0")?,
        energy: named(&peak, "E0")?,
        normalised_coupling,
        peak,
        coupling,
    })
}
