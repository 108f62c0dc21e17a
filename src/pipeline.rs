//! Main `Analysis` entry point and builder.

use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::{
    extract_energy_states, extract_exp_mass, extract_meson_mass, fit_spectral_density,
    meson_decay_constant, solve_gevp, GevpOptions, PlateauWindow, SimultaneousForm,
    SpectralDensitySet, SpectralFitConfig,
};
use crate::config::{Config, GevpConfig, SmearingLevels};
use crate::correlator::{BaryonOperator, Channel, CorrelatorSource, MesonChannel, Parity, Representation};
use crate::ensemble::{Ensemble, TrajectoryFilter};
use crate::error::{AnalysisError, Result};
use crate::fit::FitOptions;
use crate::result::{AnalysisReport, ObservableOutcome, ObservableValue};
use crate::statistics::AutocorrelationSummary;

/// One observable to extract from an ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservableRequest {
    /// Meson mass from a cosh fit of the smeared-smeared correlator.
    MesonMass(Representation, MesonChannel),
    /// Meson mass and decay matrix element from a simultaneous fit of the
    /// smeared-smeared and smeared-point correlators. The pseudoscalar uses
    /// the `ps-av` cross correlator as its smeared-point partner.
    DecayConstant(Representation, MesonChannel),
    /// Baryon mass of one parity from an exponential fit.
    BaryonMass(BaryonOperator, Parity),
    /// Energy levels from a GEVP over smearing levels.
    GevpSpectrum(Representation, MesonChannel),
}

impl ObservableRequest {
    /// Label used in reports and dumps.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObservableRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ObservableRequest::MesonMass(rep, channel)
            | ObservableRequest::DecayConstant(rep, channel) => {
                write!(f, "{}", Channel::Meson(rep, channel))
            }
            ObservableRequest::BaryonMass(op, parity) => write!(f, "{}", Channel::Baryon(op, parity)),
            ObservableRequest::GevpSpectrum(rep, channel) => {
                write!(f, "gevp_{}", Channel::Meson(rep, channel))
            }
        }
    }
}

/// Main entry point for an ensemble analysis.
///
/// Use the builder pattern to configure the run and list the observables.
///
/// # Example
///
/// ```ignore
/// use lattice_plateaus::{Analysis, ObservableRequest};
/// use lattice_plateaus::correlator::{MesonChannel, Representation};
///
/// let report = Analysis::new()
///     .bootstrap_samples(500)
///     .plateau(0, 10, 20)
///     .request(ObservableRequest::MesonMass(Representation::Fundamental, MesonChannel::Ps))
///     .run(&ensemble)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    config: Config,
    requests: Vec<ObservableRequest>,
}

impl Analysis {
    /// Create with default configuration and no requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from an existing configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            requests: Vec::new(),
        }
    }

    /// Create with a reduced replica count for quick checks.
    ///
    /// Settings:
    /// - 200 bootstrap replicas (vs 1000 default)
    /// - 100 minimiser iterations (vs 200 default)
    pub fn quick() -> Self {
        let mut config = Config {
            bootstrap_samples: 200,
            ..Config::default()
        };
        config.fit.minimizer.max_iterations = 100;
        Self::with_config(config)
    }

    /// Set bootstrap replicas per estimate.
    pub fn bootstrap_samples(mut self, n: usize) -> Self {
        self.config.bootstrap_samples = n;
        self
    }

    /// Restrict to trajectories accepted by `filter`.
    pub fn trajectory_filter(mut self, filter: TrajectoryFilter) -> Self {
        self.config.trajectory_filter = filter;
        self
    }

    /// Average `n` consecutive configurations before resampling.
    pub fn bin_size(mut self, n: usize) -> Self {
        self.config.bin_size = n;
        self
    }

    /// Set fit options.
    pub fn fit_options(mut self, options: FitOptions) -> Self {
        self.config.fit = options;
        self
    }

    /// Set the minimiser iteration cap.
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.config.fit.minimizer.max_iterations = n;
        self
    }

    /// Set the smeared source/sink level.
    pub fn smeared_level(mut self, level: usize) -> Self {
        self.config.smeared_level = level;
        self
    }

    /// Set the point sink level.
    pub fn point_level(mut self, level: usize) -> Self {
        self.config.point_level = level;
        self
    }

    /// Set the plateau window `[start, end)` of state `n`.
    ///
    /// States below `n` without a window stay unset. The window is checked
    /// when the analysis runs.
    pub fn plateau(mut self, n: usize, start: usize, end: usize) -> Self {
        if self.config.plateaus.len() <= n {
            self.config.plateaus.resize(n + 1, None);
        }
        self.config.plateaus[n] = Some(PlateauWindow { start, end });
        self
    }

    /// Enable the GEVP with reference slice `t0` over `levels`.
    pub fn gevp(mut self, t0: usize, levels: SmearingLevels) -> Self {
        let check_continuity = self.config.gevp.is_some_and(|g| g.check_continuity);
        self.config.gevp = Some(GevpConfig {
            t0,
            levels,
            check_continuity,
        });
        self
    }

    /// Run the GEVP level-continuity diagnostic.
    ///
    /// If no GEVP is configured yet this enables it with
    /// [`GevpConfig::default`]; a later [`gevp`](Self::gevp) call replaces
    /// t0 and the levels but keeps the flag.
    pub fn check_continuity(mut self, enabled: bool) -> Self {
        let gevp = self.config.gevp.get_or_insert_with(GevpConfig::default);
        gevp.check_continuity = enabled;
        self
    }

    /// Set spectral-density fit settings.
    pub fn spectral(mut self, spectral: SpectralFitConfig) -> Self {
        self.config.spectral = spectral;
        self
    }

    /// Add an observable.
    pub fn request(mut self, request: ObservableRequest) -> Self {
        self.requests.push(request);
        self
    }

    /// Add several observables.
    pub fn requests(mut self, requests: impl IntoIterator<Item = ObservableRequest>) -> Self {
        self.requests.extend(requests);
        self
    }

    /// Get the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Requested observables, in order.
    pub fn requested(&self) -> &[ObservableRequest] {
        &self.requests
    }

    fn source<'a>(&self, ensemble: &'a Ensemble) -> CorrelatorSource<'a> {
        CorrelatorSource::new(ensemble, self.config.bootstrap_samples)
            .with_filter(self.config.trajectory_filter.clone())
            .with_bin_size(self.config.bin_size)
    }

    /// Run every requested observable on `ensemble`.
    ///
    /// # Errors
    ///
    /// Only an invalid configuration fails the whole run. Failures of
    /// individual observables are logged and recorded as
    /// [`ObservableOutcome::Failed`].
    pub fn run(&self, ensemble: &Ensemble) -> Result<AnalysisReport> {
        self.config.validate()?;
        info!(
            "analysing ensemble {} ({} observables, {} replicas)",
            ensemble.name(),
            self.requests.len(),
            self.config.bootstrap_samples
        );

        let source = self.source(ensemble);
        let outcomes = self
            .requests
            .iter()
            .map(|request| {
                let name = request.name();
                match self.measure(&source, *request) {
                    Ok(value) => {
                        debug!("{name}: completed");
                        ObservableOutcome::Completed { name, value }
                    }
                    Err(reason) => {
                        warn!("{name} on {}: {reason}", ensemble.name());
                        ObservableOutcome::Failed { name, reason }
                    }
                }
            })
            .collect();

        let autocorrelation = self
            .requests
            .iter()
            .filter_map(|request| {
                self.autocorrelation(&source, *request)
                    .map(|summary| (request.name(), summary))
            })
            .collect();

        let kept = ensemble
            .trajectories()
            .iter()
            .filter(|&&t| self.config.trajectory_filter.accepts(t))
            .count();

        Ok(AnalysisReport {
            ensemble: ensemble.name().to_string(),
            params: ensemble.params().clone(),
            configurations: kept / self.config.bin_size,
            replicas: self.config.bootstrap_samples,
            outcomes,
            autocorrelation,
        })
    }

    /// Trajectory autocorrelation of the smeared-smeared correlator behind
    /// `request` at the start of the ground-state window (the first slice
    /// after t0 for a GEVP). `None` if the data or window are unavailable.
    fn autocorrelation(
        &self,
        source: &CorrelatorSource<'_>,
        request: ObservableRequest,
    ) -> Option<AutocorrelationSummary> {
        let smeared = self.config.smeared_level;
        let start = self.config.ground_window().map(|w| w.start);
        let (channel, level, slice) = match request {
            ObservableRequest::MesonMass(rep, channel) | ObservableRequest::DecayConstant(rep, channel) => {
                (Channel::Meson(rep, channel), smeared, start?)
            }
            ObservableRequest::BaryonMass(op, parity) => (Channel::Baryon(op, parity), smeared, start?),
            ObservableRequest::GevpSpectrum(rep, channel) => {
                let gevp = self.config.gevp?;
                let level = gevp.levels.levels().first().copied()?;
                (Channel::Meson(rep, channel), level, start.unwrap_or(gevp.t0 + 1))
            }
        };
        let summary = source.autocorrelation(channel, level, level, slice).ok()?;
        if summary.suggested_bin > 1 {
            warn!(
                "{request}: integrated autocorrelation time {:.2} at t = {}; bins of {} configurations suggested",
                summary.tau_int, summary.slice, summary.suggested_bin
            );
        }
        Some(summary)
    }

    fn ground_window(&self) -> Result<PlateauWindow> {
        self.config.ground_window().ok_or_else(|| {
            AnalysisError::InvalidConfig("no plateau window configured for E0".to_string())
        })
    }

    /// Extract one observable.
    pub fn measure(&self, source: &CorrelatorSource<'_>, request: ObservableRequest) -> Result<ObservableValue> {
        let nt = source.ensemble().params().nt;
        let smeared = self.config.smeared_level;
        let fit = &self.config.fit;

        match request {
            ObservableRequest::MesonMass(_, MesonChannel::PsAv)
            | ObservableRequest::DecayConstant(_, MesonChannel::PsAv) => Err(
                AnalysisError::InvalidConfig(format!("{request} is a cross correlator, not a mass channel")),
            ),

            ObservableRequest::MesonMass(rep, channel) => {
                let window = self.ground_window()?;
                let corr = source.meson(rep, channel, smeared, smeared)?;
                let fit = extract_meson_mass(&corr, &window, nt, fit)?;
                Ok(ObservableValue::Mass {
                    mass: fit.mass,
                    chi2_dof: fit.chi2_dof,
                    bound_hits: fit.fit.bound_hits,
                })
            }

            ObservableRequest::DecayConstant(rep, channel) => {
                let window = self.ground_window()?;
                let point = self.config.point_level;
                let css = source.meson(rep, channel, smeared, smeared)?;
                let (csp, form) = match channel {
                    MesonChannel::Ps => (
                        source.meson(rep, MesonChannel::PsAv, smeared, point)?,
                        SimultaneousForm::CoshSinh,
                    ),
                    _ => (
                        source.meson(rep, channel, smeared, point)?,
                        SimultaneousForm::Cosh,
                    ),
                };
                let fit = meson_decay_constant(&css, &csp, &window, nt, form, fit)?;
                Ok(ObservableValue::MatrixElement {
                    mass: fit.mass,
                    matrix_element: fit.matrix_element,
                    chi2_dof: fit.chi2_dof,
                    bound_hits: fit.fit.bound_hits,
                })
            }

            ObservableRequest::BaryonMass(op, parity) => {
                let window = self.ground_window()?;
                let corr = source.channel(Channel::Baryon(op, parity), smeared, smeared)?;
                let fit = extract_exp_mass(&corr, &window, fit)?;
                Ok(ObservableValue::Mass {
                    mass: fit.mass,
                    chi2_dof: fit.chi2_dof,
                    bound_hits: fit.fit.bound_hits,
                })
            }

            ObservableRequest::GevpSpectrum(rep, channel) => {
                let gevp = self.config.gevp.ok_or_else(|| {
                    AnalysisError::InvalidConfig(format!("{request} requested without GEVP settings"))
                })?;
                let matrix = source.meson_matrix(rep, channel, &gevp.levels.levels())?;
                let spectrum = solve_gevp(
                    &matrix,
                    &GevpOptions {
                        t0: gevp.t0,
                        check_continuity: gevp.check_continuity,
                    },
                )?;
                let states = extract_energy_states(&spectrum, &self.config.plateaus, fit)?;
                Ok(ObservableValue::Spectrum {
                    states,
                    crossings: spectrum.crossings,
                })
            }
        }
    }

    /// Fit a pair of smeared spectral densities with the configured settings.
    ///
    /// Spectral densities are reconstructed outside this crate, so they are
    /// passed in directly rather than read from an ensemble.
    pub fn fit_spectral(&self, name: &str, data: &SpectralDensitySet) -> ObservableOutcome {
        let name = name.to_string();
        match fit_spectral_density(data, &self.config.spectral, &self.config.fit) {
            Ok(fit) => ObservableOutcome::Completed {
                name,
                value: ObservableValue::SpectralPeak {
                    bound_hits: fit.bound_hits(),
                    amplitude: fit.amplitude,
                    energy: fit.energy,
                    coupling: fit.normalised_coupling,
                    sign_flipped: fit.sign_flipped,
                    chi2_dof: fit.peak.chi2_dof,
                },
            },
            Err(reason) => {
                warn!("{name}: {reason}");
                ObservableOutcome::Failed { name, reason }
            }
        }
    }
}
