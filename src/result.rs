//! Result types for an analysis run.

use crate::analysis::{LevelCrossing, StateEnergy};
use crate::ensemble::EnsembleParams;
use crate::error::AnalysisError;
use crate::fit::BoundHit;
use crate::statistics::AutocorrelationSummary;
use crate::types::ScalarSamples;

/// The estimate produced by one observable.
#[derive(Debug, Clone)]
pub enum ObservableValue {
    /// Ground-state energy from a single-correlator fit.
    Mass {
        /// Fitted energy.
        mass: ScalarSamples,
        /// Chi-square per degree of freedom, rounded.
        chi2_dof: f64,
        /// Full-data parameters that ended on a bound.
        bound_hits: Vec<BoundHit>,
    },

    /// Energy and decay matrix element from a simultaneous fit.
    MatrixElement {
        /// Fitted energy.
        mass: ScalarSamples,
        /// `B · √(2m)` per replica.
        matrix_element: ScalarSamples,
        /// Chi-square per degree of freedom, rounded.
        chi2_dof: f64,
        /// Full-data parameters that ended on a bound.
        bound_hits: Vec<BoundHit>,
    },

    /// GEVP energy levels, ranked from the ground state up.
    Spectrum {
        /// One entry per level; NaN for levels without a plateau window.
        states: Vec<StateEnergy>,
        /// Level swaps flagged by the continuity check.
        crossings: Vec<LevelCrossing>,
    },

    /// Peak and coupling from a pair of smeared spectral densities.
    SpectralPeak {
        /// Peak amplitude a0.
        amplitude: ScalarSamples,
        /// Peak energy E0.
        energy: ScalarSamples,
        /// Coupling normalised as `2·c0/√V`.
        coupling: ScalarSamples,
        /// Whether the data were sign-flipped before fitting.
        sign_flipped: bool,
        /// Chi-square per degree of freedom of the peak fit.
        chi2_dof: f64,
        /// Parameters of either stage that ended on a bound.
        bound_hits: Vec<BoundHit>,
    },
}

impl ObservableValue {
    /// Every parameter that ended on a bound, GEVP levels included.
    pub fn bound_hits(&self) -> Vec<&BoundHit> {
        match self {
            ObservableValue::Mass { bound_hits, .. }
            | ObservableValue::MatrixElement { bound_hits, .. }
            | ObservableValue::SpectralPeak { bound_hits, .. } => bound_hits.iter().collect(),
            ObservableValue::Spectrum { states, .. } => {
                states.iter().flat_map(|s| s.bound_hits.iter()).collect()
            }
        }
    }

    /// True if any parameter is on a bound.
    pub fn hits_bound(&self) -> bool {
        !self.bound_hits().is_empty()
    }
}

/// Outcome of one requested observable.
///
/// A failure of one observable never aborts the others.
#[derive(Debug, Clone)]
pub enum ObservableOutcome {
    /// Analysis completed.
    Completed {
        /// Observable label (e.g. `f_ps`, `gevp_as_v`).
        name: String,
        /// The estimate.
        value: ObservableValue,
    },

    /// Analysis failed; the reason is kept for reporting.
    Failed {
        /// Observable label.
        name: String,
        /// What went wrong.
        reason: AnalysisError,
    },
}

impl ObservableOutcome {
    /// Observable label.
    pub fn name(&self) -> &str {
        match self {
            ObservableOutcome::Completed { name, .. } | ObservableOutcome::Failed { name, .. } => {
                name
            }
        }
    }

    /// The estimate, if completed.
    pub fn value(&self) -> Option<&ObservableValue> {
        match self {
            ObservableOutcome::Completed { value, .. } => Some(value),
            ObservableOutcome::Failed { .. } => None,
        }
    }

    /// The failure reason, if failed.
    pub fn failure(&self) -> Option<&AnalysisError> {
        match self {
            ObservableOutcome::Completed { .. } => None,
            ObservableOutcome::Failed { reason, .. } => Some(reason),
        }
    }

    /// True if completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, ObservableOutcome::Completed { .. })
    }
}

/// Everything one run of [`Analysis`](crate::Analysis) produced for an ensemble.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Ensemble name.
    pub ensemble: String,
    /// Ensemble parameters.
    pub params: EnsembleParams,
    /// Configurations left after filtering and binning.
    pub configurations: usize,
    /// Bootstrap replicas per estimate.
    pub replicas: usize,
    /// One outcome per request, in request order.
    pub outcomes: Vec<ObservableOutcome>,
    /// Trajectory autocorrelation of the correlator behind each observable,
    /// at the start of its fit window. Observables whose data could not be
    /// read have no entry.
    pub autocorrelation: Vec<(String, AutocorrelationSummary)>,
}

impl AnalysisReport {
    /// The first outcome labelled `name`.
    pub fn get(&self, name: &str) -> Option<&ObservableOutcome> {
        self.outcomes.iter().find(|o| o.name() == name)
    }

    /// Completed outcomes.
    pub fn completed(&self) -> impl Iterator<Item = (&str, &ObservableValue)> {
        self.outcomes.iter().filter_map(|o| match o {
            ObservableOutcome::Completed { name, value } => Some((name.as_str(), value)),
            ObservableOutcome::Failed { .. } => None,
        })
    }

    /// Failed outcomes with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &AnalysisError)> {
        self.outcomes.iter().filter_map(|o| match o {
            ObservableOutcome::Failed { name, reason } => Some((name.as_str(), reason)),
            ObservableOutcome::Completed { .. } => None,
        })
    }

    /// True when every observable completed.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(ObservableOutcome::is_completed)
    }

    /// Autocorrelation summary of the observable labelled `name`.
    pub fn autocorrelation(&self, name: &str) -> Option<&AutocorrelationSummary> {
        self.autocorrelation
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, summary)| summary)
    }

    /// Largest bin size suggested by any observable (1 if none).
    pub fn suggested_bin_size(&self) -> usize {
        self.autocorrelation
            .iter()
            .map(|(_, summary)| summary.suggested_bin)
            .max()
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::BootstrapSampleSet;

    fn report() -> AnalysisReport {
        AnalysisReport {
            ensemble: "M1".to_string(),
            params: EnsembleParams {
                beta: 6.5,
                m_f: -0.71,
                m_as: -1.01,
                nt: 48,
                ns: 20,
                epsilon: 0.2,
            },
            configurations: 100,
            replicas: 10,
            outcomes: vec![
                ObservableOutcome::Completed {
                    name: "f_ps".to_string(),
                    value: ObservableValue::Mass {
                        mass: BootstrapSampleSet::new(0.4, vec![0.4; 10]),
                        chi2_dof: 1.1,
                        bound_hits: Vec::new(),
                    },
                },
                ObservableOutcome::Failed {
                    name: "as_v".to_string(),
                    reason: AnalysisError::MissingChannel {
                        key: "source_N80_sink_N80/DIQUARK g1".to_string(),
                    },
                },
            ],
            autocorrelation: vec![(
                "f_ps".to_string(),
                AutocorrelationSummary {
                    slice: 8,
                    lag1: 0.4,
                    tau_int: 1.3,
                    suggested_bin: 3,
                },
            )],
        }
    }

    #[test]
    fn test_report_partitions_outcomes() {
        let report = report();
        assert!(!report.is_complete());
        assert_eq!(report.completed().count(), 1);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "as_v");
        assert!(report.get("f_ps").is_some_and(ObservableOutcome::is_completed));
        assert!(report.get("as_v").and_then(ObservableOutcome::failure).is_some());
        assert!(report.get("lambda_even").is_none());
        assert_eq!(report.autocorrelation("f_ps").map(|a| a.slice), Some(8));
        assert!(report.autocorrelation("as_v").is_none());
        assert_eq!(report.suggested_bin_size(), 3);
    }

    #[test]
    fn test_bound_hits_collected_from_levels() {
        let hit = BoundHit {
            parameter: "E".to_string(),
            value: 0.0,
            bound: 0.0,
        };
        let value = ObservableValue::Spectrum {
            states: vec![
                StateEnergy {
                    level: 0,
                    mass: BootstrapSampleSet::new(0.5, vec![0.5; 3]),
                    chi2_dof: 1.0,
                    bound_hits: Vec::new(),
                },
                StateEnergy {
                    level: 1,
                    mass: BootstrapSampleSet::new(0.0, vec![0.0; 3]),
                    chi2_dof: 4.0,
                    bound_hits: vec![hit.clone()],
                },
            ],
            crossings: Vec::new(),
        };
        assert!(value.hits_bound());
        assert_eq!(value.bound_hits(), vec![&hit]);

        let report = report();
        assert!(!report.get("f_ps").and_then(ObservableOutcome::value).unwrap().hits_bound());
    }
}
