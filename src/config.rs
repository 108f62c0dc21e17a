//! Configuration for an analysis run.

use serde::{Deserialize, Serialize};

use crate::analysis::{PlateauWindow, SpectralFitConfig};
use crate::constants::{BOOTSTRAP_SAMPLE_COUNT, DEFAULT_SMEARED_LEVEL, POINT_LEVEL};
use crate::ensemble::TrajectoryFilter;
use crate::error::{AnalysisError, Result};
use crate::fit::FitOptions;

/// Inclusive range of smearing levels `min..=max` in steps of `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmearingLevels {
    /// First level.
    pub min: usize,
    /// Last level (included when reachable from `min`).
    pub max: usize,
    /// Spacing between levels.
    pub step: usize,
}

impl Default for SmearingLevels {
    fn default() -> Self {
        Self {
            min: 0,
            max: DEFAULT_SMEARED_LEVEL,
            step: 40,
        }
    }
}

impl SmearingLevels {
    /// The levels in increasing order.
    pub fn levels(&self) -> Vec<usize> {
        if self.step == 0 || self.min > self.max {
            return Vec::new();
        }
        (self.min..=self.max).step_by(self.step).collect()
    }
}

/// GEVP settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GevpConfig {
    /// Reference time slice.
    pub t0: usize,
    /// Smearing levels spanning the operator basis.
    pub levels: SmearingLevels,
    /// Run the eigenvector-overlap continuity diagnostic.
    pub check_continuity: bool,
}

impl Default for GevpConfig {
    fn default() -> Self {
        Self {
            t0: 1,
            levels: SmearingLevels::default(),
            check_continuity: false,
        }
    }
}

/// Configuration options for [`Analysis`](crate::Analysis).
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bootstrap replicas per ensemble (default: 1000).
    pub bootstrap_samples: usize,

    /// Which trajectories enter the analysis.
    pub trajectory_filter: TrajectoryFilter,

    /// Consecutive configurations averaged before resampling (default: 1).
    pub bin_size: usize,

    /// Minimiser and bound settings for every fit.
    pub fit: FitOptions,

    /// Smearing level of the smeared source and sink (default: 80).
    pub smeared_level: usize,

    /// Smearing level of the point sink (default: 0).
    pub point_level: usize,

    /// Plateau window of the n-th state; index 0 is the ground state used by
    /// single-state fits. `None` leaves a GEVP level unfitted.
    pub plateaus: Vec<Option<PlateauWindow>>,

    /// GEVP settings; `None` when no spectrum is requested.
    pub gevp: Option<GevpConfig>,

    /// Spectral-density fit settings.
    pub spectral: SpectralFitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootstrap_samples: BOOTSTRAP_SAMPLE_COUNT,
            trajectory_filter: TrajectoryFilter::default(),
            bin_size: 1,
            fit: FitOptions::default(),
            smeared_level: DEFAULT_SMEARED_LEVEL,
            point_level: POINT_LEVEL,
            plateaus: Vec::new(),
            gevp: None,
            spectral: SpectralFitConfig::default(),
        }
    }
}

fn invalid(message: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidConfig(message.into())
}

impl Config {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| invalid(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Ground-state plateau window, if configured.
    pub fn ground_window(&self) -> Option<PlateauWindow> {
        self.plateaus.first().copied().flatten()
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_samples < 2 {
            return Err(invalid(format!(
                "bootstrap_samples must be at least 2, got {}",
                self.bootstrap_samples
            )));
        }
        if self.bin_size == 0 {
            return Err(invalid("bin_size must be positive"));
        }

        let filter = &self.trajectory_filter;
        if filter.step == 0 {
            return Err(invalid("trajectory filter step must be positive"));
        }
        if let (Some(min), Some(max)) = (filter.min, filter.max) {
            if min > max {
                return Err(invalid(format!(
                    "trajectory filter range [{min}, {max}] is empty"
                )));
            }
        }

        let minimizer = &self.fit.minimizer;
        if minimizer.max_iterations == 0 {
            return Err(invalid("fit max_iterations must be positive"));
        }
        if !(minimizer.tolerance > 0.0 && minimizer.jacobian_step > 0.0) {
            return Err(invalid("fit tolerance and jacobian step must be positive"));
        }

        for (state, window) in self.plateaus.iter().enumerate() {
            let Some(window) = window else { continue };
            window
                .validate()
                .map_err(|_| invalid(format!("plateau window of E{state} is empty")))?;
            if let Some(gevp) = &self.gevp {
                if window.start <= gevp.t0 {
                    return Err(invalid(format!(
                        "plateau window of E{state} starts at {} but GEVP t0 = {}",
                        window.start, gevp.t0
                    )));
                }
            }
        }

        if let Some(gevp) = &self.gevp {
            if gevp.levels.levels().is_empty() {
                return Err(invalid(format!(
                    "GEVP smearing levels {}..={} step {} are empty",
                    gevp.levels.min, gevp.levels.max, gevp.levels.step
                )));
            }
        }

        let spectral = &self.spectral;
        if !(spectral.sigma > 0.0) {
            return Err(invalid("spectral sigma must be positive"));
        }
        if spectral.energy_bound.lower >= spectral.energy_bound.upper {
            return Err(invalid("spectral energy bound is empty"));
        }
        if spectral.spatial_extent == 0 {
            return Err(invalid("spectral spatial extent must be positive"));
        }
        Ok(())
    }
}
