//! Ensembles of gauge configurations and their raw correlator measurements.
//!
//! An [`Ensemble`] is an immutable, in-memory container: reading it from
//! disk is the caller's business. Raw correlators are stored as
//! (configuration x time) matrices keyed by their measurement path.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Relative tolerance used when matching floating-point ensemble parameters.
const PARAM_TOLERANCE: f64 = 1e-9;

/// Physical parameters identifying an ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleParams {
    /// Inverse gauge coupling.
    pub beta: f64,
    /// Bare mass of the fundamental fermions.
    pub m_f: f64,
    /// Bare mass of the antisymmetric fermions.
    pub m_as: f64,
    /// Temporal extent.
    pub nt: usize,
    /// Spatial extent.
    pub ns: usize,
    /// Wuppertal smearing step size.
    pub epsilon: f64,
}

impl EnsembleParams {
    /// Spatial volume `Ns³`.
    pub fn spatial_volume(&self) -> f64 {
        (self.ns as f64).powi(3)
    }
}

/// Selection of configurations by trajectory index.
///
/// A trajectory is kept when it lies in `[min, max]` (either end open when
/// `None`) and its offset from `min` (or from zero) is a multiple of `step`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryFilter {
    /// Lowest trajectory to keep.
    pub min: Option<u64>,
    /// Highest trajectory to keep.
    pub max: Option<u64>,
    /// Keep every `step`-th trajectory.
    pub step: u64,
}

impl Default for TrajectoryFilter {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            step: 1,
        }
    }
}

impl TrajectoryFilter {
    /// Whether `trajectory` passes the filter.
    pub fn accepts(&self, trajectory: u64) -> bool {
        if self.min.is_some_and(|min| trajectory < min) {
            return false;
        }
        if self.max.is_some_and(|max| trajectory > max) {
            return false;
        }
        let origin = self.min.unwrap_or(0);
        (trajectory - origin) % self.step.max(1) == 0
    }
}

/// Indices (into `trajectories`) of the configurations that pass `filter`.
pub fn filter_configurations(trajectories: &[u64], filter: &TrajectoryFilter) -> Vec<usize> {
    trajectories
        .iter()
        .enumerate()
        .filter(|(_, &traj)| filter.accepts(traj))
        .map(|(index, _)| index)
        .collect()
}

/// An ensemble with its raw correlator measurements.
#[derive(Debug, Clone)]
pub struct Ensemble {
    name: String,
    params: EnsembleParams,
    trajectories: Vec<u64>,
    correlators: BTreeMap<String, DMatrix<f64>>,
}

impl Ensemble {
    /// Create an ensemble without measurements.
    pub fn new(name: impl Into<String>, params: EnsembleParams, trajectories: Vec<u64>) -> Self {
        Self {
            name: name.into(),
            params,
            trajectories,
            correlators: BTreeMap::new(),
        }
    }

    /// Add a raw correlator (configuration x time).
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the row count differs from the number of
    /// trajectories or the column count differs from `Nt`.
    pub fn with_correlator(mut self, key: impl Into<String>, data: DMatrix<f64>) -> Result<Self> {
        let key = key.into();
        if data.nrows() != self.trajectories.len() {
            return Err(AnalysisError::shape(
                format!("configurations of `{key}`"),
                self.trajectories.len(),
                data.nrows(),
            ));
        }
        if data.ncols() != self.params.nt {
            return Err(AnalysisError::shape(
                format!("time extent of `{key}`"),
                self.params.nt,
                data.ncols(),
            ));
        }
        self.correlators.insert(key, data);
        Ok(self)
    }

    /// Ensemble name (also the bootstrap seed source).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical parameters.
    pub fn params(&self) -> &EnsembleParams {
        &self.params
    }

    /// Trajectory labels, one per configuration.
    pub fn trajectories(&self) -> &[u64] {
        &self.trajectories
    }

    /// Number of configurations.
    pub fn configuration_count(&self) -> usize {
        self.trajectories.len()
    }

    /// Measurement keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.correlators.keys().map(String::as_str)
    }

    /// Whether a measurement is present.
    pub fn contains(&self, key: &str) -> bool {
        self.correlators.contains_key(key)
    }

    /// Raw correlator for `key`.
    ///
    /// # Errors
    ///
    /// `MissingChannel` if absent, `EmptyChannel` if it holds no data.
    pub fn correlator(&self, key: &str) -> Result<&DMatrix<f64>> {
        let data = self
            .correlators
            .get(key)
            .ok_or_else(|| AnalysisError::MissingChannel {
                key: key.to_string(),
            })?;
        if data.is_empty() {
            return Err(AnalysisError::EmptyChannel {
                key: key.to_string(),
            });
        }
        Ok(data)
    }

    /// Raw correlator restricted to the configurations accepted by `filter`.
    pub fn filtered_correlator(&self, key: &str, filter: &TrajectoryFilter) -> Result<DMatrix<f64>> {
        let data = self.correlator(key)?;
        let rows = filter_configurations(&self.trajectories, filter);
        if rows.is_empty() {
            return Err(AnalysisError::InsufficientData {
                context: format!("trajectory filter on `{key}`"),
                available: 0,
                required: 1,
            });
        }
        Ok(data.select_rows(rows.iter()))
    }
}

/// Criteria for picking one ensemble out of a collection.
///
/// Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsembleQuery {
    /// Inverse gauge coupling.
    pub beta: Option<f64>,
    /// Fundamental fermion mass.
    pub m_f: Option<f64>,
    /// Antisymmetric fermion mass.
    pub m_as: Option<f64>,
    /// Temporal extent.
    pub nt: Option<usize>,
    /// Spatial extent.
    pub ns: Option<usize>,
    /// Smearing step size.
    pub epsilon: Option<f64>,
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= PARAM_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

impl EnsembleQuery {
    /// Whether `params` satisfies every set criterion.
    pub fn matches(&self, params: &EnsembleParams) -> bool {
        self.beta.map_or(true, |v| close(v, params.beta))
            && self.m_f.map_or(true, |v| close(v, params.m_f))
            && self.m_as.map_or(true, |v| close(v, params.m_as))
            && self.nt.map_or(true, |v| v == params.nt)
            && self.ns.map_or(true, |v| v == params.ns)
            && self.epsilon.map_or(true, |v| close(v, params.epsilon))
    }
}

/// Select the single ensemble matching `query`.
///
/// # Errors
///
/// `InsufficientData` if nothing matches, `InvalidConfig` if the query is
/// ambiguous.
pub fn select_ensemble<'a>(ensembles: &'a [Ensemble], query: &EnsembleQuery) -> Result<&'a Ensemble> {
    let mut matches = ensembles.iter().filter(|e| query.matches(e.params()));
    let first = matches.next().ok_or_else(|| AnalysisError::InsufficientData {
        context: "ensemble selection".to_string(),
        available: 0,
        required: 1,
    })?;
    let extra: Vec<&str> = matches.map(Ensemble::name).collect();
    if !extra.is_empty() {
        return Err(AnalysisError::InvalidConfig(format!(
            "ensemble query is ambiguous: {} also matches {}",
            first.name(),
            extra.join(", ")
        )));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(beta: f64, nt: usize) -> EnsembleParams {
        EnsembleParams {
            beta,
            m_f: -0.71,
            m_as: -1.01,
            nt,
            ns: 4,
            epsilon: 0.2,
        }
    }

    #[test]
    fn test_filter_configurations() {
        let trajectories = [100, 110, 120, 130, 140, 150];
        let filter = TrajectoryFilter {
            min: Some(110),
            max: Some(150),
            step: 20,
        };
        assert_eq!(filter_configurations(&trajectories, &filter), vec![1, 3, 5]);

        let all = filter_configurations(&trajectories, &TrajectoryFilter::default());
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_correlator_lookup_errors() {
        let ensemble = Ensemble::new("M1", params(6.6, 4), vec![1, 2])
            .with_correlator("a", DMatrix::from_element(2, 4, 1.0))
            .unwrap();

        assert!(ensemble.correlator("a").is_ok());
        assert!(matches!(
            ensemble.correlator("b"),
            Err(AnalysisError::MissingChannel { .. })
        ));
    }

    #[test]
    fn test_with_correlator_checks_shape() {
        let result = Ensemble::new("M1", params(6.6, 4), vec![1, 2])
            .with_correlator("a", DMatrix::from_element(3, 4, 1.0));
        assert!(matches!(result, Err(AnalysisError::ShapeMismatch { .. })));

        let result = Ensemble::new("M1", params(6.6, 4), vec![1, 2])
            .with_correlator("a", DMatrix::from_element(2, 5, 1.0));
        assert!(matches!(result, Err(AnalysisError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_filtered_correlator_selects_rows() {
        let data = DMatrix::from_fn(4, 2, |c, _| c as f64);
        let ensemble = Ensemble::new("M1", params(6.6, 2), vec![10, 20, 30, 40])
            .with_correlator("a", data)
            .unwrap();
        let filter = TrajectoryFilter {
            min: Some(20),
            max: None,
            step: 20,
        };
        let filtered = ensemble.filtered_correlator("a", &filter).unwrap();
        assert_eq!(filtered.nrows(), 2);
        assert_eq!(filtered[(0, 0)], 1.0);
        assert_eq!(filtered[(1, 0)], 3.0);

        let none = TrajectoryFilter {
            min: Some(1000),
            max: None,
            step: 1,
        };
        assert!(matches!(
            ensemble.filtered_correlator("a", &none),
            Err(AnalysisError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_select_ensemble() {
        let ensembles = vec![
            Ensemble::new("M1", params(6.6, 48), vec![]),
            Ensemble::new("M2", params(6.6, 64), vec![]),
            Ensemble::new("M3", params(6.5, 48), vec![]),
        ];

        let query = EnsembleQuery {
            beta: Some(6.6),
            nt: Some(64),
            ..EnsembleQuery::default()
        };
        assert_eq!(select_ensemble(&ensembles, &query).unwrap().name(), "M2");

        let ambiguous = EnsembleQuery {
            beta: Some(6.6),
            ..EnsembleQuery::default()
        };
        assert!(matches!(
            select_ensemble(&ensembles, &ambiguous),
            Err(AnalysisError::InvalidConfig(_))
        ));

        let nothing = EnsembleQuery {
            beta: Some(7.0),
            ..EnsembleQuery::default()
        };
        assert!(select_ensemble(&ensembles, &nothing).is_err());
    }
}
