//! Flat JSON dump of an analysis report.
//!
//! The dump maps names to scalars, strings or bootstrap sets. Ensemble
//! metadata comes first, then the observables in request order. Bootstrap
//! sets serialise as `{"mean": …, "samples": […]}`; NaN becomes `null`.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::fit::BoundHit;
use crate::result::{AnalysisReport, ObservableOutcome, ObservableValue};
use crate::types::ScalarSamples;

/// One value in a [`SampleDump`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DumpValue {
    /// An integer.
    Integer(i64),
    /// A plain number.
    Number(f64),
    /// A string.
    Text(String),
    /// A bootstrap set.
    Samples {
        /// Central value.
        mean: f64,
        /// Per-replica values.
        samples: Vec<f64>,
    },
}

impl From<&ScalarSamples> for DumpValue {
    fn from(set: &ScalarSamples) -> Self {
        DumpValue::Samples {
            mean: *set.mean(),
            samples: set.samples().to_vec(),
        }
    }
}

/// Insertion-ordered name → value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleDump {
    entries: Vec<(String, DumpValue)>,
}

impl SampleDump {
    /// An empty dump.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: DumpValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&DumpValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was inserted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metadata and every completed observable of `report`.
    ///
    /// Failed observables are left out; they are reported through the log
    /// and [`AnalysisReport::failures`].
    pub fn from_report(report: &AnalysisReport) -> Self {
        let mut dump = Self::new();
        dump.insert("ensemble_name", DumpValue::Text(report.ensemble.clone()));
        dump.insert("beta", DumpValue::Number(report.params.beta));
        dump.insert("mF", DumpValue::Number(report.params.m_f));
        dump.insert("mAS", DumpValue::Number(report.params.m_as));
        dump.insert("Nt", DumpValue::Integer(report.params.nt as i64));
        dump.insert("Ns", DumpValue::Integer(report.params.ns as i64));

        for outcome in &report.outcomes {
            if let ObservableOutcome::Completed { name, value } = outcome {
                dump.add_value(name, value);
                if let Some(summary) = report.autocorrelation(name) {
                    dump.insert(format!("{name}_tau_int"), DumpValue::Number(summary.tau_int));
                }
            }
        }
        dump
    }

    /// `{prefix}_bound_hit` listing `parameter=bound` pairs, only if any.
    fn add_bound_hits(&mut self, prefix: &str, hits: &[BoundHit]) {
        if hits.is_empty() {
            return;
        }
        let text = hits
            .iter()
            .map(|hit| format!("{}={}", hit.parameter, hit.bound))
            .collect::<Vec<_>>()
            .join(",");
        self.insert(format!("{prefix}_bound_hit"), DumpValue::Text(text));
    }

    fn add_value(&mut self, name: &str, value: &ObservableValue) {
        match value {
            ObservableValue::Mass {
                mass,
                chi2_dof,
                bound_hits,
            } => {
                self.insert(format!("{name}_chisquare"), DumpValue::Number(*chi2_dof));
                self.insert(format!("{name}_mass"), mass.into());
                self.add_bound_hits(name, bound_hits);
            }
            ObservableValue::MatrixElement {
                mass,
                matrix_element,
                chi2_dof,
                bound_hits,
            } => {
                self.insert(format!("{name}_chisquare"), DumpValue::Number(*chi2_dof));
                self.insert(format!("{name}_mass"), mass.into());
                self.insert(format!("{name}_matrix_element"), matrix_element.into());
                self.add_bound_hits(name, bound_hits);
            }
            ObservableValue::Spectrum { states, .. } => {
                for state in states {
                    let level = state.level;
                    self.insert(
                        format!("{name}_E{level}_chisquare"),
                        DumpValue::Number(state.chi2_dof),
                    );
                    self.insert(format!("{name}_E{level}_mass"), (&state.mass).into());
                    self.add_bound_hits(&format!("{name}_E{level}"), &state.bound_hits);
                }
            }
            ObservableValue::SpectralPeak {
                amplitude,
                energy,
                coupling,
                chi2_dof,
                bound_hits,
                ..
            } => {
                self.insert(format!("{name}_chisquare"), DumpValue::Number(*chi2_dof));
                self.insert(format!("{name}_amplitude"), amplitude.into());
                self.insert(format!("{name}_energy"), energy.into());
                self.insert(format!("{name}_coupling"), coupling.into());
                self.add_bound_hits(name, bound_hits);
            }
        }
    }

    /// Add the values of one outcome produced outside [`AnalysisReport`]
    /// (e.g. a spectral fit). Failed outcomes are ignored.
    pub fn add_outcome(&mut self, outcome: &ObservableOutcome) {
        if let ObservableOutcome::Completed { name, value } = outcome {
            self.add_value(name, value);
        }
    }
}

impl Serialize for SampleDump {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Serialize a dump to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for a dump).
pub fn to_json(dump: &SampleDump) -> Result<String, serde_json::Error> {
    serde_json::to_string(dump)
}

/// Serialize a dump to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for a dump).
pub fn to_json_pretty(dump: &SampleDump) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(dump)
}
