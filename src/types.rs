//! Type aliases and common types.

use nalgebra::{DMatrix, DVector};

use crate::statistics::BootstrapSampleSet;

/// A correlator time series (one value per time slice).
pub type Series = DVector<f64>;

/// A dense matrix, used both for raw (configuration x time) data and for
/// (smearing x smearing) correlator matrices at a single time slice.
pub type Matrix = DMatrix<f64>;

/// Bootstrap set of correlator time series.
pub type Correlator = BootstrapSampleSet<Series>;

/// Bootstrap set of scalars (masses, couplings, matrix elements).
pub type ScalarSamples = BootstrapSampleSet<f64>;

/// Bootstrap set of correlator matrices: one N x N matrix per time slice.
pub type CorrelatorMatrix = BootstrapSampleSet<Vec<Matrix>>;
