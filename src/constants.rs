//! Numerical constants shared across the pipeline.

/// Default number of bootstrap replicas per ensemble.
pub const BOOTSTRAP_SAMPLE_COUNT: usize = 1000;

/// Width of the smearing kernel used for spectral-density line shapes.
pub const DEFAULT_PEAK_WIDTH: f64 = 0.34;

/// Energy index whose averaged primary spectral density fixes the overall sign.
pub const SPECTRAL_SIGN_INDEX: usize = 3;

/// Decimal places kept in reported chi-square per degree of freedom.
pub const CHI2_DECIMALS: i32 = 2;

/// Smearing level used for the optimally smeared source and sink.
pub const DEFAULT_SMEARED_LEVEL: usize = 80;

/// Smearing level of a point (unsmeared) sink.
pub const POINT_LEVEL: usize = 0;
