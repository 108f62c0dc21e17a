//! Statistical infrastructure shared by every analysis stage.
//!
//! - Bootstrap resampling over configurations with deterministic per-replica seeds
//! - The bootstrap sample set and its per-replica combinators
//! - Covariance estimation with Cholesky decorrelation
//! - NaN-aware aggregation and trajectory autocorrelation diagnostics

mod aggregate;
mod autocorrelation;
mod bootstrap;
mod covariance;
mod sample_set;

pub use aggregate::{column_mean_std, nan_count, nan_mean, nan_std, round_to};
pub use autocorrelation::{
    autocorrelation_function, correlator_autocorrelation, integrated_autocorrelation_time,
    lag1_autocorrelation, lag_autocorrelation, suggested_bin_size, AutocorrelationSummary,
};
pub use bootstrap::{
    bootstrap_indices, configuration_mean, counter_rng_seed, ensemble_seed, replica_rng,
    sample_bootstrap_1d, sample_bootstrap_with_seed,
};
pub use covariance::{estimate_covariance, sample_covariance, CovarianceEstimate, WelfordCovariance};
pub use sample_set::BootstrapSampleSet;
