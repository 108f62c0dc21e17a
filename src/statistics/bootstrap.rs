//! Bootstrap resampling over gauge configurations.
//!
//! Replicas are drawn by resampling whole configurations (rows of a raw
//! correlator) with replacement. Each replica gets its own RNG seeded from
//! the ensemble seed and the replica index, so the drawn indices depend only
//! on the ensemble name, the configuration count and the replica number.
//! Two observables computed on the same ensemble therefore see the same
//! resamplings, and the parallel and serial paths produce identical output.

use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{AnalysisError, Result};
use crate::thread_pool;
use crate::types::Correlator;

use super::sample_set::BootstrapSampleSet;

/// Offset basis for folding an ensemble name into a seed (FNV-1a 64).
const NAME_SEED_BASIS: u64 = 0xcbf29ce484222325;

/// Counter-based RNG seed generation using SplitMix64.
///
/// This is a stateless PRF that generates deterministic, well-distributed
/// seeds from a base seed and counter.
///
/// # Arguments
///
/// * `base_seed` - Base random seed
/// * `counter` - Iteration counter (0, 1, 2, ...)
///
/// # Returns
///
/// A 64-bit seed suitable for initializing an RNG.
#[inline]
pub fn counter_rng_seed(base_seed: u64, counter: u64) -> u64 {
    // SplitMix64, see https://xoshiro.di.unimi.it/splitmix64.c
    let mut z = base_seed.wrapping_add(counter.wrapping_mul(0x9e3779b97f4a7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Deterministic seed derived from an ensemble name.
///
/// Every byte is mixed through [`counter_rng_seed`], so the result is
/// platform independent and stable across runs (unlike `std`'s hasher).
pub fn ensemble_seed(name: &str) -> u64 {
    let folded = name
        .bytes()
        .fold(NAME_SEED_BASIS, |acc, byte| counter_rng_seed(acc, u64::from(byte)));
    counter_rng_seed(folded, name.len() as u64)
}

/// RNG for bootstrap replica `replica` under `seed`.
#[inline]
pub fn replica_rng(seed: u64, replica: usize) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(seed, replica as u64))
}

/// Configuration indices drawn for one replica.
fn draw_indices(seed: u64, replica: usize, n_configs: usize) -> Vec<usize> {
    let mut rng = replica_rng(seed, replica);
    (0..n_configs)
        .map(|_| rng.random_range(0..n_configs))
        .collect()
}

/// Draw the resampling indices for `count` replicas.
///
/// # Arguments
///
/// * `seed` - Base seed, usually [`ensemble_seed`] of the ensemble name
/// * `n_configs` - Number of configurations to resample from
/// * `count` - Number of bootstrap replicas (B)
///
/// # Returns
///
/// `count` vectors of `n_configs` indices each, drawn with replacement.
pub fn bootstrap_indices(seed: u64, n_configs: usize, count: usize) -> Vec<Vec<usize>> {
    if n_configs == 0 {
        return vec![Vec::new(); count];
    }
    (0..count)
        .map(|b| draw_indices(seed, b, n_configs))
        .collect()
}

/// Column means of the rows selected by `indices`.
fn resampled_mean(data: &DMatrix<f64>, indices: &[usize]) -> DVector<f64> {
    let mut out = DVector::zeros(data.ncols());
    for &row in indices {
        for (t, value) in out.iter_mut().enumerate() {
            *value += data[(row, t)];
        }
    }
    out / indices.len() as f64
}

/// Column means of the full data.
pub fn configuration_mean(data: &DMatrix<f64>) -> DVector<f64> {
    let rows: Vec<usize> = (0..data.nrows()).collect();
    resampled_mean(data, &rows)
}

/// Bootstrap a raw (configuration x time) correlator.
///
/// The point estimate is the mean over all configurations; replica `b` is
/// the mean over the configurations drawn for that replica under the seed
/// derived from `ensemble_name`.
///
/// # Errors
///
/// `InsufficientData` if `data` has no configurations.
pub fn sample_bootstrap_1d(
    data: &DMatrix<f64>,
    ensemble_name: &str,
    count: usize,
) -> Result<Correlator> {
    sample_bootstrap_with_seed(data, ensemble_seed(ensemble_name), count)
}

/// [`sample_bootstrap_1d`] with an explicit seed.
pub fn sample_bootstrap_with_seed(
    data: &DMatrix<f64>,
    seed: u64,
    count: usize,
) -> Result<Correlator> {
    let n_configs = data.nrows();
    if n_configs == 0 {
        return Err(AnalysisError::InsufficientData {
            context: "bootstrap resampling".to_string(),
            available: 0,
            required: 1,
        });
    }

    let mean = configuration_mean(data);

    #[cfg(feature = "parallel")]
    let samples: Vec<DVector<f64>> = thread_pool::install(|| {
        (0..count)
            .into_par_iter()
            .map(|b| resampled_mean(data, &draw_indices(seed, b, n_configs)))
            .collect()
    });

    #[cfg(not(feature = "parallel"))]
    let samples: Vec<DVector<f64>> = thread_pool::install(|| {
        (0..count)
            .map(|b| resampled_mean(data, &draw_indices(seed, b, n_configs)))
            .collect()
    });

    Ok(BootstrapSampleSet::new(mean, samples))
}
