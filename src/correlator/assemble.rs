//! From stored measurements to bootstrapped, normalised correlators.
//!
//! Meson channels: average the raw matrices of all equivalent gamma
//! structures, fold, bootstrap, scale by `Ns³`. Baryon channels: bootstrap
//! both parities, project, scale. All resampling goes through the ensemble
//! seed, so every correlator of one ensemble shares the same replicas.

use nalgebra::DMatrix;

use crate::ensemble::{Ensemble, TrajectoryFilter};
use crate::error::{AnalysisError, Result};
use crate::statistics::{
    correlator_autocorrelation, sample_bootstrap_1d, AutocorrelationSummary, BootstrapSampleSet,
};
use crate::types::{Correlator, CorrelatorMatrix, Matrix};

use super::binning::bin_configurations;
use super::channels::{baryon_key, meson_key, BaryonOperator, Channel, MesonChannel, Parity, Representation};
use super::fold::{fold_cross_raw, fold_periodic_raw};
use super::parity::bin_projection_baryon;

/// Builds bootstrapped correlators from one ensemble.
#[derive(Debug, Clone)]
pub struct CorrelatorSource<'a> {
    ensemble: &'a Ensemble,
    filter: TrajectoryFilter,
    bin_size: usize,
    replicas: usize,
}

impl<'a> CorrelatorSource<'a> {
    /// A source drawing `replicas` bootstrap samples from `ensemble`.
    pub fn new(ensemble: &'a Ensemble, replicas: usize) -> Self {
        Self {
            ensemble,
            filter: TrajectoryFilter::default(),
            bin_size: 1,
            replicas,
        }
    }

    /// Restrict to configurations accepted by `filter`.
    pub fn with_filter(mut self, filter: TrajectoryFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Bin consecutive configurations before resampling.
    pub fn with_bin_size(mut self, bin_size: usize) -> Self {
        self.bin_size = bin_size;
        self
    }

    /// The underlying ensemble.
    pub fn ensemble(&self) -> &'a Ensemble {
        self.ensemble
    }

    /// Number of bootstrap replicas drawn.
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Filtered and binned raw data for one stored key.
    pub fn raw(&self, key: &str) -> Result<DMatrix<f64>> {
        let filtered = self.ensemble.filtered_correlator(key, &self.filter)?;
        bin_configurations(&filtered, self.bin_size)
    }

    fn bootstrap(&self, raw: &DMatrix<f64>) -> Result<Correlator> {
        sample_bootstrap_1d(raw, self.ensemble.name(), self.replicas)
    }

    fn volume(&self) -> f64 {
        self.ensemble.params().spatial_volume()
    }

    /// Channel-averaged raw data for a meson channel.
    fn averaged_meson_raw(
        &self,
        rep: Representation,
        channel: MesonChannel,
        source: usize,
        sink: usize,
    ) -> Result<DMatrix<f64>> {
        let mut total: Option<DMatrix<f64>> = None;
        for gamma in channel.gamma_tags() {
            let key = meson_key(rep, gamma, source, sink);
            let raw = self.raw(&key)?;
            total = Some(match total {
                None => raw,
                Some(acc) if acc.shape() == raw.shape() => acc + raw,
                Some(acc) => {
                    return Err(AnalysisError::shape(
                        format!("channel average at `{key}`"),
                        format!("{:?}", acc.shape()),
                        format!("{:?}", raw.shape()),
                    ))
                }
            });
        }
        let total = total.ok_or_else(|| AnalysisError::MissingChannel {
            key: format!("{}_{}", rep.short_name(), channel.short_name()),
        })?;
        Ok(total / channel.gamma_tags().len() as f64)
    }

    /// Folded, bootstrapped and volume-normalised meson correlator.
    ///
    /// The `ps-av` cross correlator is cross-folded and negated.
    pub fn meson(
        &self,
        rep: Representation,
        channel: MesonChannel,
        source: usize,
        sink: usize,
    ) -> Result<Correlator> {
        let raw = self.averaged_meson_raw(rep, channel, source, sink)?;
        let folded = if channel.is_cross() {
            -fold_cross_raw(&raw)
        } else {
            fold_periodic_raw(&raw)
        };
        Ok(self.bootstrap(&folded)? * self.volume())
    }

    /// Parity-projected, volume-normalised baryon correlators `(even, odd)`.
    pub fn baryon(&self, op: BaryonOperator, source: usize, sink: usize) -> Result<(Correlator, Correlator)> {
        let even = self.bootstrap(&self.raw(&baryon_key(op, Parity::Even, source, sink))?)?;
        let odd = self.bootstrap(&self.raw(&baryon_key(op, Parity::Odd, source, sink))?)?;
        let (even_bin, odd_bin) = bin_projection_baryon(&even, &odd)?;
        let volume = self.volume();
        Ok((even_bin * volume, odd_bin * volume))
    }

    /// The correlator of any channel; baryons return the requested parity.
    pub fn channel(&self, channel: Channel, source: usize, sink: usize) -> Result<Correlator> {
        match channel {
            Channel::Meson(rep, meson) => self.meson(rep, meson, source, sink),
            Channel::Baryon(op, parity) => {
                let (even, odd) = self.baryon(op, source, sink)?;
                Ok(match parity {
                    Parity::Even => even,
                    Parity::Odd => odd,
                })
            }
        }
    }

    /// Trajectory autocorrelation of one channel at time slice `slice`,
    /// measured on the filtered and binned configurations that feed the
    /// bootstrap. A suggested bin above 1 means the bins are still
    /// correlated.
    pub fn autocorrelation(
        &self,
        channel: Channel,
        source: usize,
        sink: usize,
        slice: usize,
    ) -> Result<AutocorrelationSummary> {
        let raw = match channel {
            Channel::Meson(rep, meson) => self.averaged_meson_raw(rep, meson, source, sink)?,
            Channel::Baryon(op, parity) => self.raw(&baryon_key(op, parity, source, sink))?,
        };
        correlator_autocorrelation(&raw, slice).ok_or_else(|| {
            AnalysisError::InvalidConfig(format!(
                "autocorrelation slice {slice} outside {} time slices",
                raw.ncols()
            ))
        })
    }

    /// Correlator matrix over all (source, sink) pairs of `levels`.
    ///
    /// Entry `(i, j)` is the meson correlator with source `levels[i]` and
    /// sink `levels[j]`. The result holds one N x N matrix per folded time
    /// slice for the mean and every replica.
    pub fn meson_matrix(
        &self,
        rep: Representation,
        channel: MesonChannel,
        levels: &[usize],
    ) -> Result<CorrelatorMatrix> {
        let n = levels.len();
        if n == 0 {
            return Err(AnalysisError::InvalidConfig(
                "correlator matrix needs at least one smearing level".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(n * n);
        for &source in levels {
            for &sink in levels {
                entries.push(self.meson(rep, channel, source, sink)?);
            }
        }
        correlator_matrix(&entries, n)
    }
}

/// Arrange `n * n` correlators (row-major over (source, sink)) into a
/// correlator matrix.
pub fn correlator_matrix(entries: &[Correlator], n: usize) -> Result<CorrelatorMatrix> {
    if entries.len() != n * n || n == 0 {
        return Err(AnalysisError::shape("correlator matrix", n * n, entries.len()));
    }
    let nt = entries[0].len();
    let replicas = entries[0].replica_count();
    if let Some(bad) = entries
        .iter()
        .find(|e| e.len() != nt || e.replica_count() != replicas)
    {
        return Err(AnalysisError::shape(
            "correlator matrix entry",
            format!("{nt} slices x {replicas} replicas"),
            format!("{} slices x {} replicas", bad.len(), bad.replica_count()),
        ));
    }

    let build = |pick: &dyn Fn(&Correlator) -> &nalgebra::DVector<f64>| -> Vec<Matrix> {
        (0..nt)
            .map(|t| Matrix::from_fn(n, n, |i, j| pick(&entries[i * n + j])[t]))
            .collect()
    };

    let mean = build(&|c| c.mean());
    let samples = (0..replicas)
        .map(|b| build(&|c| &c.samples()[b]))
        .collect();
    Ok(BootstrapSampleSet::new(mean, samples))
}
