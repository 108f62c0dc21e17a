//! Synthetic ensembles with known spectra.
//!
//! Every generator draws multiplicative Gaussian noise `1 + σ·z` on top of
//! an exact time dependence, one draw per configuration and time slice.
//! Streams are seeded from `(seed, stream)` so two correlators generated
//! with different stream numbers are independent and each is reproducible.

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::correlator::{baryon_key, meson_key, BaryonOperator, MesonChannel, Parity, Representation};
use crate::ensemble::{Ensemble, EnsembleParams};
use crate::error::{AnalysisError, Result};
use crate::statistics::counter_rng_seed;

/// Time dependence of one state on a periodic lattice of extent T.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeProfile {
    /// `e^{-E t}`.
    Exponential,
    /// `e^{-E t} + e^{-E (T - t)}`.
    Periodic,
    /// `e^{-E t} - e^{-E (T - t)}`.
    Antiperiodic,
}

impl TimeProfile {
    /// Value at slice `t`.
    pub fn at(self, energy: f64, t: usize, nt: usize) -> f64 {
        let forward = (-energy * t as f64).exp();
        let backward = (-energy * (nt as f64 - t as f64)).exp();
        match self {
            TimeProfile::Exponential => forward,
            TimeProfile::Periodic => forward + backward,
            TimeProfile::Antiperiodic => forward - backward,
        }
    }
}

/// Generator for the raw measurements of one ensemble.
#[derive(Debug, Clone)]
pub struct SyntheticEnsemble {
    name: String,
    params: EnsembleParams,
    configurations: usize,
    noise: f64,
    seed: u64,
    first_trajectory: u64,
    trajectory_step: u64,
}

impl SyntheticEnsemble {
    /// `configurations` measurements of an ensemble with `params`, 1% noise.
    pub fn new(name: impl Into<String>, params: EnsembleParams, configurations: usize) -> Self {
        Self {
            name: name.into(),
            params,
            configurations,
            noise: 0.01,
            seed: 0,
            first_trajectory: 0,
            trajectory_step: 1,
        }
    }

    /// Relative noise level σ.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Base seed of every stream.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Trajectory numbering `first, first + step, …`.
    pub fn with_trajectories(mut self, first: u64, step: u64) -> Self {
        self.first_trajectory = first;
        self.trajectory_step = step;
        self
    }

    /// Ensemble parameters.
    pub fn params(&self) -> &EnsembleParams {
        &self.params
    }

    /// Trajectory numbers of the configurations.
    pub fn trajectories(&self) -> Vec<u64> {
        (0..self.configurations as u64)
            .map(|i| self.first_trajectory + i * self.trajectory_step)
            .collect()
    }

    /// An ensemble with no measurements yet.
    pub fn empty(&self) -> Ensemble {
        Ensemble::new(self.name.clone(), self.params.clone(), self.trajectories())
    }

    fn noise_factors(&self, stream: u64) -> Result<DMatrix<f64>> {
        let normal = Normal::new(0.0, self.noise).map_err(|e| {
            AnalysisError::InvalidConfig(format!("synthetic noise level {}: {e}", self.noise))
        })?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(counter_rng_seed(self.seed, stream));
        let nt = self.params.nt;
        let mut factors = DMatrix::zeros(self.configurations, nt);
        for c in 0..self.configurations {
            for t in 0..nt {
                factors[(c, t)] = 1.0 + normal.sample(&mut rng);
            }
        }
        Ok(factors)
    }

    /// Raw correlator `Σ_n A_n f(E_n, t)` for `states = [(E_n, A_n)]`.
    pub fn correlator(&self, states: &[(f64, f64)], profile: TimeProfile, stream: u64) -> Result<DMatrix<f64>> {
        let nt = self.params.nt;
        let factors = self.noise_factors(stream)?;
        Ok(DMatrix::from_fn(self.configurations, nt, |c, t| {
            let exact: f64 = states
                .iter()
                .map(|&(energy, amplitude)| amplitude * profile.at(energy, t, nt))
                .sum();
            exact * factors[(c, t)]
        }))
    }

    /// Raw correlator matrix entries `C_ij(t) = Σ_n Z_in Z_jn f(E_n, t)`,
    /// row-major over `(i, j)`.
    ///
    /// `overlaps` is (operators x states). The noise factor is shared by all
    /// entries of one configuration and slice, so every configuration's
    /// matrix stays positive definite.
    pub fn correlator_matrix(
        &self,
        energies: &[f64],
        overlaps: &DMatrix<f64>,
        profile: TimeProfile,
        stream: u64,
    ) -> Result<Vec<DMatrix<f64>>> {
        if overlaps.ncols() != energies.len() {
            return Err(AnalysisError::shape(
                "synthetic overlaps",
                energies.len(),
                overlaps.ncols(),
            ));
        }
        let nt = self.params.nt;
        let n = overlaps.nrows();
        let factors = self.noise_factors(stream)?;
        let mut entries = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                entries.push(DMatrix::from_fn(self.configurations, nt, |c, t| {
                    let exact: f64 = energies
                        .iter()
                        .enumerate()
                        .map(|(k, &e)| overlaps[(i, k)] * overlaps[(j, k)] * profile.at(e, t, nt))
                        .sum();
                    exact * factors[(c, t)]
                }));
            }
        }
        Ok(entries)
    }

    /// Raw even and odd baryon correlators with a forward state of energy
    /// `even.0` and amplitude `even.1` in the even channel, likewise for the
    /// odd channel, each appearing as the other's antiperiodic image.
    pub fn baryon_pair(
        &self,
        even: (f64, f64),
        odd: (f64, f64),
        stream: u64,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
        let nt = self.params.nt as f64;
        let image = |(energy, amplitude): (f64, f64), t: f64| amplitude * (-energy * (nt - t)).exp();
        let forward = |(energy, amplitude): (f64, f64), t: f64| amplitude * (-energy * t).exp();
        let even_noise = self.noise_factors(stream)?;
        let odd_noise = self.noise_factors(stream.wrapping_add(1))?;
        let even_data = DMatrix::from_fn(self.configurations, self.params.nt, |c, t| {
            let time = t as f64;
            (forward(even, time) - image(odd, time)) * even_noise[(c, t)]
        });
        let odd_data = DMatrix::from_fn(self.configurations, self.params.nt, |c, t| {
            let time = t as f64;
            (forward(odd, time) - image(even, time)) * odd_noise[(c, t)]
        });
        Ok((even_data, odd_data))
    }
}

/// Store `data` under every gamma structure of a meson channel.
pub fn insert_meson(
    ensemble: Ensemble,
    rep: Representation,
    channel: MesonChannel,
    source: usize,
    sink: usize,
    data: &DMatrix<f64>,
) -> Result<Ensemble> {
    channel.gamma_tags().iter().try_fold(ensemble, |ensemble, gamma| {
        ensemble.with_correlator(meson_key(rep, gamma, source, sink), data.clone())
    })
}

/// Store both parities of a baryon operator.
pub fn insert_baryon(
    ensemble: Ensemble,
    op: BaryonOperator,
    source: usize,
    sink: usize,
    even: DMatrix<f64>,
    odd: DMatrix<f64>,
) -> Result<Ensemble> {
    ensemble
        .with_correlator(baryon_key(op, Parity::Even, source, sink), even)?
        .with_correlator(baryon_key(op, Parity::Odd, source, sink), odd)
}
