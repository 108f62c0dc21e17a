//! Principal correlators of synthetic correlator matrices.

use nalgebra::DMatrix;
use lattice_plateaus::analysis::{solve_gevp, GevpOptions};
use lattice_plateaus::correlator::correlator_matrix;
use lattice_plateaus::statistics::sample_bootstrap_with_seed;
use lattice_plateaus::synthetic::{SyntheticEnsemble, TimeProfile};
use lattice_plateaus::{Correlator, CorrelatorMatrix, EnsembleParams};

const REPLICAS: usize = 40;

fn params(nt: usize) -> EnsembleParams {
    EnsembleParams {
        beta: 6.5,
        m_f: -0.71,
        m_as: -1.01,
        nt,
        ns: 4,
        epsilon: 0.2,
    }
}

fn bootstrapped_matrix(energies: &[f64], overlaps: DMatrix<f64>, noise: f64) -> CorrelatorMatrix {
    let raw = SyntheticEnsemble::new("gevp", params(24), 60)
        .with_noise(noise)
        .with_seed(31)
        .correlator_matrix(energies, &overlaps, TimeProfile::Exponential, 0)
        .unwrap();
    let entries: Vec<Correlator> = raw
        .iter()
        .map(|data| sample_bootstrap_with_seed(data, 4242, REPLICAS).unwrap())
        .collect();
    correlator_matrix(&entries, overlaps.nrows()).unwrap()
}

fn rotated_pair() -> CorrelatorMatrix {
    let angle = 0.6_f64;
    let (s, c) = angle.sin_cos();
    let overlaps = DMatrix::from_row_slice(2, 2, &[c, -s, s, c]);
    bootstrapped_matrix(&[0.4, 0.8], overlaps, 0.02)
}

/// Level 0 is never below level 1, for the mean and every replica.
#[test]
fn ranked_levels_are_ordered_per_replica() {
    let t0 = 2;
    let spectrum = solve_gevp(&rotated_pair(), &GevpOptions::new(t0)).unwrap();
    let ground = spectrum.level(0).unwrap();
    let excited = spectrum.level(1).unwrap();
    assert_eq!(ground.replica_count(), REPLICAS);

    for t in (t0 + 1)..ground.len() {
        assert!(ground.mean()[t] >= excited.mean()[t], "mean at t = {t}");
        for (b, (g, e)) in ground.samples().iter().zip(excited.samples()).enumerate() {
            assert!(g[t] >= e[t], "replica {b} at t = {t}: {} < {}", g[t], e[t]);
        }
    }
    for t in 0..=t0 {
        assert!(ground.mean()[t].is_nan() && excited.samples()[0][t].is_nan());
    }
}

/// Eigenvalues at the first solved slice are non-increasing in rank.
#[test]
fn eigenvalues_non_increasing_at_first_slice() {
    let overlaps = DMatrix::from_row_slice(3, 3, &[1.0, 0.5, 0.2, 0.8, 0.9, 0.4, 0.5, 0.6, 1.0]);
    let matrix = bootstrapped_matrix(&[0.5, 0.9, 1.4], overlaps, 0.01);
    let t0 = 1;
    let spectrum = solve_gevp(&matrix, &GevpOptions::new(t0)).unwrap();
    assert_eq!(spectrum.level_count(), 3);

    let t = t0 + 1;
    for b in 0..REPLICAS {
        let values: Vec<f64> = spectrum.levels.iter().map(|l| l.samples()[b][t]).collect();
        assert!(values.windows(2).all(|w| w[0] >= w[1]), "replica {b}: {values:?}");
    }
}

/// With noise common to all matrix entries, level ratios are exact.
#[test]
fn level_ratios_follow_energy_gaps() {
    let energies = [0.5, 0.9, 1.4];
    let overlaps = DMatrix::from_row_slice(3, 3, &[1.0, 0.5, 0.2, 0.8, 0.9, 0.4, 0.5, 0.6, 1.0]);
    let matrix = bootstrapped_matrix(&energies, overlaps, 0.01);
    let t0 = 1;
    let spectrum = solve_gevp(&matrix, &GevpOptions::new(t0)).unwrap();

    for t in (t0 + 1)..=(t0 + 8) {
        let dt = (t - t0) as f64;
        for n in 1..3 {
            let expected = (-(energies[n] - energies[0]) * dt).exp();
            let ratio = spectrum.levels[n].mean()[t] / spectrum.levels[0].mean()[t];
            assert!(
                (ratio - expected).abs() < 1e-7 * expected.max(1e-3),
                "level {n}, t = {t}: {ratio} vs {expected}"
            );
            let replica = &spectrum.levels[n].samples()[7];
            let replica_ratio = replica[t] / spectrum.levels[0].samples()[7][t];
            assert!((replica_ratio - expected).abs() < 1e-7 * expected.max(1e-3));
        }
    }
}

/// The ground level decays with the ground-state energy.
#[test]
fn ground_level_effective_energy() {
    let spectrum = solve_gevp(&rotated_pair(), &GevpOptions::new(1)).unwrap();
    let ground = spectrum.level(0).unwrap().mean();
    for t in 2..10 {
        let effective = (ground[t] / ground[t + 1]).ln();
        assert!((effective - 0.4).abs() < 0.02, "t = {t}: {effective}");
    }
}

/// Well-separated levels with fixed eigenvectors raise no crossings.
#[test]
fn continuity_check_quiet_without_crossings() {
    let options = GevpOptions {
        t0: 1,
        check_continuity: true,
    };
    let spectrum = solve_gevp(&rotated_pair(), &options).unwrap();
    assert!(spectrum.crossings.is_empty(), "{:?}", spectrum.crossings);
}
