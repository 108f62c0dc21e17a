//! Folding, parity projection and correlator assembly.

use nalgebra::DVector;
use lattice_plateaus::correlator::{
    bin_projection_baryon, effective_mass, fold_periodic, fold_periodic_set, folded_len,
    BaryonOperator, Channel, CorrelatorSource, MesonChannel, Parity, Representation,
};
use lattice_plateaus::statistics::BootstrapSampleSet;
use lattice_plateaus::synthetic::{insert_baryon, insert_meson, SyntheticEnsemble, TimeProfile};
use lattice_plateaus::{AnalysisError, Correlator, EnsembleParams, TrajectoryFilter};

fn params(nt: usize, ns: usize) -> EnsembleParams {
    EnsembleParams {
        beta: 6.5,
        m_f: -0.71,
        m_as: -1.01,
        nt,
        ns,
        epsilon: 0.2,
    }
}

/// Folding a time-symmetric series leaves its first half untouched.
#[test]
fn fold_is_identity_on_symmetric_input() {
    for nt in [8, 9, 16] {
        let symmetric = DVector::from_fn(nt, |t, _| {
            let e = 0.3;
            (-e * t as f64).exp() + (-e * (nt - t) as f64).exp()
        });
        let folded = fold_periodic(&symmetric);
        assert_eq!(folded.len(), folded_len(nt));
        for t in 0..folded.len() {
            assert!(
                (folded[t] - symmetric[t]).abs() < 1e-15,
                "nt = {nt}, t = {t}: {} vs {}",
                folded[t],
                symmetric[t]
            );
        }
    }
}

/// Folding a bootstrap set applies to the mean and every replica alike.
#[test]
fn fold_applies_per_replica() {
    let base = DVector::from_fn(6, |t, _| t as f64);
    let corr: Correlator = BootstrapSampleSet::new(base.clone(), vec![base.clone(), base * 2.0]);
    let folded = fold_periodic_set(&corr);
    assert_eq!(folded.replica_count(), 2);
    // (1 + 5) / 2 = 3 for replica 0, doubled for replica 1.
    assert!((folded.samples()[0][1] - 3.0).abs() < 1e-15);
    assert!((folded.samples()[1][1] - 6.0).abs() < 1e-15);
}

/// Perfectly anti-correlated parities cancel after projection.
#[test]
fn anticorrelated_parities_project_to_zero_sum() {
    let nt = 12;
    let series = |shift: f64| DVector::from_fn(nt, |t, _| (-0.4 * t as f64).exp() + shift * t as f64);
    let even: Correlator = BootstrapSampleSet::new(
        series(0.0),
        (0..5).map(|b| series(0.01 * b as f64)).collect(),
    );
    let odd = -&even;

    let (even_bin, odd_bin) = bin_projection_baryon(&even, &odd).unwrap();
    let sum = &even_bin + &odd_bin;
    for t in 1..nt {
        assert_eq!(sum.mean()[t], 0.0, "mean sum at t = {t}");
        for (b, replica) in sum.samples().iter().enumerate() {
            assert_eq!(replica[t], 0.0, "replica {b} sum at t = {t}");
        }
    }
}

/// Channel strings round-trip and resolve to stored keys.
#[test]
fn channel_names_and_keys() {
    let ps: Channel = "f_ps".parse().unwrap();
    assert_eq!(ps, Channel::Meson(Representation::Fundamental, MesonChannel::Ps));
    assert_eq!(ps.storage_keys(80, 0), vec!["source_N80_sink_N0/TRIPLET g5".to_string()]);

    let v: Channel = "as_v".parse().unwrap();
    assert_eq!(v.storage_keys(40, 40).len(), 3);

    let lambda: Channel = "lambda_odd".parse().unwrap();
    assert_eq!(lambda, Channel::Baryon(BaryonOperator::Lambda, Parity::Odd));
    assert_eq!(lambda.to_string(), "lambda_odd");

    assert!(matches!("f_q".parse::<Channel>(), Err(AnalysisError::InvalidConfig(_))));
    assert!(matches!("xyz".parse::<Channel>(), Err(AnalysisError::InvalidConfig(_))));
}

/// Meson correlators are folded and scaled by the spatial volume.
#[test]
fn meson_correlator_is_folded_and_normalised() {
    let nt = 16;
    let generator = SyntheticEnsemble::new("assemble", params(nt, 4), 20).with_noise(0.0);
    let data = generator
        .correlator(&[(0.5, 1.0)], TimeProfile::Periodic, 0)
        .unwrap();
    let ensemble = insert_meson(
        generator.empty(),
        Representation::Fundamental,
        MesonChannel::Ps,
        80,
        80,
        &data,
    )
    .unwrap();

    let source = CorrelatorSource::new(&ensemble, 16);
    let corr = source
        .meson(Representation::Fundamental, MesonChannel::Ps, 80, 80)
        .unwrap();
    assert_eq!(corr.len(), folded_len(nt));
    let expected = 64.0 * ((-0.5 * 3.0_f64).exp() + (-0.5 * 13.0_f64).exp());
    assert!((corr.mean()[3] - expected).abs() < 1e-12 * expected);
    // Noiseless data: every replica equals the mean.
    assert!((corr.samples()[7][3] - expected).abs() < 1e-12 * expected);
}

/// The cross correlator is cross-folded and negated.
#[test]
fn cross_correlator_sign() {
    let nt = 16;
    let generator = SyntheticEnsemble::new("cross", params(nt, 2), 10).with_noise(0.0);
    let data = -generator
        .correlator(&[(0.5, 1.0)], TimeProfile::Antiperiodic, 0)
        .unwrap();
    let ensemble = insert_meson(
        generator.empty(),
        Representation::Antisymmetric,
        MesonChannel::PsAv,
        80,
        0,
        &data,
    )
    .unwrap();
    let corr = CorrelatorSource::new(&ensemble, 4)
        .meson(Representation::Antisymmetric, MesonChannel::PsAv, 80, 0)
        .unwrap();
    for t in 1..corr.len() - 1 {
        assert!(corr.mean()[t] > 0.0, "t = {t}");
    }
}

/// Missing measurements surface as `MissingChannel`.
#[test]
fn missing_channel_is_reported() {
    let generator = SyntheticEnsemble::new("empty", params(8, 2), 4);
    let ensemble = generator.empty();
    let result = CorrelatorSource::new(&ensemble, 4).meson(
        Representation::Fundamental,
        MesonChannel::T,
        80,
        80,
    );
    assert!(matches!(result, Err(AnalysisError::MissingChannel { .. })));
}

/// Trajectory filtering and binning shrink the configuration set.
#[test]
fn filter_and_binning() {
    let nt = 8;
    let generator = SyntheticEnsemble::new("filter", params(nt, 2), 40).with_trajectories(1000, 10);
    let data = generator.correlator(&[(0.3, 1.0)], TimeProfile::Periodic, 0).unwrap();
    let ensemble = insert_meson(
        generator.empty(),
        Representation::Fundamental,
        MesonChannel::S,
        80,
        80,
        &data,
    )
    .unwrap();

    let filter = TrajectoryFilter {
        min: Some(1100),
        max: None,
        step: 20,
    };
    let source = CorrelatorSource::new(&ensemble, 8).with_filter(filter).with_bin_size(3);
    let raw = source.raw("source_N80_sink_N80/TRIPLET id").unwrap();
    // Trajectories 1100, 1120, …, 1380: 15 configurations, 5 bins of 3.
    assert_eq!(raw.shape(), (5, nt));
    let first_bin = (data.row(10) + data.row(12) + data.row(14)) / 3.0;
    for t in 0..nt {
        assert!((raw[(0, t)] - first_bin[t]).abs() < 1e-14);
    }
}

/// Baryon channels are projected before use.
#[test]
fn baryon_projection_through_source() {
    let nt = 24;
    let generator = SyntheticEnsemble::new("baryon", params(nt, 2), 12).with_noise(0.0);
    let (even, odd) = generator.baryon_pair((0.7, 1.0), (1.0, 0.5), 0).unwrap();
    let ensemble = insert_baryon(generator.empty(), BaryonOperator::Sigma, 80, 80, even.clone(), odd)
        .unwrap();
    let (even_bin, _) = CorrelatorSource::new(&ensemble, 4)
        .baryon(BaryonOperator::Sigma, 80, 80)
        .unwrap();
    for t in 1..nt {
        assert!((even_bin.mean()[t] - 8.0 * even[(0, t)]).abs() < 1e-12, "t = {t}");
    }
}

/// The effective mass of a clean exponential is flat.
#[test]
fn effective_mass_of_exponential() {
    let series = DVector::from_fn(10, |t, _| 3.0 * (-0.6 * t as f64).exp());
    let corr: Correlator = BootstrapSampleSet::new(series.clone(), vec![series; 3]);
    let m = effective_mass(&corr);
    for t in 0..9 {
        assert!((m.mean()[t] - 0.6).abs() < 1e-12);
    }
}
