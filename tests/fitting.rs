//! Correlated fits on synthetic correlators.

use nalgebra::DVector;
use lattice_plateaus::analysis::{extract_exp_mass, extract_meson_mass, PlateauWindow};
use lattice_plateaus::fit::{
    correlated_chi_square, fit_bootstrap, time_slices, Bound, ExpDecay, FitModel, FitOptions,
};
use lattice_plateaus::statistics::{estimate_covariance, sample_bootstrap_with_seed};
use lattice_plateaus::synthetic::{SyntheticEnsemble, TimeProfile};
use lattice_plateaus::{AnalysisError, Correlator, EnsembleParams};

fn params(nt: usize) -> EnsembleParams {
    EnsembleParams {
        beta: 6.5,
        m_f: -0.71,
        m_as: -1.01,
        nt,
        ns: 8,
        epsilon: 0.2,
    }
}

fn synthetic(nt: usize, energy: f64, profile: TimeProfile, replicas: usize) -> Correlator {
    let data = SyntheticEnsemble::new("fit", params(nt), 200)
        .with_noise(0.02)
        .with_seed(2024)
        .correlator(&[(energy, 1.5)], profile, 0)
        .unwrap();
    sample_bootstrap_with_seed(&data, 77, replicas).unwrap()
}

/// A single exponential with B = 100 replicas: the fitted energy lies
/// within three standard errors of the injected one.
#[test]
fn exponential_energy_recovered_within_three_sigma() {
    let energy = 0.35;
    let corr = synthetic(24, energy, TimeProfile::Exponential, 100);
    let window = PlateauWindow::new(5, 13).unwrap();

    let fit = extract_exp_mass(&corr, &window, &FitOptions::default()).unwrap();
    let estimate = *fit.mass.mean();
    let error = fit.mass.std_error();
    assert_eq!(fit.mass.replica_count(), 100);
    assert!(error > 0.0 && error < 0.05, "unexpected error {error}");
    assert!(
        (estimate - energy).abs() < 3.0 * error,
        "E = {estimate} ± {error}, injected {energy}"
    );
    assert_eq!(fit.fit.failed_replicas, 0);
    assert!(fit.chi2_dof >= 0.0 && fit.chi2_dof < 10.0);
}

/// The cosh fit recovers the energy of a periodic correlator.
#[test]
fn cosh_energy_recovered() {
    let nt = 32;
    let energy = 0.45;
    let corr = synthetic(nt, energy, TimeProfile::Periodic, 120);
    let window = PlateauWindow::new(4, 12).unwrap();
    let fit = extract_meson_mass(&corr, &window, nt, &FitOptions::default()).unwrap();
    let error = fit.mass.std_error();
    assert!(
        (fit.mass.mean() - energy).abs() < 4.0 * error.max(1e-4),
        "E = {} ± {error}",
        fit.mass.mean()
    );
}

/// `A e^{-E t}` written as `e^{ln A - E t}`.
struct LogAmplitude {
    times: Vec<f64>,
}

impl FitModel for LogAmplitude {
    fn parameter_names(&self) -> &[&'static str] {
        &["E", "lnA"]
    }

    fn data_len(&self) -> usize {
        self.times.len()
    }

    fn evaluate(&self, params: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.times.len(),
            self.times.iter().map(|&t| (params[1] - params[0] * t).exp()),
        )
    }
}

/// Chi-square depends only on the residuals, not on the parametrisation.
#[test]
fn chi_square_invariant_under_reparametrisation() {
    let corr = synthetic(16, 0.5, TimeProfile::Exponential, 80);
    let window = corr.window(3, 9).unwrap();
    let covariance = estimate_covariance(window.samples()).unwrap();
    let times = time_slices(3, 9);

    let direct = ExpDecay::new(times.clone());
    let logarithmic = LogAmplitude { times };
    for &(energy, amplitude) in &[(0.5, 1.5), (0.45, 1.2), (0.6, 2.0)] {
        let chi_direct = correlated_chi_square(
            &direct,
            &DVector::from_row_slice(&[energy, amplitude]),
            window.mean(),
            &covariance,
        )
        .unwrap();
        let chi_log = correlated_chi_square(
            &logarithmic,
            &DVector::from_row_slice(&[energy, f64::ln(amplitude)]),
            window.mean(),
            &covariance,
        )
        .unwrap();
        assert!(
            (chi_direct - chi_log).abs() <= 1e-8 * chi_direct.max(1.0),
            "{chi_direct} vs {chi_log}"
        );
    }
}

/// Both parametrisations reach the same minimum and the same energy.
#[test]
fn fitted_energy_independent_of_parametrisation() {
    let corr = synthetic(16, 0.5, TimeProfile::Exponential, 80);
    let target = corr.window(3, 9).unwrap();
    let times = time_slices(3, 9);
    let options = FitOptions::default();

    let direct = fit_bootstrap(&ExpDecay::new(times.clone()), &target, &[0.4, 1.0], &[], &options)
        .unwrap();
    let logarithmic =
        fit_bootstrap(&LogAmplitude { times }, &target, &[0.4, 0.0], &[], &options).unwrap();
    assert!((direct.mean_params[0] - logarithmic.mean_params[0]).abs() < 1e-4);
    assert!((direct.chi2_dof - logarithmic.chi2_dof).abs() <= 0.01);
}

/// Too few points for the parameters is an error, not a fit.
#[test]
fn no_degrees_of_freedom() {
    let corr = synthetic(16, 0.5, TimeProfile::Exponential, 40);
    let target = corr.window(3, 5).unwrap();
    let result = fit_bootstrap(
        &ExpDecay::new(time_slices(3, 5)),
        &target,
        &[0.5, 1.0],
        &[Bound::at_least(0.0)],
        &FitOptions::default(),
    );
    assert!(matches!(result, Err(AnalysisError::InsufficientData { .. })));
}
