use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lattice_plateaus::analysis::{extract_meson_mass, PlateauWindow};
use lattice_plateaus::correlator::{MesonChannel, Representation};
use lattice_plateaus::fit::FitOptions;
use lattice_plateaus::statistics::sample_bootstrap_1d;
use lattice_plateaus::synthetic::{insert_meson, SyntheticEnsemble, TimeProfile};
use lattice_plateaus::{Analysis, EnsembleParams, ObservableRequest};

fn generator() -> SyntheticEnsemble {
    let params = EnsembleParams {
        beta: 6.5,
        m_f: -0.71,
        m_as: -1.01,
        nt: 48,
        ns: 4,
        epsilon: 0.2,
    };
    SyntheticEnsemble::new("bench", params, 200).with_seed(1)
}

fn bench_pipeline(c: &mut Criterion) {
    let generator = generator();
    let data = generator
        .correlator(&[(0.4, 1.0)], TimeProfile::Periodic, 0)
        .expect("synthetic correlator");

    let mut group = c.benchmark_group("lattice_plateaus");
    group.sample_size(10);

    group.bench_function("bootstrap_1000", |b| {
        b.iter(|| black_box(sample_bootstrap_1d(&data, "bench", 1000).expect("bootstrap")));
    });

    let corr = sample_bootstrap_1d(&data, "bench", 200).expect("bootstrap");
    let window = PlateauWindow { start: 8, end: 20 };
    group.bench_function("cosh_fit_200_replicas", |b| {
        b.iter(|| {
            let fit = extract_meson_mass(&corr, &window, 48, &FitOptions::default());
            black_box(fit.map(|f| *f.mass.mean()))
        });
    });

    let ensemble = insert_meson(
        generator.empty(),
        Representation::Fundamental,
        MesonChannel::V,
        80,
        80,
        &data,
    )
    .expect("ensemble");
    let analysis = Analysis::quick()
        .plateau(0, 8, 20)
        .request(ObservableRequest::MesonMass(Representation::Fundamental, MesonChannel::V));
    group.bench_function("analysis_run_meson_mass", |b| {
        b.iter(|| black_box(analysis.run(&ensemble).map(|r| r.outcomes.len())));
    });

    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
