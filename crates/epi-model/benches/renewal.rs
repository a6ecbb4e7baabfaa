//! Renewal-loop benchmark: one full density evaluation per iteration.

use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion};
use epi_model::{
    default_ifr_means, ChangePointKind, Intervention, ModelParams, ObservedData, PriorConfig,
    RenewalModel,
};
use epi_sampler::LogDensity;
use ndarray::{Array2, Array3};

fn bench_params(days: usize, countries: usize, ages: usize) -> ModelParams {
    let observed = ObservedData {
        positive: Array3::from_elem((days, countries, ages), 50.0),
        total: Array3::from_elem((days, countries, ages), 500.0),
        deaths: Array3::from_elem((days, countries, ages), 0.5),
    };
    let interventions = vec![Intervention {
        name: "distancing".into(),
        kind: ChangePointKind::Sigmoid,
        day: vec![Some(days as f64 / 2.0); countries],
    }];
    ModelParams::new(
        (0..countries).map(|c| format!("country-{c}")).collect(),
        (0..ages).map(|a| format!("age-{a}")).collect(),
        NaiveDate::from_ymd_opt(2020, 3, 2).unwrap(),
        observed,
        Array2::from_elem((countries, ages), 1e7),
        default_ifr_means(ages),
        interventions,
        PriorConfig::default(),
    )
    .unwrap()
}

fn density_evaluation(c: &mut Criterion) {
    let model = RenewalModel::new(bench_params(120, 3, 4));
    let q = vec![0.05; model.space().dim()];

    c.bench_function("logp_120d_3c_4a", |b| {
        b.iter(|| std::hint::black_box(model.logp(&q)))
    });
}

criterion_group!(benches, density_evaluation);
criterion_main!(benches);
