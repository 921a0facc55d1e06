use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use mcl_rssl::{
    default_catalog, BernoulliPosterior, EnvConfig, IntegrationCache, LearnerConfig, ModelKind,
    MouselabEnv, Participant, PriorVector, QuadratureOptions, RsslLearner, RunMode,
    StrategyPosterior,
};

fn learner(kind: ModelKind, n: usize) -> RsslLearner {
    let priors = if kind == ModelKind::GaussianRssl {
        (0..n)
            .map(|i| i as f64 * 0.1)
            .chain(std::iter::repeat(1.0).take(n))
            .collect()
    } else {
        (0..2 * n).map(|i| (i % 7) as f64).collect()
    };
    let config = LearnerConfig::new(kind, (1..=n as u32).collect(), PriorVector::new(priors))
        .with_seed(42);
    RsslLearner::new(&config).unwrap()
}

fn bench_select_strategy(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_strategy");
    for n in [5, 20, 89] {
        group.bench_with_input(BenchmarkId::new("bernoulli", n), &n, |b, &n| {
            let mut learner = learner(ModelKind::BernoulliRssl, n);
            b.iter(|| black_box(learner.select_strategy().unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("gaussian", n), &n, |b, &n| {
            let mut learner = learner(ModelKind::GaussianRssl, n);
            b.iter(|| black_box(learner.select_strategy().unwrap()))
        });
    }
    group.finish();
}

fn bench_update_params(c: &mut Criterion) {
    c.bench_function("update_params_bernoulli_20", |b| {
        let mut learner = learner(ModelKind::BernoulliRssl, 20);
        b.iter(|| learner.update_params(black_box(12.5), 3).unwrap())
    });
}

fn bench_max_likelihoods(c: &mut Criterion) {
    let mut group = c.benchmark_group("max_likelihoods");
    for n in [2, 5, 10] {
        group.bench_with_input(BenchmarkId::new("bernoulli_cold", n), &n, |b, &n| {
            let priors = (0..2 * n).map(|i| (i % 7) as f64).collect();
            let posterior = BernoulliPosterior::new(PriorVector::new(priors), false).unwrap();
            let options = QuadratureOptions::default();
            b.iter(|| {
                let mut cache = IntegrationCache::new();
                black_box(posterior.max_likelihoods(&mut cache, &options).unwrap())
            })
        });
        group.bench_with_input(BenchmarkId::new("gaussian_cached", n), &n, |b, &n| {
            let mut learner = learner(ModelKind::GaussianRssl, n);
            b.iter(|| black_box(learner.max_likelihoods().unwrap()))
        });
    }
    group.finish();
}

fn bench_simulate_run(c: &mut Criterion) {
    let catalog = default_catalog();
    c.bench_function("simulate_35_trials", |b| {
        b.iter(|| {
            let mut learner = learner(ModelKind::BernoulliRssl, 5);
            let mut env = MouselabEnv::new(EnvConfig {
                seed: Some(7),
                ..Default::default()
            })
            .unwrap();
            black_box(
                learner
                    .simulate(
                        &mut env,
                        RunMode::Simulate { catalog: &catalog },
                        &Participant::default(),
                    )
                    .unwrap(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_select_strategy,
    bench_update_params,
    bench_max_likelihoods,
    bench_simulate_run
);
criterion_main!(benches);
