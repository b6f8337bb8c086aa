use automl_engine::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_table(n_rows: usize, n_features: usize) -> Table {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let mut features: Vec<Vec<f64>> = (0..n_features)
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();
    let target: Vec<String> = (0..n_rows)
        .map(|i| {
            let score: f64 = features.iter().take(3).map(|f| f[i]).sum();
            if score + rng.gen::<f64>() > 15.0 { "yes" } else { "no" }.to_string()
        })
        .collect();

    let mut columns: Vec<Column> = features
        .drain(..)
        .enumerate()
        .map(|(i, values)| Column::numeric(format!("feature_{}", i), values))
        .collect();
    columns.push(Column::text("target", &target));
    Table::new(columns).unwrap()
}

fn bench_profiling(c: &mut Criterion) {
    let mut group = c.benchmark_group("profiling");

    for n_rows in [1000, 10000].iter() {
        let table = create_classification_table(*n_rows, 20);
        let thresholds = ProfilingThresholds::default();

        group.bench_with_input(BenchmarkId::new("profile_dataset", n_rows), n_rows, |b, _| {
            b.iter(|| black_box(profile_dataset(black_box(&table), &thresholds)))
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    for n_rows in [500, 2000].iter() {
        let table = create_classification_table(*n_rows, 10);
        let engine = AutoMLEngine::new(AutoMLConfig::new().with_cv_folds(3));

        group.bench_with_input(BenchmarkId::new("run", n_rows), n_rows, |b, _| {
            b.iter(|| black_box(engine.run(black_box(&table)).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_profiling, bench_training);
criterion_main!(benches);
