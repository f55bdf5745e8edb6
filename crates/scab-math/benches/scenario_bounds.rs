//! Criterion benchmarks for `scab-math`.
//!
//! The interval calculator evaluates the scenario bound once per distinct
//! count, so its cost dominates for large sample budgets.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scab_math::scenario::{lower_bound, upper_bound};

fn bench_scenario_bounds(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenario");

    for (name, samples, discarded) in [
        ("n100_mid", 100_u64, 50_u64),
        ("n1000_tail", 1_000, 3),
        ("n20000_mid", 20_000, 9_000),
        ("n20000_tail", 20_000, 19_990),
    ] {
        group.bench_with_input(
            BenchmarkId::new("lower_bound", name),
            &(samples, discarded),
            |b, &(n, k)| {
                b.iter(|| black_box(lower_bound(black_box(n), black_box(k), black_box(1e-8))));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("upper_bound", name),
            &(samples, discarded),
            |b, &(n, k)| {
                b.iter(|| black_box(upper_bound(black_box(n), black_box(k), black_box(1e-8))));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_scenario_bounds);
criterion_main!(benches);
