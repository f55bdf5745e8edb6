//! Criterion benchmarks for the transition interval calculator.
//!
//! One iteration of an abstraction is dominated by `compute_all`: every
//! (region, action) pair pushes all sample clusters through the partition.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{DMatrix, DVector};
use scab_config::MdpMode;
use scab_core::dynamics::{Action, LinearDynamics};
use scab_core::intervals::{CalculatorConfig, IntervalCalculator, ScenarioBounds};
use scab_core::noise::{cluster, NoiseDistribution, NoiseSampler};
use scab_core::partition::Partition;

fn setup(cells: usize) -> (LinearDynamics, Partition, Vec<Action>) {
    let dynamics = LinearDynamics::new(
        DMatrix::from_row_slice(2, 2, &[0.9, 0.1, 0.0, 0.9]),
        DMatrix::identity(2, 2),
        DVector::zeros(2),
    )
    .unwrap();
    let partition = Partition::uniform(&[[-5.0, 5.0], [-5.0, 5.0]], &[cells, cells]).unwrap();
    let actions = [[0.0, 0.0], [0.5, 0.0], [0.0, 0.5]]
        .iter()
        .zip(0..)
        .map(|(u, id)| Action {
            id,
            input: u.to_vec(),
        })
        .collect();
    (dynamics, partition, actions)
}

fn bench_compute_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_all");
    group.sample_size(10);

    let noise = NoiseDistribution::gaussian(vec![0.0, 0.0], DMatrix::identity(2, 2) * 0.1).unwrap();
    for (cells, samples, radius) in [(10, 1_000_u64, 0.0), (10, 5_000, 0.0), (10, 5_000, 0.05)] {
        let (dynamics, partition, actions) = setup(cells);
        let drawn = NoiseSampler::new(noise.clone(), Some(7))
            .sample(samples)
            .unwrap();
        let clusters = cluster(&drawn, radius);
        let bounds = ScenarioBounds::new(samples, 1e-8);
        let config = CalculatorConfig {
            confidence: 1e-8,
            mode: MdpMode::Interval,
            ..CalculatorConfig::default()
        };
        let calculator = IntervalCalculator::new(&dynamics, &partition, &bounds, config);

        group.bench_with_input(
            BenchmarkId::new(format!("{cells}x{cells}"), format!("n{samples}_r{radius}")),
            &clusters,
            |b, clusters| {
                b.iter(|| black_box(calculator.compute_all(&actions, black_box(clusters)).unwrap()));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_compute_all);
criterion_main!(benches);
