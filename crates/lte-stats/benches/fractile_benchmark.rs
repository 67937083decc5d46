use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lte_stats::{Curve, FractileEngine, WeightedCurveSet};

fn make_ensemble(members: usize, points: usize) -> WeightedCurveSet {
    let xs: Vec<f64> = (0..points).map(|i| 5.0 + 0.1 * i as f64).collect();
    let mut set = WeightedCurveSet::new();
    for m in 0..members {
        // Gutenberg-Richter-like decay with a per-member offset.
        let offset = (m % 17) as f64 * 0.05;
        let ys = xs.iter().map(|x| 10f64.powf(4.0 + offset - x)).collect();
        set.push(Curve::new(xs.clone(), ys).unwrap(), 1.0 + (m % 5) as f64)
            .unwrap();
    }
    set
}

fn bench_reduce(c: &mut Criterion) {
    let engine = FractileEngine::default();
    let mut group = c.benchmark_group("fractile/reduce");

    for members in [64usize, 720, 1440] {
        let set = make_ensemble(members, 40);
        group.throughput(Throughput::Elements(members as u64));
        group.bench_with_input(BenchmarkId::from_parameter(members), &set, |b, set| {
            b.iter(|| engine.reduce_set(black_box(set), "bench").unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reduce);
criterion_main!(benches);
