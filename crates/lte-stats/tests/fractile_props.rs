use lte_stats::{reduce, Curve, FractileEngine, WeightedCurveSet};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn scalar_curves(values: &[f64]) -> Vec<Curve> {
    values.iter().map(|v| Curve::scalar(*v).unwrap()).collect()
}

#[test]
fn test_four_branch_scalar_example() {
    let curves = scalar_curves(&[1.0, 2.0, 3.0, 4.0]);
    let summary = reduce(&curves, &[0.1, 0.2, 0.3, 0.4], "Total", &[0.5]).unwrap();

    assert!((summary.mean().ys()[0] - 3.0).abs() < 1e-12);
    assert_eq!(summary.min().ys(), &[1.0]);
    assert_eq!(summary.max().ys(), &[4.0]);
    assert_eq!(summary.fractile(0.5).unwrap().ys(), &[3.0]);
}

#[test]
fn test_engine_reduces_accumulated_set() {
    let mut set = WeightedCurveSet::new();
    for (i, w) in [1.0, 1.0, 2.0].into_iter().enumerate() {
        let y = i as f64;
        set.push(Curve::new(vec![5.0, 6.0], vec![y, y * 10.0]).unwrap(), w)
            .unwrap();
    }
    let engine = FractileEngine::new(vec![0.5]).unwrap();
    let summary = engine.reduce_set(&set, "MFD").unwrap();

    assert_eq!(summary.label(), "MFD");
    assert_eq!(summary.mean().xs(), &[5.0, 6.0]);
    assert_eq!(summary.mean().ys(), &[1.25, 12.5]);
    assert_eq!(summary.fractile(0.5).unwrap().ys(), &[1.0, 10.0]);
    assert_eq!(summary.max().ys(), &[2.0, 20.0]);
}

#[test]
fn test_summary_json_roundtrip() {
    let curves = scalar_curves(&[1.0, 2.0]);
    let summary = reduce(&curves, &[1.0, 1.0], "S", &[0.5]).unwrap();
    let json = serde_json::to_string(&summary).unwrap();
    let back: lte_stats::SummaryCurve = serde_json::from_str(&json).unwrap();
    assert_eq!(back, summary);
}

fn ensemble() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<f64>)> {
    (1usize..6, 1usize..12).prop_flat_map(|(points, members)| {
        (
            prop::collection::vec(prop::collection::vec(-100.0f64..100.0, points), members),
            prop::collection::vec(0.01f64..10.0, members),
        )
    })
}

fn to_curves(ys: &[Vec<f64>]) -> Vec<Curve> {
    ys.iter()
        .map(|y| Curve::new((0..y.len()).map(|i| i as f64).collect(), y.clone()).unwrap())
        .collect()
}

proptest! {
    #[test]
    fn prop_single_curve_is_its_own_summary(ys in prop::collection::vec(-1e3f64..1e3, 1..20)) {
        let curves = to_curves(&[ys]);
        let summary = reduce(&curves, &[1.0], "one", &[0.5]).unwrap();
        prop_assert_eq!(summary.mean(), &curves[0]);
        prop_assert_eq!(summary.min(), &curves[0]);
        prop_assert_eq!(summary.max(), &curves[0]);
    }

    #[test]
    fn prop_mean_invariant_to_weight_scaling((ys, weights) in ensemble(), scale in 0.001f64..1000.0) {
        let curves = to_curves(&ys);
        let scaled: Vec<f64> = weights.iter().map(|w| w * scale).collect();
        let a = reduce(&curves, &weights, "a", &[]).unwrap();
        let b = reduce(&curves, &scaled, "a", &[]).unwrap();
        for (x, y) in a.mean().ys().iter().zip(b.mean().ys()) {
            prop_assert!((x - y).abs() <= 1e-9 * x.abs().max(1.0));
        }
    }

    #[test]
    fn prop_extreme_fractiles_are_envelopes((ys, weights) in ensemble()) {
        let curves = to_curves(&ys);
        let summary = reduce(&curves, &weights, "e", &[0.0, 1.0]).unwrap();
        prop_assert_eq!(summary.fractile(0.0).unwrap(), summary.min());
        prop_assert_eq!(summary.fractile(1.0).unwrap(), summary.max());
    }

    #[test]
    fn prop_fractiles_are_ordered_and_bounded((ys, weights) in ensemble()) {
        let curves = to_curves(&ys);
        let summary = reduce(&curves, &weights, "o", &[0.1, 0.5, 0.9]).unwrap();
        let p10 = summary.fractile(0.1).unwrap().ys();
        let p50 = summary.fractile(0.5).unwrap().ys();
        let p90 = summary.fractile(0.9).unwrap().ys();
        for i in 0..p50.len() {
            prop_assert!(summary.min().ys()[i] <= p10[i]);
            prop_assert!(p10[i] <= p50[i] && p50[i] <= p90[i]);
            prop_assert!(p90[i] <= summary.max().ys()[i]);
        }
    }
}
