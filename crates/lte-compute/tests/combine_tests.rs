//! Distributed combine reproduces the single-process result

use lte_branch::BranchSet;
use lte_compute::{
    AccumulatorOutput, DistributedCombiner, MergeError, RunContext, StateEnvelope, TaskDispatcher, WorkerTopology,
};
use lte_test_utils::{
    four_branch_fixture, outputs, standard_accumulators, weighted_branches, CountingForecastBuilder,
    SyntheticAccumulator, SyntheticProvider,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn single_process(branches: &BranchSet, provider: &SyntheticProvider) -> Vec<AccumulatorOutput> {
    let accumulators = standard_accumulators();
    TaskDispatcher::with_forecast_builder(provider, CountingForecastBuilder::new(), 2)
        .unwrap()
        .run(branches, &accumulators, &RunContext::new(WorkerTopology::SINGLE))
        .unwrap();
    outputs(&accumulators)
}

/// Dispatch one worker's share without finalizing
fn worker_pass(branches: &BranchSet, provider: &SyntheticProvider, indices: &[usize]) -> Vec<SyntheticAccumulator> {
    let accumulators = standard_accumulators();
    TaskDispatcher::with_forecast_builder(provider, CountingForecastBuilder::new(), 2)
        .unwrap()
        .dispatch_subset(branches, indices, &accumulators, &RunContext::new(WorkerTopology::SINGLE))
        .unwrap();
    accumulators
}

fn export(accumulators: &[SyntheticAccumulator]) -> Vec<StateEnvelope> {
    accumulators.iter().map(|a| a.export_state().unwrap()).collect()
}

#[test]
fn two_worker_split_matches_single_process() {
    let (branches, provider) = four_branch_fixture();
    let expected = single_process(&branches, &provider);

    let coordinator = worker_pass(&branches, &provider, &[0, 1]);
    let remote = worker_pass(&branches, &provider, &[2, 3]);
    let ctx = RunContext::new(WorkerTopology::new(0, 2).unwrap());

    let combined = DistributedCombiner::new()
        .combine_and_finalize(&coordinator, &[export(&remote)], &[], &ctx)
        .unwrap();
    assert_eq!(expected, combined);
}

#[test]
fn idle_worker_contributes_nothing() {
    let (branches, provider) = four_branch_fixture();
    let expected = single_process(&branches, &provider);

    let coordinator = worker_pass(&branches, &provider, &[0, 1, 2, 3]);
    let idle = worker_pass(&branches, &provider, &[]);
    let combined = DistributedCombiner::new()
        .combine_and_finalize(
            &coordinator,
            &[export(&idle), Vec::new()],
            &[],
            &RunContext::new(WorkerTopology::SINGLE),
        )
        .unwrap();
    assert_eq!(expected, combined);
}

#[test]
fn overlapping_workers_are_fatal() {
    let (branches, provider) = four_branch_fixture();
    let coordinator = worker_pass(&branches, &provider, &[0, 1, 2]);
    let remote = worker_pass(&branches, &provider, &[2, 3]);

    let err = DistributedCombiner::new()
        .combine_all(&coordinator, &[export(&remote)])
        .unwrap_err();
    assert!(matches!(err, MergeError::DuplicateBranch { branch_index: 2, .. }));
}

/// Split branches into three workers by `assignment`, then merge either flat
/// (workers 2 and 1 straight into 0) or nested (2 into 1, then 1 into 0)
fn split_and_merge(weights: &[f64], assignment: &[usize], nested: bool) -> Vec<AccumulatorOutput> {
    let branches = weighted_branches(weights);
    let provider = SyntheticProvider::linear(weights.len());
    let share = |worker: usize| -> Vec<usize> {
        assignment
            .iter()
            .enumerate()
            .filter(|(_, w)| **w == worker)
            .map(|(i, _)| i)
            .collect()
    };
    let workers: Vec<Vec<SyntheticAccumulator>> =
        (0..3).map(|w| worker_pass(&branches, &provider, &share(w))).collect();

    let combiner = DistributedCombiner::new();
    if nested {
        combiner.combine_all(&workers[1], &[export(&workers[2])]).unwrap();
        combiner.combine_all(&workers[0], &[export(&workers[1])]).unwrap();
    } else {
        combiner
            .combine_all(&workers[0], &[export(&workers[2]), export(&workers[1])])
            .unwrap();
    }
    for acc in &workers[0] {
        acc.finalize().unwrap();
    }
    outputs(&workers[0])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn combine_is_associative_and_commutative(
        (weights, assignment) in (1usize..12).prop_flat_map(|n| (
            prop::collection::vec(0.05f64..5.0, n),
            prop::collection::vec(0usize..3, n),
        )),
        nested in any::<bool>(),
    ) {
        let branches = weighted_branches(&weights);
        let provider = SyntheticProvider::linear(weights.len());
        let expected = single_process(&branches, &provider);
        prop_assert_eq!(expected, split_and_merge(&weights, &assignment, nested));
    }
}
