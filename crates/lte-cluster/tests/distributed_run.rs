//! Workers exchange reports through a directory; the coordinator reproduces
//! the single-process result

use lte_branch::BranchSet;
use lte_cluster::{ClusterError, Coordinator, PartitionStrategy, ReportStore, WorkerReport};
use lte_compute::{AccumulatorOutput, RunContext, TaskDispatcher, WorkerTopology};
use lte_test_utils::{
    four_branch_fixture, outputs, rate_ensemble, standard_accumulators, uniform_branches, CountingForecastBuilder,
    SyntheticProvider,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use ulid::Ulid;

fn single_process(branches: &BranchSet, provider: &SyntheticProvider) -> Vec<AccumulatorOutput> {
    let accumulators = standard_accumulators();
    TaskDispatcher::with_forecast_builder(provider, CountingForecastBuilder::new(), 2)
        .unwrap()
        .run(branches, &accumulators, &RunContext::new(WorkerTopology::SINGLE))
        .unwrap();
    outputs(&accumulators)
}

fn run_worker(
    store: &ReportStore,
    run_id: Ulid,
    topology: WorkerTopology,
    strategy: PartitionStrategy,
    branches: &BranchSet,
    provider: &SyntheticProvider,
) -> WorkerReport {
    let ctx = RunContext::with_run_id(run_id, topology);
    let share = strategy.indices(branches.len(), topology);
    let accumulators = standard_accumulators();
    TaskDispatcher::with_forecast_builder(provider, CountingForecastBuilder::new(), 2)
        .unwrap()
        .dispatch_subset(branches, &share, &accumulators, &ctx)
        .unwrap();
    let report = WorkerReport::collect(&ctx, &share, &accumulators).unwrap();
    store.write(&report).unwrap();
    report
}

fn coordinate(
    store: &ReportStore,
    run_id: Ulid,
    size: usize,
    branches: &BranchSet,
) -> Result<Vec<AccumulatorOutput>, ClusterError> {
    let reports = store.read_all(size)?;
    let locals = standard_accumulators();
    let ctx = RunContext::with_run_id(run_id, WorkerTopology::SINGLE);
    Coordinator::new(run_id, size, branches)?.finalize(&locals, &reports, &ctx)
}

fn two_worker_reports(branches: &BranchSet, provider: &SyntheticProvider, run_id: Ulid) -> Vec<WorkerReport> {
    let dir = TempDir::new().unwrap();
    let store = ReportStore::open(dir.path()).unwrap();
    (0..2)
        .map(|rank| {
            let topology = WorkerTopology::new(rank, 2).unwrap();
            run_worker(&store, run_id, topology, PartitionStrategy::Contiguous, branches, provider)
        })
        .collect()
}

#[test]
fn two_workers_match_single_process() {
    let dir = TempDir::new().unwrap();
    let store = ReportStore::open(dir.path()).unwrap();
    let (branches, provider) = four_branch_fixture();
    let run_id = Ulid::new();

    for rank in 0..2 {
        let topology = WorkerTopology::new(rank, 2).unwrap();
        run_worker(&store, run_id, topology, PartitionStrategy::Contiguous, &branches, &provider);
    }
    assert!(store.path_for(1).exists());

    let combined = coordinate(&store, run_id, 2, &branches).unwrap();
    assert_eq!(single_process(&branches, &provider), combined);
}

#[test]
fn idle_workers_are_accepted() {
    let dir = TempDir::new().unwrap();
    let store = ReportStore::open(dir.path().join("reports")).unwrap();
    let branches = uniform_branches(2);
    let provider = SyntheticProvider::linear(2);
    let run_id = Ulid::new();

    for rank in 0..4 {
        let topology = WorkerTopology::new(rank, 4).unwrap();
        let report = run_worker(&store, run_id, topology, PartitionStrategy::RoundRobin, &branches, &provider);
        assert_eq!(report.is_idle(), rank >= 2);
    }

    let combined = coordinate(&store, run_id, 4, &branches).unwrap();
    assert_eq!(single_process(&branches, &provider), combined);
}

#[test]
fn missing_report_is_fatal() {
    let dir = TempDir::new().unwrap();
    let store = ReportStore::open(dir.path()).unwrap();
    let (branches, provider) = four_branch_fixture();
    let run_id = Ulid::new();
    run_worker(
        &store,
        run_id,
        WorkerTopology::new(0, 2).unwrap(),
        PartitionStrategy::Contiguous,
        &branches,
        &provider,
    );

    let err = coordinate(&store, run_id, 2, &branches).unwrap_err();
    assert!(matches!(err, ClusterError::MissingRank { rank: 1 }));
}

#[test]
fn accumulator_list_must_match() {
    let dir = TempDir::new().unwrap();
    let store = ReportStore::open(dir.path()).unwrap();
    let branches = uniform_branches(3);
    let provider = SyntheticProvider::linear(3);
    let run_id = Ulid::new();

    let ctx = RunContext::with_run_id(run_id, WorkerTopology::SINGLE);
    let accumulators = vec![rate_ensemble("Rates")];
    TaskDispatcher::with_forecast_builder(&provider, CountingForecastBuilder::new(), 1)
        .unwrap()
        .dispatch(&branches, &accumulators, &ctx)
        .unwrap();
    store
        .write(&WorkerReport::collect(&ctx, &[0, 1, 2], &accumulators).unwrap())
        .unwrap();

    let err = coordinate(&store, run_id, 1, &branches).unwrap_err();
    assert!(matches!(err, ClusterError::AccumulatorMismatch { rank: 0, .. }));
}

#[test]
fn report_survives_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = ReportStore::open(dir.path()).unwrap();
    let (branches, provider) = four_branch_fixture();
    let written = run_worker(
        &store,
        Ulid::new(),
        WorkerTopology::new(1, 2).unwrap(),
        PartitionStrategy::RoundRobin,
        &branches,
        &provider,
    );
    assert_eq!(written, store.read(1).unwrap());
    assert_eq!(written.branches, vec![1, 3]);
}

#[test]
fn report_must_hold_state_for_every_listed_branch() {
    let dir = TempDir::new().unwrap();
    let store = ReportStore::open(dir.path()).unwrap();
    let (branches, provider) = four_branch_fixture();
    let run_id = Ulid::new();
    run_worker(
        &store,
        run_id,
        WorkerTopology::new(0, 2).unwrap(),
        PartitionStrategy::Contiguous,
        &branches,
        &provider,
    );

    // Rank 1 claims [2, 3] but only ran branch 2
    let ctx = RunContext::with_run_id(run_id, WorkerTopology::new(1, 2).unwrap());
    let accumulators = standard_accumulators();
    TaskDispatcher::with_forecast_builder(&provider, CountingForecastBuilder::new(), 2)
        .unwrap()
        .dispatch_subset(&branches, &[2], &accumulators, &ctx)
        .unwrap();
    store
        .write(&WorkerReport::collect(&ctx, &[2, 3], &accumulators).unwrap())
        .unwrap();

    let err = coordinate(&store, run_id, 2, &branches).unwrap_err();
    assert!(matches!(
        err,
        ClusterError::StateCoverageMismatch { rank: 1, branch_index: 3, .. }
    ));
}

#[test]
fn state_weights_must_match_coordinator_branches() {
    let (branches, provider) = four_branch_fixture();
    let run_id = Ulid::new();
    let mut reports = two_worker_reports(&branches, &provider, run_id);
    reports[1].envelopes[2].weights[0] = 0.9;

    let locals = standard_accumulators();
    let ctx = RunContext::with_run_id(run_id, WorkerTopology::SINGLE);
    let err = Coordinator::new(run_id, 2, &branches)
        .unwrap()
        .finalize(&locals, &reports, &ctx)
        .unwrap_err();
    assert!(matches!(
        err,
        ClusterError::WeightMismatch { rank: 1, branch_index: 2, .. }
    ));

    // A worker run against a differently weighted branch set is caught the same way
    let reweighted = lte_test_utils::weighted_branches(&[0.1, 0.2, 0.35, 0.35]);
    let reports = two_worker_reports(&reweighted, &provider, run_id);
    let err = Coordinator::new(run_id, 2, &branches)
        .unwrap()
        .finalize(&locals, &reports, &ctx)
        .unwrap_err();
    assert!(matches!(err, ClusterError::WeightMismatch { branch_index: 2, .. }));
}

#[test]
fn rejected_merge_leaves_locals_empty() {
    let (branches, provider) = four_branch_fixture();
    let run_id = Ulid::new();
    let mut reports = two_worker_reports(&branches, &provider, run_id);
    reports[1].envelopes[3].state = serde_json::Value::Null;

    let locals = standard_accumulators();
    let ctx = RunContext::with_run_id(run_id, WorkerTopology::SINGLE);
    let err = Coordinator::new(run_id, 2, &branches)
        .unwrap()
        .finalize(&locals, &reports, &ctx)
        .unwrap_err();
    assert!(matches!(err, ClusterError::Ensemble(_)));
    for local in &locals {
        assert!(local.output().is_none(), "{} was finalized", local.name());
        assert!(local.branches_consumed().is_empty(), "{} was merged", local.name());
        assert!(!local.is_finalized());
    }
}

#[test]
fn locals_must_start_empty() {
    let (branches, provider) = four_branch_fixture();
    let run_id = Ulid::new();
    let reports = two_worker_reports(&branches, &provider, run_id);

    // Locals that already consumed a branch outside the run
    let wider = lte_test_utils::weighted_branches(&[0.1; 10]);
    let locals = standard_accumulators();
    let ctx = RunContext::with_run_id(run_id, WorkerTopology::SINGLE);
    TaskDispatcher::with_forecast_builder(SyntheticProvider::linear(10), CountingForecastBuilder::new(), 1)
        .unwrap()
        .dispatch_subset(&wider, &[9], &locals, &ctx)
        .unwrap();

    let err = Coordinator::new(run_id, 2, &branches)
        .unwrap()
        .finalize(&locals, &reports, &ctx)
        .unwrap_err();
    assert!(matches!(err, ClusterError::UnmergedBranch { branch_index: 9, .. }));
    assert!(locals.iter().all(|local| local.output().is_none()));
}
