//! Single-process, worker and coordinator entry points

use crate::accumulators::{build_accumulators, RunnerAccumulator};
use crate::config::RunnerConfig;
use crate::provider::{RateForecastBuilder, TableProvider};
use anyhow::{anyhow, Context, Result};
use lte_cluster::{Coordinator, ReportStore, WorkerReport};
use lte_compute::{AccumulatorOutput, RunContext, TaskDispatcher, WorkerTopology};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use ulid::Ulid;

/// Finalized result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Run identifier
    pub run_id: Ulid,
    /// Branch ids after selection, in index order
    pub branches: Vec<String>,
    /// One entry per accumulator, in registration order
    pub outputs: Vec<AccumulatorOutput>,
}

/// Where a distributed worker or coordinator exchanges reports
#[derive(Debug, Clone)]
pub struct ClusterArgs {
    /// Shared run identifier
    pub run_id: Ulid,
    /// Worker position
    pub topology: WorkerTopology,
    /// Report directory
    pub reports: PathBuf,
}

fn accumulators(config: &RunnerConfig) -> Result<Vec<RunnerAccumulator>> {
    let engine = config.run.fractile_engine().context("invalid fractiles")?;
    Ok(build_accumulators(&config.accumulators, &engine))
}

fn dispatcher(config: &RunnerConfig) -> Result<TaskDispatcher<TableProvider, RateForecastBuilder>> {
    let provider = TableProvider::new(&config.branches);
    Ok(TaskDispatcher::from_config(provider, RateForecastBuilder, &config.run)?)
}

/// Run every selected branch in this process
///
/// # Errors
/// Invalid configuration or any branch, accumulator or finalize failure
pub fn run_single(config: &RunnerConfig) -> Result<RunOutput> {
    let branches = config.branch_set()?;
    let accumulators = accumulators(config)?;
    let ctx = RunContext::new(WorkerTopology::SINGLE);

    let summary = dispatcher(config)?.run(&branches, &accumulators, &ctx)?;
    info!(
        run_id = %ctx.run_id(),
        branches = summary.branches_processed,
        threads = summary.threads,
        elapsed_s = summary.elapsed.as_secs_f64(),
        "single-process run finished"
    );
    info!("compute times\n{}", ctx.times().snapshot().render());

    let outputs = accumulators
        .iter()
        .map(|acc| acc.output().ok_or_else(|| anyhow!("{} produced no output", acc.name())))
        .collect::<Result<Vec<_>>>()?;
    Ok(RunOutput {
        run_id: ctx.run_id(),
        branches: branches.iter().map(|(_, b)| b.id().to_string()).collect(),
        outputs,
    })
}

/// Process this worker's share and write its report
///
/// # Errors
/// Invalid configuration, any task failure or an unwritable report
pub fn run_worker(config: &RunnerConfig, args: &ClusterArgs) -> Result<PathBuf> {
    let branches = config.branch_set()?;
    let accumulators = accumulators(config)?;
    let ctx = RunContext::with_run_id(args.run_id, args.topology);
    let share = config.partition.indices(branches.len(), args.topology);

    let summary = dispatcher(config)?.dispatch_subset(&branches, &share, &accumulators, &ctx)?;
    info!(
        worker = %args.topology,
        branches = summary.branches_processed,
        elapsed_s = summary.elapsed.as_secs_f64(),
        "worker share processed"
    );

    let report = WorkerReport::collect(&ctx, &share, &accumulators)?;
    let store = ReportStore::open(&args.reports)?;
    Ok(store.write(&report)?)
}

/// Merge every worker report and finalize
///
/// # Errors
/// Invalid configuration, missing or inconsistent reports, merge failures
pub fn run_combine(config: &RunnerConfig, args: &ClusterArgs) -> Result<RunOutput> {
    let branches = config.branch_set()?;
    let locals = accumulators(config)?;
    let ctx = RunContext::with_run_id(args.run_id, args.topology);

    let store = ReportStore::open(&args.reports)?;
    let reports = store.read_all(args.topology.size)?;
    let coordinator = Coordinator::new(args.run_id, args.topology.size, &branches)?;
    let outputs = coordinator.finalize(&locals, &reports, &ctx)?;

    Ok(RunOutput {
        run_id: args.run_id,
        branches: branches.iter().map(|(_, b)| b.id().to_string()).collect(),
        outputs,
    })
}

/// Write `output` as pretty JSON to `path`, or to stdout
///
/// # Errors
/// Serialization or I/O failure
pub fn write_output(output: &RunOutput, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(output)?;
    match path {
        Some(path) => fs::write(path, json).with_context(|| format!("writing {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}
