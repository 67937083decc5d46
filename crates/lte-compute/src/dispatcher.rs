//! Thread-pool fan-out of branches to accumulators
//!
//! One task per branch index. Tasks sit in an unordered shared queue drained
//! by a fixed set of scoped worker threads; every worker pulls the next
//! unclaimed index. The first failure stops the pool from pulling new work
//! and is returned to the caller once the in-flight tasks finish. A panicking
//! task counts as a failure the moment it unwinds.

use crate::accumulator::{Accumulator, BranchInput};
use crate::config::RunConfig;
use crate::context::RunContext;
use crate::error::DispatchError;
use crate::forecast::{ForecastBuilder, NoForecast};
use crate::provider::BranchProvider;
use crossbeam::channel::{self, Receiver};
use lte_branch::BranchSet;
use lte_stats::MinMaxAveTracker;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Accumulators registered for one dispatch run
pub type AccumulatorSet<R, F = ()> = [Box<dyn Accumulator<R, F>>];

/// Outcome of one dispatch pass
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSummary {
    /// Tasks completed
    pub branches_processed: usize,
    /// Worker threads used
    pub threads: usize,
    /// Wall-clock time of the pass
    pub elapsed: Duration,
    /// Per-task durations in seconds
    pub task_times: MinMaxAveTracker,
}

/// State shared by the workers of one pass
struct PassState {
    abort: AtomicBool,
    first_error: Mutex<Option<DispatchError>>,
    processed: AtomicUsize,
    task_times: Mutex<MinMaxAveTracker>,
}

impl PassState {
    fn new() -> Self {
        Self {
            abort: AtomicBool::new(false),
            first_error: Mutex::new(None),
            processed: AtomicUsize::new(0),
            task_times: Mutex::new(MinMaxAveTracker::default()),
        }
    }

    /// Stop the pool; only the first error is kept
    fn fail(&self, err: DispatchError) {
        self.abort.store(true, Ordering::Release);
        let mut slot = self.first_error.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }
}

/// Fixed-size worker pool feeding every branch to every accumulator
#[derive(Debug)]
pub struct TaskDispatcher<P, B = NoForecast> {
    provider: P,
    builder: B,
    threads: usize,
}

impl<P: BranchProvider> TaskDispatcher<P, NoForecast> {
    /// Create a dispatcher for runs that need no derived forecast
    ///
    /// # Errors
    /// `DispatchError::InvalidThreadCount` for zero threads
    pub fn new(provider: P, threads: usize) -> Result<Self, DispatchError> {
        Self::with_forecast_builder(provider, NoForecast, threads)
    }
}

impl<P, B> TaskDispatcher<P, B>
where
    P: BranchProvider,
    B: ForecastBuilder<P::Output>,
{
    /// Create a dispatcher with a derived-forecast builder
    ///
    /// # Errors
    /// `DispatchError::InvalidThreadCount` for zero threads
    pub fn with_forecast_builder(provider: P, builder: B, threads: usize) -> Result<Self, DispatchError> {
        if threads == 0 {
            return Err(DispatchError::InvalidThreadCount(threads));
        }
        Ok(Self {
            provider,
            builder,
            threads,
        })
    }

    /// Create a dispatcher sized from `config`
    ///
    /// # Errors
    /// `DispatchError::InvalidThreadCount` for an explicit zero thread count
    pub fn from_config(provider: P, builder: B, config: &RunConfig) -> Result<Self, DispatchError> {
        Self::with_forecast_builder(provider, builder, config.effective_threads())
    }

    /// Worker thread count
    #[inline]
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Dispatch every branch, flush, then finalize every accumulator once
    ///
    /// # Errors
    /// The first task failure, or the first finalize failure
    pub fn run(
        &self,
        branches: &BranchSet,
        accumulators: &AccumulatorSet<P::Output, B::Forecast>,
        ctx: &RunContext,
    ) -> Result<DispatchSummary, DispatchError> {
        let summary = self.dispatch(branches, accumulators, ctx)?;
        for acc in accumulators {
            let started = Instant::now();
            acc.finalize().map_err(|source| {
                error!(accumulator = acc.name(), "finalize failed: {source}");
                DispatchError::Finalize {
                    accumulator: acc.name().to_string(),
                    source,
                }
            })?;
            debug!(accumulator = acc.name(), elapsed_s = started.elapsed().as_secs_f64(), "finalized");
        }
        info!(run_id = %ctx.run_id(), accumulators = accumulators.len(), "run complete");
        Ok(summary)
    }

    /// Dispatch every branch, then flush; finalization is left to the caller
    ///
    /// # Errors
    /// The first task failure
    pub fn dispatch(
        &self,
        branches: &BranchSet,
        accumulators: &AccumulatorSet<P::Output, B::Forecast>,
        ctx: &RunContext,
    ) -> Result<DispatchSummary, DispatchError> {
        let indices: Vec<usize> = (0..branches.len()).collect();
        self.dispatch_subset(branches, &indices, accumulators, ctx)
    }

    /// Dispatch only `indices` (a distributed worker's share), then flush
    ///
    /// # Errors
    /// Invalid registrations, out-of-range indices or the first task failure
    pub fn dispatch_subset(
        &self,
        branches: &BranchSet,
        indices: &[usize],
        accumulators: &AccumulatorSet<P::Output, B::Forecast>,
        ctx: &RunContext,
    ) -> Result<DispatchSummary, DispatchError> {
        validate_accumulators(accumulators)?;
        if let Some(&index) = indices.iter().find(|&&i| i >= branches.len()) {
            return Err(DispatchError::IndexOutOfRange {
                index,
                len: branches.len(),
            });
        }

        let workers = self.threads.min(indices.len()).max(1);
        info!(
            run_id = %ctx.run_id(),
            worker = %ctx.worker(),
            branches = indices.len(),
            threads = workers,
            accumulators = accumulators.len(),
            "dispatching branches"
        );

        let started = Instant::now();
        let state = PassState::new();
        let (tx, rx) = channel::unbounded();
        for &index in indices {
            if tx.send(index).is_err() {
                break;
            }
        }
        drop(tx);

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for t in 0..workers {
                let rx = rx.clone();
                let state = &state;
                let spawned = thread::Builder::new()
                    .name(format!("lte-worker-{t}"))
                    .spawn_scoped(scope, move || {
                        self.worker_loop(&rx, state, branches, accumulators, ctx);
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        error!("failed to spawn worker {t}: {err}");
                        state.fail(DispatchError::Spawn(err));
                        break;
                    }
                }
            }
            for handle in handles {
                let name = handle.thread().name().unwrap_or("lte-worker").to_string();
                if handle.join().is_err() {
                    error!(thread = %name, "worker thread panicked");
                    state.fail(DispatchError::WorkerPanicked(name));
                }
            }
        });

        for acc in accumulators {
            acc.flush();
        }

        if let Some(err) = state.first_error.into_inner() {
            return Err(err);
        }

        let summary = DispatchSummary {
            branches_processed: state.processed.into_inner(),
            threads: workers,
            elapsed: started.elapsed(),
            task_times: state.task_times.into_inner(),
        };
        info!(
            branches = summary.branches_processed,
            elapsed_s = summary.elapsed.as_secs_f64(),
            "dispatch complete"
        );
        Ok(summary)
    }

    fn worker_loop(
        &self,
        rx: &Receiver<usize>,
        state: &PassState,
        branches: &BranchSet,
        accumulators: &AccumulatorSet<P::Output, B::Forecast>,
        ctx: &RunContext,
    ) {
        for index in rx {
            if state.aborted() {
                break;
            }
            let started = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_task(index, branches, accumulators, ctx)));
            let Ok(outcome) = outcome else {
                let name = thread::current().name().unwrap_or("lte-worker").to_string();
                error!(branch_index = index, branch = %branches[index].id(), thread = %name, "task panicked");
                state.fail(DispatchError::WorkerPanicked(name));
                break;
            };
            match outcome {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    ctx.times().add_task(elapsed);
                    state.task_times.lock().add_value(elapsed.as_secs_f64());
                    state.processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    error!(branch_index = index, branch = %branches[index].id(), "{err}");
                    state.fail(err);
                    break;
                }
            }
        }
    }

    /// Materialize one branch and hand it to every accumulator
    fn run_task(
        &self,
        index: usize,
        branches: &BranchSet,
        accumulators: &AccumulatorSet<P::Output, B::Forecast>,
        ctx: &RunContext,
    ) -> Result<(), DispatchError> {
        let branch = &branches[index];
        debug!(branch_index = index, branch = %branch.id(), "materializing");

        let task_started = Instant::now();
        let result = self
            .provider
            .materialize(index, branch)
            .map_err(|source| DispatchError::Materialize {
                branch_index: index,
                branch_id: branch.id().to_string(),
                source,
            })?;
        ctx.times().add_materialize(task_started.elapsed());

        let mut forecast: Option<B::Forecast> = None;
        let count = accumulators.len();
        // Rotate the starting accumulator so concurrent tasks contend on different locks.
        for k in 0..count {
            let acc = &accumulators[(index + k) % count];

            let forecast_ref = match acc.forecast_options() {
                Some(options) => {
                    let started = Instant::now();
                    let step = match forecast {
                        Some(ref mut existing) => self.builder.configure(existing, &options),
                        None => self
                            .builder
                            .build(&result, &options)
                            .map(|built| forecast = Some(built)),
                    };
                    ctx.times().add_forecast(started.elapsed());
                    step.map_err(|source| DispatchError::Forecast {
                        branch_index: index,
                        branch_id: branch.id().to_string(),
                        accumulator: acc.name().to_string(),
                        source,
                    })?;
                    forecast.as_ref()
                }
                None => None,
            };

            let started = Instant::now();
            acc.consume(&BranchInput {
                index,
                branch,
                result: &result,
                forecast: forecast_ref,
            })
            .map_err(|source| DispatchError::Consume {
                branch_index: index,
                branch_id: branch.id().to_string(),
                accumulator: acc.name().to_string(),
                source,
            })?;
            ctx.times().add_accumulator(acc.name(), started.elapsed());
        }

        debug!(branch_index = index, elapsed_s = task_started.elapsed().as_secs_f64(), "branch done");
        Ok(())
    }
}

/// Non-empty, uniquely named
fn validate_accumulators<R, F>(accumulators: &AccumulatorSet<R, F>) -> Result<(), DispatchError> {
    if accumulators.is_empty() {
        return Err(DispatchError::NoAccumulators);
    }
    let mut seen = HashSet::with_capacity(accumulators.len());
    for acc in accumulators {
        if !seen.insert(acc.name()) {
            return Err(DispatchError::DuplicateAccumulator(acc.name().to_string()));
        }
    }
    Ok(())
}
